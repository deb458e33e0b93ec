use std::path::Path;

/// Minimum oid length: the first four characters name the two shard directories
pub const MIN_OID_LEN: usize = 4;

/// Error type for path segment validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegmentError {
    Empty,
    ContainsNullByte,
    ContainsBackslash,
    IsSpecialDirectory,
    InvalidSegment,
    OidTooShort,
    OidNotHex,
}

impl PathSegmentError {
    pub fn message(&self) -> &'static str {
        match self {
            PathSegmentError::Empty => "Path segment cannot be empty",
            PathSegmentError::ContainsNullByte => "Path segment cannot contain null bytes",
            PathSegmentError::ContainsBackslash => "Path segment cannot contain backslashes",
            PathSegmentError::IsSpecialDirectory => "Path segment cannot be '.' or '..'",
            PathSegmentError::InvalidSegment => "Invalid path segment",
            PathSegmentError::OidTooShort => "Object id must be at least 4 characters",
            PathSegmentError::OidNotHex => "Object id must be hexadecimal",
        }
    }
}

impl std::fmt::Display for PathSegmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for PathSegmentError {}

/// Validate a repository name before it becomes part of a cache path.
///
/// Names may contain `/` (`group/project.git`); every segment must be a
/// plain file name so the result cannot escape the cache root.
pub fn validate_repository_name(name: &str) -> Result<(), PathSegmentError> {
    if name.is_empty() {
        return Err(PathSegmentError::Empty);
    }

    for segment in name.split('/') {
        validate_segment(segment)?;
    }

    Ok(())
}

/// Validate one path segment
fn validate_segment(segment: &str) -> Result<(), PathSegmentError> {
    if segment.is_empty() {
        return Err(PathSegmentError::Empty);
    }

    if segment.contains('\0') {
        return Err(PathSegmentError::ContainsNullByte);
    }

    if segment.contains('\\') {
        return Err(PathSegmentError::ContainsBackslash);
    }

    if segment == "." || segment == ".." {
        return Err(PathSegmentError::IsSpecialDirectory);
    }

    // Path::file_name must give the segment back unchanged
    let path = Path::new(segment);
    if path.file_name().and_then(|n| n.to_str()) != Some(segment) {
        return Err(PathSegmentError::InvalidSegment);
    }

    Ok(())
}

/// Validate an object hash before it is used to derive shard directories
pub fn validate_oid(oid: &str) -> Result<(), PathSegmentError> {
    if oid.len() < MIN_OID_LEN {
        return Err(PathSegmentError::OidTooShort);
    }

    if !oid.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(PathSegmentError::OidNotHex);
    }

    Ok(())
}
