//! Sharded on-disk cache of LFS objects.
//!
//! Entries are keyed by repository, object id, lifecycle location and an
//! optional suffix. Temporary entries hold in-flight transfers, Permanent
//! entries hold verified objects, and Metadata entries hold the pending
//! action a later transfer request will replay.

pub mod error;
pub mod filesystem;
pub mod metadata;

use async_trait::async_trait;
use common::{ByteStream, ObjectId};
use std::fmt;
use std::path::PathBuf;

pub use error::{StorageError, StorageResult};
pub use filesystem::FilesystemStore;
pub use metadata::PendingActions;

/// Lifecycle location of a cache entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileLocation {
    Temporary,
    Permanent,
    Metadata,
}

impl FileLocation {
    /// Directory name below `<root>/lfs`
    pub fn prefix(&self) -> &'static str {
        match self {
            FileLocation::Temporary => "temp",
            FileLocation::Permanent => "perm",
            FileLocation::Metadata => "meta",
        }
    }
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Object store for cached LFS content.
///
/// Operations on different keys may run concurrently. Operations on the
/// same key are not serialized here; callers that need at-most-once
/// behaviour per key coordinate themselves.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open an entry for reading
    async fn stream(
        &self,
        repo: &str,
        id: &ObjectId,
        location: FileLocation,
        suffix: Option<&str>,
    ) -> StorageResult<ByteStream>;

    /// Write a whole stream to an entry.
    /// The entry only appears once every byte is on disk; a failed write leaves nothing behind.
    async fn save(
        &self,
        repo: &str,
        id: &ObjectId,
        location: FileLocation,
        contents: ByteStream,
        suffix: Option<&str>,
    ) -> StorageResult<PathBuf>;

    /// Write an entry while handing the same bytes to the caller.
    /// A read failure or a dropped reader discards the partial entry; read failures
    /// are re-raised on the returned stream.
    async fn save_streaming(
        &self,
        repo: &str,
        id: &ObjectId,
        location: FileLocation,
        contents: ByteStream,
        suffix: Option<&str>,
    ) -> StorageResult<(PathBuf, ByteStream)>;

    /// Check for an entry, optionally requiring its length to equal `id.size()`
    async fn exists(
        &self,
        repo: &str,
        id: &ObjectId,
        location: FileLocation,
        match_size: bool,
        suffix: Option<&str>,
    ) -> StorageResult<bool>;

    /// Length of an entry in bytes, 0 when absent
    async fn size(
        &self,
        repo: &str,
        id: &ObjectId,
        location: FileLocation,
        suffix: Option<&str>,
    ) -> StorageResult<i64>;

    /// Move an entry between locations. Returns false when nothing was moved
    /// (no source entry, or the destination already exists).
    async fn move_object(
        &self,
        repo: &str,
        id: &ObjectId,
        from: FileLocation,
        to: FileLocation,
        suffix: Option<&str>,
    ) -> StorageResult<bool>;

    /// Remove an entry; absent entries are not an error
    async fn delete(
        &self,
        repo: &str,
        id: &ObjectId,
        location: FileLocation,
        suffix: Option<&str>,
    ) -> StorageResult<()>;
}
