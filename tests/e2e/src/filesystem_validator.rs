use anyhow::{Context, Result};
use common::ObjectId;
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk path of an entry below the proxy's data directory
pub fn entry_path(
    data_dir: &Path,
    location: &str,
    repo: &str,
    id: &ObjectId,
    suffix: Option<&str>,
) -> PathBuf {
    let hash = id.hash();
    let name = match suffix {
        Some(suffix) => format!("{}-{}", hash, suffix),
        None => hash.to_string(),
    };
    let mut path = data_dir.join("lfs").join(location);
    for segment in repo.split('/') {
        path.push(segment);
    }
    path.join(&hash[0..2]).join(&hash[2..4]).join(name)
}

/// The object sits in the Permanent cache with its full size
pub fn validate_cached_object(data_dir: &Path, repo: &str, id: &ObjectId, content: &[u8]) -> Result<()> {
    let path = entry_path(data_dir, "perm", repo, id, None);
    if !path.exists() {
        anyhow::bail!("Cached object does not exist: {:?}", path);
    }
    println!("  ✓ Cached object exists: {:?}", path);

    let cached = fs::read(&path).with_context(|| format!("Failed to read cached object: {:?}", path))?;
    if cached.len() as i64 != id.size() {
        anyhow::bail!(
            "Cached object has {} bytes, expected {}",
            cached.len(),
            id.size()
        );
    }
    if cached != content {
        anyhow::bail!("Cached object content differs from the original file");
    }
    println!("  ✓ Cached object has the expected {} bytes", id.size());
    Ok(())
}

/// The download action was consumed and nothing was left staged
pub fn validate_no_leftovers(data_dir: &Path, repo: &str, id: &ObjectId) -> Result<()> {
    let pending = entry_path(data_dir, "meta", repo, id, Some("download"));
    if pending.exists() {
        anyhow::bail!("Download action was not consumed: {:?}", pending);
    }
    println!("  ✓ No pending download action");

    let staged = entry_path(data_dir, "temp", repo, id, None);
    if staged.exists() {
        anyhow::bail!("Unexpected staged copy: {:?}", staged);
    }

    let parent = entry_path(data_dir, "perm", repo, id, None);
    if let Some(dir) = parent.parent() {
        for entry in fs::read_dir(dir)? {
            let name = entry?.file_name();
            if name.to_string_lossy().contains(".part-") {
                anyhow::bail!("Partial write left behind in {:?}: {:?}", dir, name);
            }
        }
    }
    println!("  ✓ No partial writes left behind");
    Ok(())
}

pub fn validate_downloaded_file(path: &Path, content: &[u8]) -> Result<()> {
    let downloaded = fs::read(path).with_context(|| format!("Failed to read downloaded file: {:?}", path))?;
    if downloaded != content {
        anyhow::bail!("Downloaded file {:?} differs from the original", path);
    }
    println!("  ✓ Downloaded file matches original ({} bytes)", downloaded.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_path_layout() {
        let id = ObjectId::new("abcdef0123", 5);
        assert_eq!(
            entry_path(Path::new("/data"), "meta", "group/repo.git", &id, Some("download")),
            PathBuf::from("/data/lfs/meta/group/repo.git/ab/cd/abcdef0123-download")
        );
    }
}
