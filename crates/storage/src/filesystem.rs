//! Filesystem-based object store

mod tee;

use crate::error::{StorageError, StorageResult};
use crate::{FileLocation, ObjectStore};
use async_trait::async_trait;
use common::file_utils::{validate_oid, validate_repository_name};
use common::{ByteStream, ObjectId};
use futures::{StreamExt, TryStreamExt};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Directory below the root that holds every location
const LFS_DIR: &str = "lfs";

/// Shard directory levels pruned after a move or delete
const SHARD_LEVELS: usize = 2;

/// Filesystem-based object store laid out as
/// `<root>/lfs/<location>/<repo>/<hash[0:2]>/<hash[2:4]>/<hash>[-<suffix>]`.
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Physical path of an entry, validating every caller-supplied component
    pub fn object_path(
        &self,
        repo: &str,
        id: &ObjectId,
        location: FileLocation,
        suffix: Option<&str>,
    ) -> StorageResult<PathBuf> {
        validate_repository_name(repo)
            .map_err(|e| StorageError::InvalidKey(format!("{}: {}", e, repo)))?;
        let hash = id.hash();
        validate_oid(hash).map_err(|e| StorageError::InvalidKey(format!("{}: {}", e, hash)))?;

        let file_name = match suffix {
            Some(suffix) => {
                if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_alphanumeric()) {
                    return Err(StorageError::InvalidKey(format!(
                        "invalid entry suffix: {}",
                        suffix
                    )));
                }
                format!("{}-{}", hash, suffix)
            }
            None => hash.to_string(),
        };

        let mut path = self.root.join(LFS_DIR).join(location.prefix());
        for segment in repo.split('/') {
            path.push(segment);
        }
        path.push(&hash[0..2]);
        path.push(&hash[2..4]);
        path.push(file_name);
        Ok(path)
    }

    /// Sibling path a write goes to before it is renamed into place
    fn partial_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".part-{}", Uuid::new_v4().simple()));
        path.with_file_name(name)
    }

    async fn ensure_parent(path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Remove the (now possibly empty) shard directories above `path`
    async fn prune_shards(path: &Path) {
        let mut dir = path.parent();
        for _ in 0..SHARD_LEVELS {
            let Some(current) = dir else { break };
            // remove_dir refuses non-empty directories, which ends the walk
            if fs::remove_dir(current).await.is_err() {
                break;
            }
            dir = current.parent();
        }
    }

    async fn write_stream(path: &Path, mut contents: ByteStream) -> StorageResult<u64> {
        let mut file = fs::File::create(path).await?;
        let mut written = 0u64;
        while let Some(chunk) = contents.try_next().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    #[instrument(skip(self), fields(oid = %id.hash()))]
    async fn stream(
        &self,
        repo: &str,
        id: &ObjectId,
        location: FileLocation,
        suffix: Option<&str>,
    ) -> StorageResult<ByteStream> {
        let path = self.object_path(repo, id, location, suffix)?;
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::NotFound(format!("{} ({})", id, location))
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(ReaderStream::new(file).boxed())
    }

    #[instrument(skip(self, contents), fields(oid = %id.hash()))]
    async fn save(
        &self,
        repo: &str,
        id: &ObjectId,
        location: FileLocation,
        contents: ByteStream,
        suffix: Option<&str>,
    ) -> StorageResult<PathBuf> {
        let path = self.object_path(repo, id, location, suffix)?;
        Self::ensure_parent(&path).await?;

        let partial = Self::partial_path(&path);
        match Self::write_stream(&partial, contents).await {
            Ok(written) => {
                if let Err(e) = fs::rename(&partial, &path).await {
                    let _ = fs::remove_file(&partial).await;
                    return Err(e.into());
                }
                debug!(path = %path.display(), bytes = written, "saved cache entry");
                Ok(path)
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "discarding partial cache entry");
                let _ = fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }

    #[instrument(skip(self, contents), fields(oid = %id.hash()))]
    async fn save_streaming(
        &self,
        repo: &str,
        id: &ObjectId,
        location: FileLocation,
        contents: ByteStream,
        suffix: Option<&str>,
    ) -> StorageResult<(PathBuf, ByteStream)> {
        let path = self.object_path(repo, id, location, suffix)?;
        Self::ensure_parent(&path).await?;

        let partial = Self::partial_path(&path);
        let file = fs::File::create(&partial).await?;
        let reader = tee::spawn(contents, file, partial, path.clone());
        Ok((path, reader))
    }

    #[instrument(skip(self), fields(oid = %id.hash()))]
    async fn exists(
        &self,
        repo: &str,
        id: &ObjectId,
        location: FileLocation,
        match_size: bool,
        suffix: Option<&str>,
    ) -> StorageResult<bool> {
        let path = self.object_path(repo, id, location, suffix)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                Ok(!match_size || i64::try_from(meta.len()).ok() == Some(id.size()))
            }
            Ok(_) => Ok(false),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn size(
        &self,
        repo: &str,
        id: &ObjectId,
        location: FileLocation,
        suffix: Option<&str>,
    ) -> StorageResult<i64> {
        let path = self.object_path(repo, id, location, suffix)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(i64::try_from(meta.len()).unwrap_or(i64::MAX)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(oid = %id.hash()))]
    async fn move_object(
        &self,
        repo: &str,
        id: &ObjectId,
        from: FileLocation,
        to: FileLocation,
        suffix: Option<&str>,
    ) -> StorageResult<bool> {
        let source = self.object_path(repo, id, from, suffix)?;
        let destination = self.object_path(repo, id, to, suffix)?;

        if fs::try_exists(&destination).await? {
            debug!(path = %destination.display(), "destination already present, not moving");
            return Ok(false);
        }
        if !fs::try_exists(&source).await? {
            return Ok(false);
        }

        Self::ensure_parent(&destination).await?;
        match fs::rename(&source, &destination).await {
            Ok(()) => {}
            // Lost a race with a concurrent move or delete of the same key
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        Self::prune_shards(&source).await;

        debug!(from = %from, to = %to, "moved cache entry");
        Ok(true)
    }

    #[instrument(skip(self), fields(oid = %id.hash()))]
    async fn delete(
        &self,
        repo: &str,
        id: &ObjectId,
        location: FileLocation,
        suffix: Option<&str>,
    ) -> StorageResult<()> {
        let path = self.object_path(repo, id, location, suffix)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                Self::prune_shards(&path).await;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
