//! Pending-action entries kept in the Metadata location

use crate::error::{StorageError, StorageResult};
use crate::{FileLocation, ObjectStore};
use bytes::Bytes;
use common::{parse_slice, serialize, ActionMode, BatchObjectAction, ObjectId};
use futures::{stream, StreamExt, TryStreamExt};
use std::path::PathBuf;
use tracing::debug;

/// Pending-action manager.
///
/// A batch response leaves one entry per action, named by the action's mode;
/// the matching transfer request consumes it.
pub struct PendingActions;

impl PendingActions {
    /// Persist `action` for `(repo, id)` under its own mode
    pub async fn save(
        store: &dyn ObjectStore,
        repo: &str,
        id: &ObjectId,
        action: &BatchObjectAction,
    ) -> StorageResult<PathBuf> {
        let json = serialize(action).map_err(|e| StorageError::InvalidMetadata(e.to_string()))?;
        let contents = stream::once(async move { Ok(Bytes::from(json)) }).boxed();
        let path = store
            .save(
                repo,
                id,
                FileLocation::Metadata,
                contents,
                Some(action.mode.as_str()),
            )
            .await?;
        debug!(oid = %id.hash(), mode = %action.mode, "stored pending action");
        Ok(path)
    }

    /// Load the pending action stored under `mode`, if any
    pub async fn load(
        store: &dyn ObjectStore,
        repo: &str,
        id: &ObjectId,
        mode: ActionMode,
    ) -> StorageResult<Option<BatchObjectAction>> {
        let suffix = Some(mode.as_str());
        if !store
            .exists(repo, id, FileLocation::Metadata, false, suffix)
            .await?
        {
            return Ok(None);
        }

        let contents = match store.stream(repo, id, FileLocation::Metadata, suffix).await {
            Ok(contents) => contents,
            // Consumed by a concurrent request between the two calls
            Err(StorageError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let raw = contents
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await?;

        let action: BatchObjectAction = parse_slice(&raw)
            .map_err(|e| StorageError::InvalidMetadata(format!("{} ({}): {}", id, mode, e)))?;
        Ok(Some(action))
    }

    /// Remove the pending action stored under `mode`
    pub async fn remove(
        store: &dyn ObjectStore,
        repo: &str,
        id: &ObjectId,
        mode: ActionMode,
    ) -> StorageResult<()> {
        store
            .delete(repo, id, FileLocation::Metadata, Some(mode.as_str()))
            .await
    }
}
