use crate::config::ProxyTarget;
use crate::constants::HASH_BUFFER_SIZE;
use anyhow::{Context, Result};
use common::{ActionMode, ObjectId, Operation};
use futures::StreamExt;
use log::info;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;
use upstream::LfsUpstream;

/// LFS object id of a local file: its SHA-256 and length
pub async fn object_id_for(path: &Path) -> Result<ObjectId> {
    let mut file = File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    let mut size: i64 = 0;
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        size += read as i64;
    }
    Ok(ObjectId::new(hex::encode(hasher.finalize()), size))
}

/// Upload a file through whatever actions the batch call hands back
pub async fn upload_file(target: &ProxyTarget, path: &Path) -> Result<ObjectId> {
    let id = object_id_for(path).await?;
    info!("Uploading {} as {}", path.display(), id);

    let object = target.batch_one(Operation::Upload, &id).await?;
    let Some(action) = object.action(ActionMode::Upload) else {
        println!("✓ {} is already stored upstream", id.hash());
        return Ok(id);
    };

    let file = File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let contents = ReaderStream::new(file).boxed();
    target
        .client
        .upload_file(action, &id, contents)
        .await
        .with_context(|| format!("Upload of {} failed", id))?;
    info!("Uploaded {} to {}", id, action.href);

    if let Some(verify) = object.action(ActionMode::Verify) {
        target
            .client
            .verify(&target.host, &target.repo, &id, verify)
            .await
            .with_context(|| format!("Verification of {} failed", id))?;
        info!("Verified {}", id);
    }

    println!("✓ Uploaded {} ({} bytes)", id.hash(), id.size());
    Ok(id)
}
