use crate::config::ProxyTarget;
use anyhow::{ensure, Context, Result};
use common::{ActionMode, ObjectId, Operation};
use futures::StreamExt;
use log::info;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use upstream::LfsUpstream;

/// Fetch one object through the proxy and check its content hash.
///
/// The object is written next to `output` as a partial file and only renamed
/// into place once its size and SHA-256 match the requested id.
pub async fn download_object(
    target: &ProxyTarget,
    id: &ObjectId,
    output: Option<PathBuf>,
) -> Result<PathBuf> {
    let object = target.batch_one(Operation::Download, id).await?;
    let action = object
        .action(ActionMode::Download)
        .with_context(|| format!("No download action returned for {}", id))?;
    info!("Downloading {} from {}", id, action.href);

    let mut body = target
        .client
        .download_file(&target.host, &target.repo, id, action)
        .await
        .with_context(|| format!("Download of {} failed", id))?;

    let output = output.unwrap_or_else(|| PathBuf::from(id.hash()));
    let partial = partial_path(&output);
    let mut file = fs::File::create(&partial)
        .await
        .with_context(|| format!("Failed to create {}", partial.display()))?;

    let mut hasher = Sha256::new();
    let mut received: i64 = 0;
    let written: Result<()> = async {
        while let Some(chunk) = body.next().await {
            let chunk = chunk.context("Download stream failed")?;
            hasher.update(&chunk);
            received += chunk.len() as i64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    let checked = written.and_then(|_| {
        ensure!(
            received == id.size(),
            "Size mismatch: expected {} bytes, got {}",
            id.size(),
            received
        );
        let digest = hex::encode(hasher.finalize());
        ensure!(
            digest == id.hash(),
            "Hash mismatch: expected {}, got {}",
            id.hash(),
            digest
        );
        Ok(())
    });
    if let Err(e) = checked {
        let _ = fs::remove_file(&partial).await;
        return Err(e);
    }

    fs::rename(&partial, &output)
        .await
        .with_context(|| format!("Failed to move download to {}", output.display()))?;
    println!("✓ Downloaded {} ({} bytes) to {}", id.hash(), received, output.display());
    Ok(output)
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
