//! Mirror a byte stream to disk while handing it to a reader

use bytes::Bytes;
use common::ByteStream;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Chunks buffered between the writer task and the reader
const CHANNEL_CAPACITY: usize = 16;

/// Spawn a task that copies `source` into `file` (created at `partial`) and
/// into the returned stream.
///
/// The sender is held until `partial` has been renamed to `destination`, so a
/// reader that observes end-of-stream also observes the finished entry. When
/// the source fails, the error is forwarded and the partial file removed; when
/// the reader goes away, the partial file is removed.
pub(super) fn spawn(
    mut source: ByteStream,
    mut file: fs::File,
    partial: PathBuf,
    destination: PathBuf,
) -> ByteStream {
    let (mut tx, rx) = mpsc::channel::<io::Result<Bytes>>(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut caching = true;
        let mut complete = true;

        while let Some(chunk) = source.next().await {
            match chunk {
                Ok(chunk) => {
                    if caching {
                        if let Err(e) = file.write_all(&chunk).await {
                            warn!(error = %e, path = %partial.display(), "cache write failed, streaming without caching");
                            caching = false;
                        }
                    }
                    if tx.send(Ok(chunk)).await.is_err() {
                        debug!(path = %destination.display(), "reader dropped before end of stream");
                        complete = false;
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, path = %destination.display(), "source stream failed");
                    let _ = tx.send(Err(e)).await;
                    complete = false;
                    break;
                }
            }
        }

        if complete && caching {
            match finish(file, &partial, &destination).await {
                Ok(()) => {
                    debug!(path = %destination.display(), "cached streamed entry");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, path = %destination.display(), "failed to finalize cache entry");
                    let _ = tx.send(Err(e)).await;
                }
            }
        } else {
            drop(file);
        }

        let _ = fs::remove_file(&partial).await;
    });

    rx.boxed()
}

async fn finish(mut file: fs::File, partial: &Path, destination: &Path) -> io::Result<()> {
    file.flush().await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(partial, destination).await
}
