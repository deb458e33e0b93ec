use crate::handlers::error::ApiError;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use bytes::Bytes;
use common::{ActionMode, ByteStream, ObjectId, StatusCodeError};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use std::io;
use storage::{FileLocation, PendingActions, StorageError};
use tracing::{info, warn};

/// Chunks buffered between the request body and the upload
const BODY_BUFFER: usize = 16;

/// Forward an object to the upload action stored by the batch call.
///
/// The body is staged in the Temporary location on the way through so a
/// later verify can promote it. Without a pending upload the request is
/// already satisfied.
pub async fn upload(
    path: web::Path<(i64, String, String, i64)>,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let (host_id, repo, oid, size) = path.into_inner();
    state.resolve_host(host_id).await?;
    let id = ObjectId::new(oid, size);
    let store = state.store.as_ref();

    info!(host_id, repo = ?repo, oid = %id.hash(), size, "PUT object - Request received");

    let Some(action) = PendingActions::load(store, &repo, &id, ActionMode::Upload).await? else {
        info!(oid = %id.hash(), "PUT object - No pending upload, nothing to do");
        return Ok(HttpResponse::Ok().finish());
    };
    if action.mode != ActionMode::Upload {
        PendingActions::remove(store, &repo, &id, ActionMode::Upload).await?;
        return Err(StatusCodeError::unprocessable("no upload action associated with request").into());
    }

    // The request payload is tied to this worker; hand its chunks over a channel
    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(BODY_BUFFER);
    let transfer = async {
        let (_, staged) = store
            .save_streaming(&repo, &id, FileLocation::Temporary, rx.boxed(), None)
            .await?;
        let (up_tx, up_rx) = mpsc::channel::<io::Result<Bytes>>(BODY_BUFFER);
        let (staging, uploaded) = futures::join!(
            drain_staged(staged, up_tx),
            state.upstream.upload_file(&action, &id, up_rx.boxed())
        );
        uploaded?;
        staging.map_err(StorageError::from)?;
        Ok::<(), ApiError>(())
    };
    let ((), result) = futures::join!(pump_payload(payload, tx), transfer);

    let consumed = PendingActions::remove(store, &repo, &id, ActionMode::Upload).await;
    if let Err(e) = result {
        warn!(oid = %id.hash(), error = %e, "PUT object - Upload failed, discarding staged copy");
        if let Err(cleanup) = store
            .delete(&repo, &id, FileLocation::Temporary, None)
            .await
        {
            warn!(oid = %id.hash(), error = %cleanup, "Failed to remove staged copy");
        }
        return Err(e);
    }
    consumed?;

    info!(oid = %id.hash(), "PUT object - Uploaded");
    Ok(HttpResponse::Ok().finish())
}

/// Read the staged stream to its end, feeding upstream for as long as it reads.
///
/// The staged entry exists only once the stream has ended, so the whole body
/// is consumed even when upstream stops early.
async fn drain_staged(
    mut staged: ByteStream,
    mut upstream: mpsc::Sender<io::Result<Bytes>>,
) -> io::Result<()> {
    let mut forwarding = true;
    while let Some(chunk) = staged.next().await {
        match chunk {
            Ok(chunk) => {
                if forwarding && upstream.send(Ok(chunk)).await.is_err() {
                    forwarding = false;
                }
            }
            Err(e) => {
                if forwarding {
                    let _ = upstream.send(Err(io::Error::new(e.kind(), e.to_string()))).await;
                }
                return Err(e);
            }
        }
    }
    Ok(())
}

async fn pump_payload(mut payload: web::Payload, mut tx: mpsc::Sender<io::Result<Bytes>>) {
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| io::Error::other(e.to_string()));
        let failed = chunk.is_err();
        if tx.send(chunk).await.is_err() || failed {
            break;
        }
    }
}
