use crate::constants::OCTET_STREAM;
use crate::handlers::error::ApiError;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use common::{ActionMode, ObjectId, StatusCodeError};
use futures::StreamExt;
use storage::{FileLocation, PendingActions};
use tracing::{debug, info};

/// Serve an object, from the Permanent cache when present.
///
/// A miss replays the download action stored by the batch call and caches the
/// upstream body while it is streamed to the client.
pub async fn download(
    path: web::Path<(i64, String, String, i64)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let (host_id, repo, oid, size) = path.into_inner();
    let host = state.resolve_host(host_id).await?;
    let id = ObjectId::new(oid, size);
    let store = state.store.as_ref();

    info!(host_id, repo = ?repo, oid = %id.hash(), size, "GET object - Request received");

    if store
        .exists(&repo, &id, FileLocation::Permanent, true, None)
        .await?
    {
        return serve_cached(&state, &repo, &id).await;
    }

    let guard = state.locks.acquire(&repo, &id).await;
    debug!(in_flight = state.locks.in_flight(), oid = %id.hash(), "Acquired download lock");

    // Filled by a concurrent download while this one waited
    if store
        .exists(&repo, &id, FileLocation::Permanent, true, None)
        .await?
    {
        drop(guard);
        return serve_cached(&state, &repo, &id).await;
    }

    let action = PendingActions::load(store, &repo, &id, ActionMode::Download)
        .await?
        .ok_or_else(|| StatusCodeError::not_found(format!("no pending download for {}", id)))?;
    if action.mode != ActionMode::Download {
        return Err(StatusCodeError::unprocessable("no download action associated with request").into());
    }

    // Single use, and gone before upstream is contacted
    PendingActions::remove(store, &repo, &id, ActionMode::Download).await?;

    let body = state
        .upstream
        .download_file(&host, &repo, &id, &action)
        .await?;
    let (path, tee) = store
        .save_streaming(&repo, &id, FileLocation::Permanent, body, None)
        .await?;
    info!(oid = %id.hash(), path = %path.display(), "GET object - Streaming from upstream");

    // The lock is released when the client stream ends or is dropped
    let stream = tee.map(move |chunk| {
        let _held = &guard;
        chunk
    });

    Ok(HttpResponse::Ok().content_type(OCTET_STREAM).streaming(stream))
}

async fn serve_cached(state: &AppState, repo: &str, id: &ObjectId) -> Result<HttpResponse, ApiError> {
    let contents = state
        .store
        .stream(repo, id, FileLocation::Permanent, None)
        .await?;
    info!(oid = %id.hash(), "GET object - Served from cache");
    Ok(HttpResponse::Ok()
        .content_type(OCTET_STREAM)
        .no_chunking(id.size().max(0) as u64)
        .streaming(contents))
}
