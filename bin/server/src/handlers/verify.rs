use crate::handlers::error::ApiError;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use common::{ActionMode, ObjectId};
use storage::{FileLocation, PendingActions};
use tracing::{info, warn};

/// Promote a staged upload and replay the upstream verify action, if any.
pub async fn verify(
    path: web::Path<(i64, String, String, i64)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let (host_id, repo, oid, size) = path.into_inner();
    let host = state.resolve_host(host_id).await?;
    let id = ObjectId::new(oid, size);
    let store = state.store.as_ref();

    info!(host_id, repo = ?repo, oid = %id.hash(), size, "POST verify - Request received");

    let promoted = store
        .move_object(&repo, &id, FileLocation::Temporary, FileLocation::Permanent, None)
        .await?;
    if promoted {
        info!(oid = %id.hash(), "POST verify - Staged object promoted");
    }

    let Some(action) = PendingActions::load(store, &repo, &id, ActionMode::Verify).await? else {
        return Ok(HttpResponse::Ok().finish());
    };

    let result = state.upstream.verify(&host, &repo, &id, &action).await;
    PendingActions::remove(store, &repo, &id, ActionMode::Verify).await?;
    if let Err(e) = result {
        warn!(oid = %id.hash(), error = %e, "POST verify - Upstream rejected verification");
        return Err(e.into());
    }

    info!(oid = %id.hash(), "POST verify - Verified upstream");
    Ok(HttpResponse::Ok().finish())
}
