use crate::handlers::error::ApiError;
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use common::file_utils::validate_repository_name;
use common::{
    parse_slice, serialize, ActionMode, BatchEntity, BatchObject, BatchObjectAction, BatchRequest,
    BatchTransfer, ObjectId, Operation, StatusCodeError, TransferMode, LFS_CONTENT_TYPE,
};
use std::collections::HashMap;
use storage::{FileLocation, PendingActions};
use tracing::{debug, info};

/// Handle an LFS batch request.
///
/// Downloads already held in the Permanent cache are not sent upstream, and
/// every download action in the reply points back at this proxy.
pub async fn batch(
    path: web::Path<(i64, String)>,
    body: web::Bytes,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let (host_id, repo) = path.into_inner();
    let host = state.resolve_host(host_id).await?;
    validate_repository_name(&repo).map_err(|e| StatusCodeError::new(400, e.message()))?;

    let request: BatchRequest = parse_slice(&body)?;
    info!(
        host_id,
        repo = ?repo,
        operation = %request.operation,
        objects = request.objects.len(),
        "POST batch - Request received"
    );

    let pending = match request.operation {
        Operation::Download => {
            let mut missing = Vec::new();
            for id in &request.objects {
                if !state
                    .store
                    .exists(&repo, id, FileLocation::Permanent, true, None)
                    .await?
                {
                    missing.push(id.clone());
                }
            }
            missing
        }
        Operation::Upload => request.objects.clone(),
    };

    let mut upstream_entities: HashMap<ObjectId, BatchEntity> = HashMap::new();
    if !pending.is_empty() {
        debug!(pending = pending.len(), "Forwarding batch upstream");
        let transfer = state
            .upstream
            .request_batch(&host, &repo, &request.with_objects(pending))
            .await?;

        for entity in transfer.objects {
            if let BatchEntity::Success(object) = &entity {
                for action in object.actions.values() {
                    PendingActions::save(state.store.as_ref(), &repo, &object.id, action).await?;
                }
            }
            upstream_entities.insert(entity.id().clone(), entity);
        }
    }

    let base = state.public_base(&req);
    let objects = request
        .objects
        .iter()
        .map(|id| match (request.operation, upstream_entities.get(id)) {
            (_, Some(BatchEntity::Error(error))) => BatchEntity::Error(error.clone()),
            (Operation::Upload, Some(entity)) => entity.clone(),
            // Not returned by upstream: nothing to transfer
            (Operation::Upload, None) => BatchEntity::Success(BatchObject::new(id.clone())),
            (Operation::Download, _) => proxied_download(&base, host_id, &repo, id),
        })
        .collect();

    let transfer = BatchTransfer {
        mode: Some(TransferMode::Basic),
        objects,
        hash_algo: request.hash_algo.clone(),
    };

    Ok(HttpResponse::Ok()
        .content_type(LFS_CONTENT_TYPE)
        .body(serialize(&transfer)?))
}

/// Entity whose download action is served by this proxy
fn proxied_download(base: &str, host_id: i64, repo: &str, id: &ObjectId) -> BatchEntity {
    let href = format!(
        "{}/api/{}/{}/info/lfs/{}/{}",
        base,
        host_id,
        repo,
        id.hash(),
        id.size()
    );
    let mut object = BatchObject::new(id.clone())
        .with_action(BatchObjectAction::new(ActionMode::Download, href));
    object.authenticated = Some(true);
    BatchEntity::Success(object)
}
