//! HTTP request handlers

pub mod batch;
pub mod download;
pub mod error;
pub mod health;
pub mod upload;
pub mod verify;

use actix_web::web;

/// Batch requests for `{repo}` on host `{host_id}`
pub const BATCH_ROUTE: &str = "/api/{host_id}/{repo:.+}/info/lfs/objects/batch";

/// Object downloads and uploads
pub const OBJECT_ROUTE: &str = "/api/{host_id}/{repo:.+}/info/lfs/{oid}/{size}";

/// Upload verification
pub const VERIFY_ROUTE: &str = "/api/{host_id}/{repo:.+}/info/lfs/verify/{oid}/{size}";

/// Register every LFS route and the health probe
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health)
        .service(web::resource(BATCH_ROUTE).route(web::post().to(batch::batch)))
        .service(web::resource(VERIFY_ROUTE).route(web::post().to(verify::verify)))
        .service(
            web::resource(OBJECT_ROUTE)
                .route(web::get().to(download::download))
                .route(web::put().to(upload::upload)),
        );
}
