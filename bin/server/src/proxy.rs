//! Forwarding of non-LFS Git traffic to the upstream host.
//!
//! Requests below `/api/{host_id}/` that are not served by the LFS handlers
//! are replayed against the registered host with method, headers and body
//! copied as they arrived. Everything else continues down the chain.

use crate::handlers::error::ApiError;
use crate::state::AppState;
use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpResponse};
use common::file_utils::validate_oid;
use tracing::{debug, info, warn};

const API_PREFIX: &str = "/api/";
const LFS_SEGMENT: &str = "/info/lfs/";

/// Headers that describe a single connection and are never copied
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Split `/api/{host_id}/{rest}` into its host id and the remaining path
fn split_api_path(path: &str) -> Option<(i64, &str)> {
    let tail = path.strip_prefix(API_PREFIX)?;
    let (id, rest) = tail.split_once('/')?;
    let id = id.parse().ok()?;
    if rest.is_empty() {
        return None;
    }
    Some((id, rest))
}

/// True when `rest` names a route the LFS handlers serve
fn is_lfs_route(rest: &str) -> bool {
    let Some(index) = rest.find(LFS_SEGMENT) else {
        return false;
    };
    let tail = &rest[index + LFS_SEGMENT.len()..];
    if tail == "objects/batch" {
        return true;
    }

    let segments: Vec<&str> = tail.split('/').collect();
    let object = match segments.as_slice() {
        ["verify", oid, size] => (*oid, *size),
        [oid, size] => (*oid, *size),
        _ => return false,
    };
    validate_oid(object.0).is_ok() && object.1.parse::<i64>().is_ok()
}

fn copy_request_header(name: &str) -> bool {
    !matches!(name, "host" | "content-length") && !HOP_BY_HOP.contains(&name)
}

fn copy_response_header(name: &str) -> bool {
    name != "content-length" && !HOP_BY_HOP.contains(&name)
}

fn method_has_body(method: &actix_web::http::Method) -> bool {
    !matches!(method.as_str(), "GET" | "HEAD" | "DELETE" | "TRACE")
}

/// Middleware forwarding Git traffic for registered hosts
pub async fn reverse_proxy<B: MessageBody + 'static>(
    mut req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let target = match split_api_path(req.path()) {
        Some((host_id, rest)) if !is_lfs_route(rest) => Some((host_id, rest.to_string())),
        _ => None,
    };
    let Some((host_id, rest)) = target else {
        return next.call(req).await.map(ServiceResponse::map_into_left_body);
    };

    let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
        return next.call(req).await.map(ServiceResponse::map_into_left_body);
    };
    let host = match state.hosts.lookup(host_id).await {
        Ok(Some(host)) => host,
        Ok(None) => {
            debug!(host_id, "No registered host, passing request on");
            return next.call(req).await.map(ServiceResponse::map_into_left_body);
        }
        Err(e) => {
            warn!(host_id, error = %e, "Host lookup failed, passing request on");
            return next.call(req).await.map(ServiceResponse::map_into_left_body);
        }
    };

    let response = match forward(&mut req, &state, &host.url_for(&rest), host_id).await {
        Ok(response) => response,
        Err(e) => e.error_response(),
    };
    Ok(req.into_response(response).map_into_right_body())
}

/// Replay `req` against `target` and copy the answer back
async fn forward(
    req: &mut ServiceRequest,
    state: &AppState,
    target: &str,
    host_id: i64,
) -> Result<HttpResponse, Error> {
    let mut url = target.to_string();
    if !req.query_string().is_empty() {
        url.push('?');
        url.push_str(req.query_string());
    }

    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .map_err(|e| ApiError::Gateway(e.to_string()))?;
    let mut outbound = state.http.request(method, &url);
    for (name, value) in req.headers() {
        if copy_request_header(name.as_str()) {
            outbound = outbound.header(name.as_str(), value.as_bytes());
        }
    }
    if method_has_body(req.method()) {
        let body = req.extract::<web::Bytes>().await?;
        outbound = outbound.body(body);
    }

    info!(host_id, method = %req.method(), url = %url, "Forwarding request upstream");
    let upstream = outbound
        .send()
        .await
        .map_err(|e| ApiError::Gateway(e.to_string()))?;

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .map_err(|e| ApiError::Gateway(e.to_string()))?;
    let mut response = HttpResponse::build(status);
    for (name, value) in upstream.headers() {
        if copy_response_header(name.as_str()) {
            response.append_header((name.as_str(), value.as_bytes()));
        }
    }
    debug!(host_id, status = status.as_u16(), "Upstream answered forwarded request");

    Ok(response.streaming(upstream.bytes_stream()))
}
