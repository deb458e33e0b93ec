mod config;
mod constants;
mod handlers;
mod locks;
mod proxy;
mod state;
#[cfg(test)]
mod test_support;

use crate::constants::MAX_BUFFERED_BODY;
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::middleware::{from_fn, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use config::ServerConfig;
use state::AppState;
use std::sync::Arc;
use storage::FilesystemStore;
use tracing::{error, info};
use upstream::LfsClient;

/// Application with every route, the forwarding middleware and access logging
pub fn create_app(
    state: web::Data<AppState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(state)
        .app_data(web::PayloadConfig::new(MAX_BUFFERED_BODY))
        .configure(handlers::configure)
        .wrap(from_fn(proxy::reverse_proxy))
        .wrap(Logger::default())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Filter out actix-server worker shutdown messages
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info")
                    .add_directive("actix_server::worker=warn".parse().unwrap())
                    .add_directive("actix_server::accept=warn".parse().unwrap())
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting LFS caching proxy (PID: {})", std::process::id());

    let config = ServerConfig::load()?;

    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("Failed to create data directory {}", config.data_dir.display())
    })?;
    info!(data_dir = %config.data_dir.display(), "Using filesystem object store");
    let store = Arc::new(FilesystemStore::new(&config.data_dir));

    info!(registry = ?config.registry_type, "Initializing host registry");
    let hosts = config
        .registry_backend()
        .initialize()
        .await
        .map_err(|e| {
            error!("Failed to initialize host registry: {}", e);
            e
        })
        .context("Failed to initialize host registry")?;

    let state = web::Data::new(AppState::new(
        store,
        Arc::new(LfsClient::new()),
        hosts,
        config.public_url.clone(),
    ));

    let bind_address = config.bind_address();
    info!("Starting server on http://{}", bind_address);

    let mut server = HttpServer::new(move || create_app(state.clone()));
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }
    let server = server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind to {}", bind_address))?;

    info!("Server bound successfully to http://{}", bind_address);

    // Runs until a shutdown signal is received
    server.run().await?;
    Ok(())
}
