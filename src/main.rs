use anyhow::Result;
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!(
        bucket = %cfg.bucket,
        region = %cfg.region,
        endpoint = cfg.endpoint.as_deref().unwrap_or("aws"),
        root_prefix = %cfg.root_prefix,
        cache_enabled = cfg.cache_enabled,
        page_size = cfg.page_size,
        "Starting s3-explorer"
    );

    // --- Initialize object store client ---
    let store = Arc::new(services::object_store::S3ObjectStore::new(
        cfg.bucket.clone(),
        cfg.region.clone(),
        cfg.endpoint.clone(),
        cfg.access_key_id.clone(),
        cfg.secret_access_key.clone(),
    ));

    // --- Initialize cache store (connection is dialed lazily) ---
    let cache = Arc::new(services::cache_store::RedisCacheStore::new(
        cfg.effective_redis_url(),
    ));
    if !cfg.cache_enabled {
        tracing::warn!("Listing cache disabled; every request will hit the object store");
    }

    // --- Initialize core service ---
    let listing = services::listing_service::ListingService::new(
        store,
        cache,
        cfg.bucket.clone(),
        cfg.root_prefix.clone(),
        cfg.page_size,
    );

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(listing);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
