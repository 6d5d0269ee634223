//! Defines routes for the listing API and operational endpoints.
//!
//! ## Structure
//! - **Listing endpoints**
//!   - `GET    /api/files`    — paginated prefix listing (prefix, page, pageSize)
//!   - `GET    /api/download` — presigned download URL for a key
//!   - `GET    /api/info`     — object metadata for a key
//!
//! - **Cache administration**
//!   - `GET    /api/cache` — key counts by kind
//!   - `DELETE /api/cache` — clear-all / clear-prefix invalidation
//!
//! The router carries shared state (`ListingService`) to all handlers.

use crate::{
    handlers::{
        cache_handlers::{cache_stats, clear_cache},
        file_handlers::{download_url, list_files, object_info},
        health_handlers::{healthz, readyz},
    },
    services::listing_service::ListingService,
};
use axum::{Router, routing::get};

/// Build and return the router for all listing-service routes.
pub fn routes() -> Router<ListingService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Listing API
        .route("/api/files", get(list_files))
        .route("/api/download", get(download_url))
        .route("/api/info", get(object_info))
        // Cache administration
        .route("/api/cache", get(cache_stats).delete(clear_cache))
}
