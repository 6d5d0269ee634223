//! Cache administration handlers.
//!
//! - GET    /api/cache                          -> aggregate key counts
//! - DELETE /api/cache?action=clear-all         -> drop all page/meta keys
//! - DELETE /api/cache?action=clear-prefix&prefix=p -> drop one prefix

use crate::{
    errors::AppError, models::listing::CacheStats, services::listing_service::ListingService,
};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ClearCacheQuery {
    pub action: Option<String>,
    pub prefix: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<CacheStats>,
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// GET `/api/cache` — key counts by kind.
pub async fn cache_stats(State(service): State<ListingService>) -> Json<CacheStatsResponse> {
    if !service.cache_healthy().await {
        return Json(CacheStatsResponse {
            success: false,
            message: "cache disabled or unreachable".into(),
            data: None,
        });
    }
    let stats = service.cache_stats().await;
    Json(CacheStatsResponse {
        success: true,
        message: "ok".into(),
        data: Some(stats),
    })
}

/// DELETE `/api/cache?action=clear-all|clear-prefix` — cache invalidation.
pub async fn clear_cache(
    State(service): State<ListingService>,
    Query(q): Query<ClearCacheQuery>,
) -> Result<Json<ClearCacheResponse>, AppError> {
    match (q.action.as_deref(), q.prefix) {
        (Some("clear-all"), _) => {
            let success = service.clear_cache().await;
            Ok(Json(ClearCacheResponse {
                success,
                message: if success {
                    "cleared all listing cache entries".into()
                } else {
                    "failed to clear cache".into()
                },
                prefix: None,
            }))
        }
        (Some("clear-prefix"), Some(prefix)) => {
            let success = service.clear_prefix_cache(&prefix).await;
            Ok(Json(ClearCacheResponse {
                success,
                message: if success {
                    format!("cleared cache for prefix `{prefix}`")
                } else {
                    "failed to clear cache".into()
                },
                prefix: Some(prefix),
            }))
        }
        _ => Err(AppError::bad_request(
            "invalid action; supported: clear-all, clear-prefix (requires prefix)",
        )),
    }
}
