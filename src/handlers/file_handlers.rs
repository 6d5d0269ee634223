//! HTTP handlers for listing, download links, and object info.
//! Thin translation layer: query parameters in, `ListingService` out.

use crate::{
    errors::AppError,
    models::listing::{ListResult, ObjectMetadata},
    services::listing_service::ListingService,
};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default presigned URL lifetime (1 hour) and its upper bound (7 days, the
/// SigV4 maximum).
const DEFAULT_URL_TTL_SECS: u64 = 3600;
const MAX_URL_TTL_SECS: u64 = 7 * 24 * 3600;

/// Query params accepted by `GET /api/files`.
#[derive(Debug, Deserialize)]
pub struct ListFilesQuery {
    #[serde(default)]
    pub prefix: String,
    pub page: Option<u32>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
}

/// Query params accepted by `GET /api/download` and `GET /api/info`.
#[derive(Debug, Deserialize)]
pub struct ObjectQuery {
    pub key: String,
    #[serde(rename = "expiresIn")]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub url: String,
}

/// GET `/api/files?prefix=&page=&pageSize=` — paginated prefix listing.
pub async fn list_files(
    State(service): State<ListingService>,
    Query(q): Query<ListFilesQuery>,
) -> Result<Json<ListResult>, AppError> {
    let page = q.page.unwrap_or(1).max(1);
    let page_size = q
        .page_size
        .unwrap_or_else(|| service.default_page_size())
        .max(1);

    let result = service.list(&q.prefix, page, page_size).await?;
    Ok(Json(result))
}

/// GET `/api/download?key=&expiresIn=` — presigned download URL.
pub async fn download_url(
    State(service): State<ListingService>,
    Query(q): Query<ObjectQuery>,
) -> Result<Json<DownloadResponse>, AppError> {
    if q.key.is_empty() {
        return Err(AppError::bad_request("key is required"));
    }
    let ttl = q
        .expires_in
        .unwrap_or(DEFAULT_URL_TTL_SECS)
        .clamp(1, MAX_URL_TTL_SECS);

    let url = service
        .signed_download_url(&q.key, Duration::from_secs(ttl))
        .await?;
    Ok(Json(DownloadResponse { url }))
}

/// GET `/api/info?key=` — size, mtime, and content type of one object.
pub async fn object_info(
    State(service): State<ListingService>,
    Query(q): Query<ObjectQuery>,
) -> Result<Json<ObjectMetadata>, AppError> {
    if q.key.is_empty() {
        return Err(AppError::bad_request("key is required"));
    }
    let info = service.object_info(&q.key).await?;
    Ok(Json(info))
}
