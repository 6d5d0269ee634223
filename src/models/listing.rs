//! Cache records and response shapes for paginated prefix listings.

use crate::models::entry::ObjectEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-prefix cache record; authoritative for pagination math and folders.
///
/// One instance exists per (bucket, prefix) cache generation. It is created
/// or replaced atomically on rebuild, expires with the cache TTL, and is
/// invalidated early when a request's page size disagrees with `page_size`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrefixMetadata {
    pub total_objects: u64,
    pub total_folders: u64,
    pub total_pages: u32,
    pub page_size: u32,
    /// Every folder under the prefix, in first-seen order. Folders are never
    /// paginated; each page response carries the full list.
    pub all_folders: Vec<ObjectEntry>,
    pub root_prefix: String,
    pub cached_at: DateTime<Utc>,
}

/// One cached page of file entries for a prefix.
///
/// Written as part of the same batch as [`PrefixMetadata`] and never
/// partially updated.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageData {
    pub objects: Vec<ObjectEntry>,
    /// 0-based page index.
    pub page_index: u32,
    pub page_size: u32,
}

/// The paginated listing response returned by `GET /api/files`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListResult {
    /// This page's files only.
    pub objects: Vec<ObjectEntry>,
    /// All folders under the prefix, regardless of page.
    pub folders: Vec<ObjectEntry>,
    pub total_objects: u64,
    pub total_folders: u64,
    /// 1-based page number as requested.
    pub current_page: u32,
    pub total_pages: u32,
    pub page_size: u32,
    /// The configured bucket root prefix, so the UI can build absolute paths.
    pub root_prefix: String,
}

/// Metadata for a single object, returned by `GET /api/info`.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
}

/// Aggregate cache key counts reported by `GET /api/cache`.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_keys: u64,
    pub page_keys: u64,
    pub meta_keys: u64,
    pub lock_keys: u64,
}
