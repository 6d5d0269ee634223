//! src/services/listing_service.rs
//!
//! ListingService — the cache-coherent pagination engine. For every
//! (prefix, page, pageSize) query it decides whether to serve from the Redis
//! cache, rebuild the cache, or fall back to a direct store enumeration,
//! coordinating concurrent requests through a distributed lock so that at
//! most one rebuild per prefix runs at a time.
//!
//! The cache holds one metadata record plus one record per page for each
//! (bucket, prefix) generation. Rebuilds enumerate the full prefix once,
//! partition the files into fixed-size pages, and batch-write the whole
//! generation with a 24-hour TTL. Losers of the rebuild race wait on the
//! lock and re-read; if the wait times out they answer with an uncached
//! single-shot enumeration that is never written back.

use crate::models::{
    entry::ObjectEntry,
    listing::{CacheStats, ListResult, ObjectMetadata, PageData, PrefixMetadata},
};
use crate::services::{
    cache_store::CacheStore,
    lock::DistributedLock,
    object_store::{ObjectStore, PrefixListing, StoreResult},
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifetime of a cached listing generation.
const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Rebuild lock TTL; protects against a crashed rebuilder holding the lock
/// forever.
const LOCK_TTL: Duration = Duration::from_secs(30);

/// How long a losing request waits for the winner before going direct.
const LOCK_WAIT: Duration = Duration::from_secs(10);

/// Strip leading and trailing slashes from a request prefix for key naming.
pub fn clean_prefix(prefix: &str) -> &str {
    prefix.trim_matches('/')
}

/// Cache key for one page of a prefix listing.
pub fn page_key(bucket: &str, prefix: &str, page_index: u32) -> String {
    format!("s3:page:{}:{}:{}", bucket, clean_prefix(prefix), page_index)
}

/// Cache key for a prefix's metadata record.
pub fn meta_key(bucket: &str, prefix: &str) -> String {
    format!("s3:meta:{}:{}", bucket, clean_prefix(prefix))
}

/// Cache key for a prefix's rebuild lock.
pub fn lock_key(bucket: &str, prefix: &str) -> String {
    format!("s3:lock:{}:{}", bucket, clean_prefix(prefix))
}

/// ListingService answers paginated listing queries over one bucket:
/// - List a prefix page (cached, rebuilding, or direct)
/// - Presigned download URLs and per-object metadata (delegated to the store)
/// - Cache administration (stats, clear-all, clear-prefix)
///
/// Shared as the router state; all fields are stateless-after-construction
/// handles, so cloning is cheap and requests coordinate only through the
/// cache store's atomic primitives.
#[derive(Clone)]
pub struct ListingService {
    store: Arc<dyn ObjectStore>,
    cache: Arc<dyn CacheStore>,
    lock: DistributedLock,
    bucket: String,
    root_prefix: String,
    default_page_size: u32,
}

impl ListingService {
    /// Create a service over explicitly injected store and cache handles.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        cache: Arc<dyn CacheStore>,
        bucket: impl Into<String>,
        root_prefix: impl Into<String>,
        default_page_size: u32,
    ) -> Self {
        let lock = DistributedLock::new(cache.clone());
        Self {
            store,
            cache,
            lock,
            bucket: bucket.into(),
            root_prefix: root_prefix.into(),
            default_page_size: default_page_size.max(1),
        }
    }

    /// Page size applied when a request does not specify one.
    pub fn default_page_size(&self) -> u32 {
        self.default_page_size
    }

    /// Answer a listing query. `page` is 1-based; pages beyond the end yield
    /// an empty object list with correct totals.
    pub async fn list(&self, prefix: &str, page: u32, page_size: u32) -> StoreResult<ListResult> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        if let Some(meta) = self.read_meta(prefix).await {
            if meta.page_size == page_size {
                return self.read_page(prefix, meta, page, page_size).await;
            }
            info!(
                prefix,
                cached = meta.page_size,
                requested = page_size,
                "page size changed, purging prefix cache"
            );
            self.purge_prefix(prefix).await;
        }

        // Cache miss: contend for the rebuild lock. Exactly one concurrent
        // request wins and enumerates the store.
        let lock_key = lock_key(&self.bucket, prefix);
        if let Some(token) = self.lock.acquire(&lock_key, LOCK_TTL).await {
            let result = self.rebuild_and_serve(prefix, page, page_size).await;
            // The lock must never leak, including on a failed rebuild;
            // otherwise every request for this prefix stalls until the TTL.
            self.lock.release(&lock_key, &token).await;
            return result;
        }

        // Loser path: wait for the winner, then re-read what it wrote.
        if self.lock.wait_for_release(&lock_key, LOCK_WAIT).await {
            if let Some(meta) = self.read_meta(prefix).await {
                if meta.page_size == page_size {
                    return self.read_page(prefix, meta, page, page_size).await;
                }
            }
            debug!(prefix, "metadata absent after lock release, going direct");
        } else {
            warn!(prefix, "timed out waiting for rebuild lock, going direct");
        }
        self.list_direct(prefix, page, page_size).await
    }

    /// Presigned download URL for a single object.
    pub async fn signed_download_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> StoreResult<String> {
        self.store.signed_url(key, expires_in).await
    }

    /// Size, mtime, and content type for a single object.
    pub async fn object_info(&self, key: &str) -> StoreResult<ObjectMetadata> {
        self.store.object_metadata(key).await
    }

    /// Whether the backing cache currently answers.
    pub async fn cache_healthy(&self) -> bool {
        self.cache.healthy().await
    }

    /// Aggregate key counts by kind.
    pub async fn cache_stats(&self) -> CacheStats {
        CacheStats {
            total_keys: self.cache.keys_matching("s3:*").await.len() as u64,
            page_keys: self.cache.keys_matching("s3:page:*").await.len() as u64,
            meta_keys: self.cache.keys_matching("s3:meta:*").await.len() as u64,
            lock_keys: self.cache.keys_matching("s3:lock:*").await.len() as u64,
        }
    }

    /// Drop every cached page and metadata record, across all prefixes.
    /// Lock keys are left to expire so in-flight rebuilds are not orphaned.
    pub async fn clear_cache(&self) -> bool {
        let mut keys = self.cache.keys_matching("s3:page:*").await;
        keys.extend(self.cache.keys_matching("s3:meta:*").await);
        if keys.is_empty() {
            return true;
        }
        self.cache.delete(&keys).await
    }

    /// Drop all cached records for one prefix (every page plus metadata).
    pub async fn clear_prefix_cache(&self, prefix: &str) -> bool {
        self.purge_prefix(prefix).await
    }

    /// The full store-side prefix for a request prefix: the configured root
    /// prefix joined in front, duplicate slashes collapsed.
    fn full_prefix(&self, prefix: &str) -> String {
        if self.root_prefix.is_empty() {
            return prefix.to_string();
        }
        collapse_slashes(&format!("{}/{}", self.root_prefix, prefix))
    }

    async fn read_meta(&self, prefix: &str) -> Option<PrefixMetadata> {
        let bytes = self.cache.get(&meta_key(&self.bucket, prefix)).await?;
        match serde_json::from_slice(&bytes) {
            Ok(meta) => Some(meta),
            Err(err) => {
                warn!(prefix, "discarding undecodable cached metadata: {err}");
                None
            }
        }
    }

    /// Serve a page given valid metadata in hand.
    async fn read_page(
        &self,
        prefix: &str,
        meta: PrefixMetadata,
        page: u32,
        page_size: u32,
    ) -> StoreResult<ListResult> {
        let page_index = page - 1;

        // Pages past the end have no cache entry by construction; answer
        // straight from the metadata.
        if page_index >= meta.total_pages {
            return Ok(self.result_from_meta(&meta, Vec::new(), page, page_size));
        }

        if let Some(bytes) = self
            .cache
            .get(&page_key(&self.bucket, prefix, page_index))
            .await
        {
            match serde_json::from_slice::<PageData>(&bytes) {
                Ok(page_data) => {
                    return Ok(self.result_from_meta(&meta, page_data.objects, page, page_size));
                }
                Err(err) => warn!(prefix, page_index, "undecodable cached page: {err}"),
            }
        }

        // Rare consistency anomaly: metadata hit but the page is missing
        // (the batch write is not atomic across the network boundary).
        // Recompute this page's objects with a fresh enumeration, keep the
        // metadata's folders and counts, and write nothing back.
        warn!(prefix, page_index, "cached page missing after metadata hit, recomputing");
        let listing = self.store.list_full_prefix(&self.full_prefix(prefix)).await?;
        let objects = slice_page(&listing.objects, page_index, page_size);
        Ok(self.result_from_meta(&meta, objects, page, page_size))
    }

    /// Winner path: enumerate once, partition, write the generation, answer
    /// from the partition just built.
    async fn rebuild_and_serve(
        &self,
        prefix: &str,
        page: u32,
        page_size: u32,
    ) -> StoreResult<ListResult> {
        // Another writer may have finished between our miss and the acquire.
        if let Some(meta) = self.read_meta(prefix).await {
            if meta.page_size == page_size {
                debug!(prefix, "fresh metadata appeared under the lock, skipping rebuild");
                return self.read_page(prefix, meta, page, page_size).await;
            }
            self.purge_prefix(prefix).await;
        }

        let started = std::time::Instant::now();
        let listing = self.store.list_full_prefix(&self.full_prefix(prefix)).await?;
        let (meta, pages) = self.partition(listing, page_size);
        if !self.write_generation(prefix, &meta, &pages).await {
            warn!(prefix, "cache write failed, serving rebuilt listing uncached");
        }
        info!(
            prefix,
            objects = meta.total_objects,
            folders = meta.total_folders,
            pages = meta.total_pages,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "prefix cache rebuilt"
        );

        // Answer from memory rather than re-reading our own write: same
        // bytes, and it still works when the cache write just failed.
        let page_index = page - 1;
        let objects = pages
            .iter()
            .find(|p| p.page_index == page_index)
            .map(|p| p.objects.clone())
            .unwrap_or_default();
        Ok(self.result_from_meta(&meta, objects, page, page_size))
    }

    /// Uncached single-shot enumeration with an in-memory slice. Never
    /// written to cache: fallbacks run under uncertain conditions.
    async fn list_direct(&self, prefix: &str, page: u32, page_size: u32) -> StoreResult<ListResult> {
        let listing = self.store.list_full_prefix(&self.full_prefix(prefix)).await?;
        let page_index = page - 1;
        let total_objects = listing.objects.len() as u64;
        let objects = slice_page(&listing.objects, page_index, page_size);
        Ok(ListResult {
            objects,
            total_objects,
            total_folders: listing.folders.len() as u64,
            folders: listing.folders,
            current_page: page,
            total_pages: total_objects.div_ceil(page_size as u64) as u32,
            page_size,
            root_prefix: self.root_prefix.clone(),
        })
    }

    /// Split a full enumeration into the cacheable generation: contiguous
    /// pages of exactly `page_size` entries (last page may be short) plus
    /// the metadata record that makes the pagination math authoritative.
    fn partition(&self, listing: PrefixListing, page_size: u32) -> (PrefixMetadata, Vec<PageData>) {
        let total_objects = listing.objects.len() as u64;
        let pages: Vec<PageData> = listing
            .objects
            .chunks(page_size as usize)
            .enumerate()
            .map(|(index, chunk)| PageData {
                objects: chunk.to_vec(),
                page_index: index as u32,
                page_size,
            })
            .collect();
        let meta = PrefixMetadata {
            total_objects,
            total_folders: listing.folders.len() as u64,
            total_pages: total_objects.div_ceil(page_size as u64) as u32,
            page_size,
            all_folders: listing.folders,
            root_prefix: self.root_prefix.clone(),
            cached_at: Utc::now(),
        };
        (meta, pages)
    }

    /// Batch-write one generation. Metadata goes last in the pipeline so a
    /// reader observing it can assume the pages were queued before it.
    async fn write_generation(
        &self,
        prefix: &str,
        meta: &PrefixMetadata,
        pages: &[PageData],
    ) -> bool {
        let mut entries = Vec::with_capacity(pages.len() + 1);
        for page in pages {
            match serde_json::to_vec(page) {
                Ok(bytes) => entries.push((page_key(&self.bucket, prefix, page.page_index), bytes)),
                Err(err) => {
                    warn!(prefix, page_index = page.page_index, "page encode failed: {err}");
                    return false;
                }
            }
        }
        match serde_json::to_vec(meta) {
            Ok(bytes) => entries.push((meta_key(&self.bucket, prefix), bytes)),
            Err(err) => {
                warn!(prefix, "metadata encode failed: {err}");
                return false;
            }
        }
        self.cache.set_batch_with_ttl(entries, CACHE_TTL).await
    }

    /// Delete every cached record for a prefix: all page keys plus metadata.
    async fn purge_prefix(&self, prefix: &str) -> bool {
        let pattern = format!("s3:page:{}:{}:*", self.bucket, clean_prefix(prefix));
        let mut keys = self.cache.keys_matching(&pattern).await;
        keys.push(meta_key(&self.bucket, prefix));
        debug!(prefix, keys = keys.len(), "purging prefix cache");
        self.cache.delete(&keys).await
    }

    fn result_from_meta(
        &self,
        meta: &PrefixMetadata,
        objects: Vec<ObjectEntry>,
        page: u32,
        page_size: u32,
    ) -> ListResult {
        ListResult {
            objects,
            folders: meta.all_folders.clone(),
            total_objects: meta.total_objects,
            total_folders: meta.total_folders,
            current_page: page,
            total_pages: meta.total_pages,
            page_size,
            root_prefix: self.root_prefix.clone(),
        }
    }
}

/// Slice one page out of a full in-memory object list, clamping the end
/// bound. Out-of-range pages yield an empty slice.
fn slice_page(objects: &[ObjectEntry], page_index: u32, page_size: u32) -> Vec<ObjectEntry> {
    let start = page_index as usize * page_size as usize;
    if start >= objects.len() {
        return Vec::new();
    }
    let end = (start + page_size as usize).min(objects.len());
    objects[start..end].to_vec()
}

fn collapse_slashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_slash = false;
    for c in s.chars() {
        if c == '/' && prev_slash {
            continue;
        }
        prev_slash = c == '/';
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::entry::ObjectEntry;
    use crate::services::cache_store::MemoryCacheStore;
    use crate::services::object_store::{StoreError, StoreResult};
    use async_trait::async_trait;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Call-counting object store over a fixed listing.
    struct MockObjectStore {
        listing: PrefixListing,
        calls: AtomicUsize,
        delay: Duration,
        fail: AtomicBool,
    }

    impl MockObjectStore {
        fn with_objects(prefix: &str, count: usize) -> Self {
            let objects = (0..count)
                .map(|i| {
                    ObjectEntry::file(
                        format!("{prefix}img{i:04}.jpg"),
                        prefix,
                        (i as u64 + 1) * 10,
                        Utc::now(),
                    )
                })
                .collect();
            Self {
                listing: PrefixListing {
                    objects,
                    folders: Vec::new(),
                },
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: AtomicBool::new(false),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn with_folders(mut self, prefix: &str, names: &[&str]) -> Self {
            let now = Utc::now();
            self.listing.folders = names
                .iter()
                .map(|name| ObjectEntry::folder(format!("{prefix}{name}/"), prefix, now))
                .collect();
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ObjectStore for MockObjectStore {
        async fn list_full_prefix(&self, _full_prefix: &str) -> StoreResult<PrefixListing> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay > Duration::ZERO {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Request("mock failure".into()));
            }
            Ok(self.listing.clone())
        }

        async fn object_metadata(&self, key: &str) -> StoreResult<crate::models::listing::ObjectMetadata> {
            Err(StoreError::NotFound {
                bucket: "test-bucket".into(),
                key: key.into(),
            })
        }

        async fn signed_url(&self, key: &str, _expires_in: Duration) -> StoreResult<String> {
            Ok(format!("https://example.test/{key}?signed"))
        }
    }

    fn service(store: Arc<MockObjectStore>) -> (ListingService, Arc<MemoryCacheStore>) {
        let cache = Arc::new(MemoryCacheStore::new());
        let svc = ListingService::new(store, cache.clone(), "test-bucket", "", 50);
        (svc, cache)
    }

    #[test]
    fn key_naming_matches_cache_tooling() {
        assert_eq!(page_key("b", "/photos/sub/", 2), "s3:page:b:photos/sub:2");
        assert_eq!(meta_key("b", "photos"), "s3:meta:b:photos");
        assert_eq!(lock_key("b", ""), "s3:lock:b:");
        assert_eq!(clean_prefix("//a/b//"), "a/b");
    }

    #[test]
    fn slice_clamps_and_empties() {
        let objects: Vec<ObjectEntry> = (0..5)
            .map(|i| ObjectEntry::file(format!("k{i}"), "", 1, Utc::now()))
            .collect();
        assert_eq!(slice_page(&objects, 0, 2).len(), 2);
        assert_eq!(slice_page(&objects, 2, 2).len(), 1);
        assert_eq!(slice_page(&objects, 3, 2).len(), 0);
    }

    #[tokio::test]
    async fn pages_through_120_objects() {
        let store = Arc::new(MockObjectStore::with_objects("photos/", 120));
        let (svc, _cache) = service(store.clone());

        let first = svc.list("photos/", 1, 50).await.unwrap();
        assert_eq!(first.objects.len(), 50);
        assert_eq!(first.total_objects, 120);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.total_folders, 0);
        assert_eq!(first.current_page, 1);
        assert_eq!(first.objects[0].name, "img0000.jpg");

        let last = svc.list("photos/", 3, 50).await.unwrap();
        assert_eq!(last.objects.len(), 20);
        assert_eq!(last.objects[0].name, "img0100.jpg");

        let past_end = svc.list("photos/", 4, 50).await.unwrap();
        assert_eq!(past_end.objects.len(), 0);
        assert_eq!(past_end.total_pages, 3);
        assert_eq!(past_end.total_objects, 120);

        // One rebuild serves all three requests; the out-of-range page in
        // particular must not trigger an enumeration.
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn cached_partition_covers_every_object_exactly_once() {
        let store = Arc::new(MockObjectStore::with_objects("photos/", 120));
        let (svc, cache) = service(store);
        svc.list("photos/", 1, 50).await.unwrap();

        let meta: PrefixMetadata = serde_json::from_slice(
            &cache.get(&meta_key("test-bucket", "photos/")).await.unwrap(),
        )
        .unwrap();
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.page_size, 50);

        let mut total = 0usize;
        for index in 0..meta.total_pages {
            let page: PageData = serde_json::from_slice(
                &cache
                    .get(&page_key("test-bucket", "photos/", index))
                    .await
                    .unwrap(),
            )
            .unwrap();
            if index + 1 < meta.total_pages {
                assert_eq!(page.objects.len(), 50);
            }
            total += page.objects.len();
        }
        assert_eq!(total as u64, meta.total_objects);
        // No page beyond the last.
        assert!(
            cache
                .get(&page_key("test-bucket", "photos/", meta.total_pages))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn rebuild_is_idempotent() {
        let store = Arc::new(MockObjectStore::with_objects("photos/", 73));
        let (svc, _cache) = service(store.clone());

        let first = svc.list("photos/", 2, 25).await.unwrap();
        assert!(svc.clear_cache().await);
        let second = svc.list("photos/", 2, 25).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_cold_requests_enumerate_once() {
        let store = Arc::new(
            MockObjectStore::with_objects("photos/", 120).with_delay(Duration::from_millis(150)),
        );
        let (svc, _cache) = service(store.clone());

        let tasks = (0..8).map(|_| {
            let svc = svc.clone();
            tokio::spawn(async move { svc.list("photos/", 1, 50).await.unwrap() })
        });
        let results: Vec<ListResult> = join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(store.calls(), 1);
        for result in &results {
            assert_eq!(result, &results[0]);
        }
    }

    #[tokio::test]
    async fn page_size_change_purges_and_rebuilds() {
        let store = Arc::new(MockObjectStore::with_objects("photos/", 120));
        let (svc, cache) = service(store.clone());

        svc.list("photos/", 1, 50).await.unwrap();
        assert_eq!(
            cache.keys_matching("s3:page:test-bucket:photos:*").await.len(),
            3
        );

        let resized = svc.list("photos/", 1, 20).await.unwrap();
        assert_eq!(resized.objects.len(), 20);
        assert_eq!(resized.total_pages, 6);
        assert_eq!(store.calls(), 2);

        let meta: PrefixMetadata = serde_json::from_slice(
            &cache.get(&meta_key("test-bucket", "photos/")).await.unwrap(),
        )
        .unwrap();
        assert_eq!(meta.page_size, 20);
        assert_eq!(
            cache.keys_matching("s3:page:test-bucket:photos:*").await.len(),
            6
        );
    }

    #[tokio::test]
    async fn missing_page_after_metadata_hit_self_heals() {
        let store = Arc::new(MockObjectStore::with_objects("photos/", 120));
        let (svc, cache) = service(store.clone());
        svc.list("photos/", 1, 50).await.unwrap();

        // Simulate the transient batch-visibility gap.
        cache
            .delete(&[page_key("test-bucket", "photos/", 1)])
            .await;

        let healed = svc.list("photos/", 2, 50).await.unwrap();
        assert_eq!(healed.objects.len(), 50);
        assert_eq!(healed.objects[0].name, "img0050.jpg");
        assert_eq!(healed.total_pages, 3);
        // The heal enumerated once more but wrote nothing back.
        assert_eq!(store.calls(), 2);
        assert!(
            cache
                .get(&page_key("test-bucket", "photos/", 1))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn folders_ride_along_with_every_page() {
        let store = Arc::new(
            MockObjectStore::with_objects("photos/", 60).with_folders("photos/", &["2023", "2024"]),
        );
        let (svc, _cache) = service(store);

        let first = svc.list("photos/", 1, 50).await.unwrap();
        let second = svc.list("photos/", 2, 50).await.unwrap();
        assert_eq!(first.total_folders, 2);
        assert_eq!(first.folders, second.folders);
        assert_eq!(first.folders[0].name, "2023");
        assert!(first.folders[0].is_folder);
    }

    #[tokio::test]
    async fn empty_prefix_lists_cleanly() {
        let store = Arc::new(MockObjectStore::with_objects("photos/", 0));
        let (svc, _cache) = service(store.clone());

        let result = svc.list("photos/", 1, 50).await.unwrap();
        assert_eq!(result.objects.len(), 0);
        assert_eq!(result.total_pages, 0);

        // Second request is a metadata hit with no page lookup.
        let again = svc.list("photos/", 1, 50).await.unwrap();
        assert_eq!(again, result);
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn store_failure_releases_the_lock() {
        let store = Arc::new(MockObjectStore::with_objects("photos/", 10));
        let (svc, cache) = service(store.clone());

        store.fail.store(true, Ordering::SeqCst);
        assert!(svc.list("photos/", 1, 50).await.is_err());
        assert!(!cache.exists(&lock_key("test-bucket", "photos/")).await);

        // The next request simply retries the rebuild.
        store.fail.store(false, Ordering::SeqCst);
        let recovered = svc.list("photos/", 1, 50).await.unwrap();
        assert_eq!(recovered.total_objects, 10);
        assert_eq!(store.calls(), 2);
    }

    /// Permanently degraded cache: every operation reports absent/false.
    struct DeadCacheStore;

    #[async_trait]
    impl CacheStore for DeadCacheStore {
        async fn healthy(&self) -> bool {
            false
        }
        async fn get(&self, _key: &str) -> Option<Vec<u8>> {
            None
        }
        async fn set_with_ttl(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> bool {
            false
        }
        async fn set_batch_with_ttl(&self, _entries: Vec<(String, Vec<u8>)>, _ttl: Duration) -> bool {
            false
        }
        async fn delete(&self, _keys: &[String]) -> bool {
            false
        }
        async fn exists(&self, _key: &str) -> bool {
            false
        }
        async fn ttl(&self, _key: &str) -> i64 {
            -2
        }
        async fn keys_matching(&self, _pattern: &str) -> Vec<String> {
            Vec::new()
        }
        async fn set_if_absent_with_ttl(&self, _key: &str, _value: &str, _ttl: Duration) -> bool {
            false
        }
        async fn delete_if_equals(&self, _key: &str, _value: &str) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn dead_cache_degrades_to_direct_queries() {
        let store = Arc::new(MockObjectStore::with_objects("photos/", 120));
        let cache = Arc::new(DeadCacheStore);
        let svc = ListingService::new(store.clone(), cache, "test-bucket", "", 50);

        let first = svc.list("photos/", 1, 50).await.unwrap();
        let third = svc.list("photos/", 3, 50).await.unwrap();
        assert_eq!(first.objects.len(), 50);
        assert_eq!(third.objects.len(), 20);
        assert_eq!(third.total_pages, 3);
        // Always-miss mode: every request pays one enumeration.
        assert_eq!(store.calls(), 2);
        assert!(!svc.cache_healthy().await);
    }

    #[tokio::test]
    async fn root_prefix_is_joined_in_front_of_requests() {
        let store = Arc::new(MockObjectStore::with_objects("data/photos/", 5));
        let cache = Arc::new(MemoryCacheStore::new());
        let svc = ListingService::new(store, cache.clone(), "test-bucket", "data", 50);

        assert_eq!(svc.full_prefix("photos/"), "data/photos/");
        assert_eq!(svc.full_prefix("/photos/"), "data/photos/");
        assert_eq!(svc.full_prefix(""), "data/");

        let result = svc.list("photos/", 1, 50).await.unwrap();
        assert_eq!(result.root_prefix, "data");
        // Cache keys use the request prefix, not the full store prefix.
        assert!(cache.exists(&meta_key("test-bucket", "photos/")).await);
    }

    #[tokio::test]
    async fn clear_operations_scope_correctly() {
        let store = Arc::new(MockObjectStore::with_objects("a/", 10));
        let (svc, cache) = service(store);
        svc.list("a/", 1, 5).await.unwrap();
        svc.list("b/", 1, 5).await.unwrap();

        let stats = svc.cache_stats().await;
        assert_eq!(stats.meta_keys, 2);
        assert_eq!(stats.page_keys, 4);
        assert_eq!(stats.lock_keys, 0);
        assert_eq!(stats.total_keys, 6);

        assert!(svc.clear_prefix_cache("a/").await);
        assert!(!cache.exists(&meta_key("test-bucket", "a/")).await);
        assert!(cache.exists(&meta_key("test-bucket", "b/")).await);

        assert!(svc.clear_cache().await);
        assert_eq!(svc.cache_stats().await.total_keys, 0);
    }
}
