//! Time-boxed cache of resolved asset metadata
//!
//! Shared by every job in the process. Entries expire after the configured
//! TTL and are evicted lazily on the next lookup; nothing sweeps the cache.
//! Concurrent resolutions of the same URL may both hit the source; the last
//! insert wins.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::models::AssetInfo;
use crate::types::{AssetError, AssetSource};

struct CacheEntry {
    info: AssetInfo,
    expires_at: Instant,
}

/// URL-keyed asset metadata cache
pub struct MetadataCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl MetadataCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Cached metadata for `url`, evicting it if expired
    pub fn get(&self, url: &str) -> Option<AssetInfo> {
        self.get_at(url, Instant::now())
    }

    fn get_at(&self, url: &str, now: Instant) -> Option<AssetInfo> {
        // Removal happens only if the entry is still expired at removal time,
        // so a concurrent fresh insert is never discarded.
        let removed = self
            .entries
            .remove_if(url, |_, entry| entry.expires_at <= now);
        if removed.is_some() {
            debug!(url = %url, "Metadata cache entry expired");
            return None;
        }

        self.entries.get(url).map(|entry| entry.info.clone())
    }

    pub fn insert(&self, url: &str, info: AssetInfo) {
        self.insert_at(url, info, Instant::now());
    }

    fn insert_at(&self, url: &str, info: AssetInfo, now: Instant) {
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                info,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Cached metadata, or resolve through `source` under `timeout` and cache it
    pub async fn resolve(
        &self,
        url: &str,
        source: &dyn AssetSource,
        timeout: Duration,
    ) -> Result<AssetInfo, AssetError> {
        if let Some(info) = self.get(url) {
            debug!(url = %url, "Metadata cache hit");
            return Ok(info);
        }

        let info = tokio::time::timeout(timeout, source.get_info(url))
            .await
            .map_err(|_| AssetError::Timeout(timeout))??;

        self.insert(url, info.clone());
        Ok(info)
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn info(title: &str) -> AssetInfo {
        AssetInfo {
            duration: 120.0,
            title: title.to_string(),
            uploader: None,
            upload_date: None,
            thumbnail: None,
            canonical_url: "https://youtu.be/abc".to_string(),
            platform: Platform::Youtube,
        }
    }

    struct CountingSource {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl AssetSource for CountingSource {
        async fn get_info(&self, _url: &str) -> Result<AssetInfo, AssetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(info("resolved"))
        }

        async fn fetch_window(&self, _: &str, _: f64, _: f64) -> Result<Bytes, AssetError> {
            unreachable!()
        }

        async fn fetch_full(&self, _: &str) -> Result<Bytes, AssetError> {
            unreachable!()
        }

        async fn split_full(&self, _: Bytes, _: f64) -> Result<Vec<Bytes>, AssetError> {
            unreachable!()
        }
    }

    #[test]
    fn test_entry_expires_lazily() {
        let cache = MetadataCache::new(Duration::from_secs(60));
        let t0 = Instant::now();
        cache.insert_at("u", info("a"), t0);

        assert_eq!(cache.get_at("u", t0 + Duration::from_secs(59)).unwrap().title, "a");
        // Still stored until someone looks it up
        assert_eq!(cache.len(), 1);
        assert!(cache.get_at("u", t0 + Duration::from_secs(61)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = MetadataCache::new(Duration::from_secs(60));
        cache.insert("u", info("first"));
        cache.insert("u", info("second"));
        assert_eq!(cache.get("u").unwrap().title, "second");
    }

    #[tokio::test]
    async fn test_resolve_hits_source_once() {
        let cache = MetadataCache::new(Duration::from_secs(60));
        let source = CountingSource {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        };

        for _ in 0..3 {
            let resolved = cache
                .resolve("u", &source, Duration::from_secs(1))
                .await
                .unwrap();
            assert_eq!(resolved.title, "resolved");
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolve_timeout_is_error_and_not_cached() {
        let cache = MetadataCache::new(Duration::from_secs(60));
        let source = CountingSource {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(200),
        };

        let result = cache.resolve("u", &source, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(AssetError::Timeout(_))));
        assert!(cache.get("u").is_none());
    }
}
