use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use moka::future::Cache;

const DEFAULT_PLAYLIST_CAPACITY: u64 = 16;
const DEFAULT_KEY_CAPACITY: u64 = 64;
const DEFAULT_PLAYLIST_TTL: Duration = Duration::from_secs(60);
const DEFAULT_KEY_TTL: Duration = Duration::from_secs(60 * 60);

/// What a cached entry holds. Playlists and decryption keys have very
/// different freshness requirements, so they are cached separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Playlist,
    Key,
}

/// Lookup key for a [`CacheStore`] entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: CacheKind,
    pub url: String,
}

impl CacheKey {
    pub fn new(kind: CacheKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
        }
    }
}

/// Pluggable byte cache shared across feeds.
///
/// The default [`MemoryCache`] keeps everything in process; hosts can
/// substitute a disk- or redis-backed store without touching the rest
/// of the engine.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<Bytes>;
    async fn put(&self, key: CacheKey, data: Bytes);
    async fn evict(&self, key: &CacheKey);
}

/// In-process [`CacheStore`] backed by per-kind `moka` caches.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    playlists: Cache<String, Bytes>,
    keys: Cache<String, Bytes>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_ttls(DEFAULT_PLAYLIST_TTL, DEFAULT_KEY_TTL)
    }

    pub fn with_ttls(playlist_ttl: Duration, key_ttl: Duration) -> Self {
        Self {
            playlists: Cache::builder()
                .max_capacity(DEFAULT_PLAYLIST_CAPACITY)
                .time_to_live(playlist_ttl)
                .build(),
            keys: Cache::builder()
                .max_capacity(DEFAULT_KEY_CAPACITY)
                .time_to_live(key_ttl)
                .build(),
        }
    }

    fn slot(&self, kind: CacheKind) -> &Cache<String, Bytes> {
        match kind {
            CacheKind::Playlist => &self.playlists,
            CacheKind::Key => &self.keys,
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Option<Bytes> {
        self.slot(key.kind).get(&key.url).await
    }

    async fn put(&self, key: CacheKey, data: Bytes) {
        self.slot(key.kind).insert(key.url, data).await;
    }

    async fn evict(&self, key: &CacheKey) {
        self.slot(key.kind).invalidate(&key.url).await;
    }
}
