use std::sync::Arc;

use bytes::Bytes;
use m3u8::{EncryptionKey, EncryptionMethod};
use moka::future::Cache;
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheKind, CacheStore};
use crate::config::KeyConfig;
use crate::error::FeedError;
use crate::fetch::{Fetch, fetch_with_retries};

/// AES-128 key length mandated for HLS segment encryption.
const KEY_LENGTH: usize = 16;

/// Fetches and caches segment decryption keys.
///
/// Keys are fetched at most once per URI within the cache TTL;
/// concurrent requests for the same URI coalesce on the in-process
/// cache so a burst of encrypted segments costs one key roundtrip.
pub struct KeyService {
    fetch: Arc<dyn Fetch>,
    store: Option<Arc<dyn CacheStore>>,
    local: Cache<String, Bytes>,
    config: KeyConfig,
}

impl KeyService {
    pub fn new(
        fetch: Arc<dyn Fetch>,
        store: Option<Arc<dyn CacheStore>>,
        config: KeyConfig,
    ) -> Self {
        let local = Cache::builder()
            .max_capacity(config.key_cache_capacity)
            .time_to_live(config.key_cache_ttl)
            .build();
        Self {
            fetch,
            store,
            local,
            config,
        }
    }

    /// Resolves the key material a segment needs before playback.
    ///
    /// Unencrypted segments (method `NONE`) and key tags without a URI
    /// need nothing and resolve to `None` without touching the network.
    pub async fn prefetch(&self, key: &EncryptionKey) -> Result<Option<Bytes>, FeedError> {
        if key.method == EncryptionMethod::None {
            return Ok(None);
        }
        match &key.uri {
            Some(uri) => self.fetch_key(uri).await.map(Some),
            None => Ok(None),
        }
    }

    /// Returns the key bytes for a URI, fetching on first use.
    pub async fn fetch_key(&self, uri: &str) -> Result<Bytes, FeedError> {
        let fetch = Arc::clone(&self.fetch);
        let store = self.store.clone();
        let config = self.config.clone();
        let url = uri.to_string();

        self.local
            .try_get_with(uri.to_string(), load_key(fetch, store, config, url))
            .await
            .map_err(|e: Arc<FeedError>| (*e).clone())
    }
}

async fn load_key(
    fetch: Arc<dyn Fetch>,
    store: Option<Arc<dyn CacheStore>>,
    config: KeyConfig,
    uri: String,
) -> Result<Bytes, FeedError> {
    let cache_key = CacheKey::new(CacheKind::Key, &uri);

    if let Some(store) = &store {
        if let Some(data) = store.get(&cache_key).await {
            if data.len() == KEY_LENGTH {
                debug!(uri, "decryption key served from shared cache");
                return Ok(data);
            }
            // A corrupt entry must not poison every feed sharing the store.
            warn!(uri, bytes = data.len(), "evicting malformed cached key");
            store.evict(&cache_key).await;
        }
    }

    let data = fetch_with_retries(
        fetch.as_ref(),
        &uri,
        config.key_timeout,
        config.max_key_retries,
        config.key_retry_delay,
    )
    .await?;

    if data.len() != KEY_LENGTH {
        return Err(FeedError::format(
            &uri,
            format!("decryption key is {} bytes, expected {KEY_LENGTH}", data.len()),
        ));
    }

    if let Some(store) = &store {
        store.put(cache_key, data.clone()).await;
    }
    debug!(uri, "decryption key fetched");
    Ok(data)
}
