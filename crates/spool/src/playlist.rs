use std::sync::Arc;

use m3u8::{MasterPlaylist, MediaPlaylist, Playlist, Variant};
use tracing::{debug, trace};
use url::Url;

use crate::cache::{CacheKey, CacheKind, CacheStore};
use crate::config::{PlaylistConfig, QualityPreference};
use crate::error::FeedError;
use crate::fetch::Fetch;

/// The classified root document of a feed.
#[derive(Debug, Clone)]
pub enum RootPlaylist {
    Master {
        playlist: MasterPlaylist,
        url: String,
    },
    Media {
        playlist: MediaPlaylist,
        url: String,
    },
}

/// Fetches and classifies playlist documents.
pub struct PlaylistEngine {
    fetch: Arc<dyn Fetch>,
    cache: Option<Arc<dyn CacheStore>>,
    config: PlaylistConfig,
}

impl PlaylistEngine {
    pub fn new(
        fetch: Arc<dyn Fetch>,
        cache: Option<Arc<dyn CacheStore>>,
        config: PlaylistConfig,
    ) -> Self {
        Self {
            fetch,
            cache,
            config,
        }
    }

    /// Fetches the root document and classifies it as master or media.
    ///
    /// The URL must be absolute; the document is fetched once, with no
    /// retries, so a bad root fails fast.
    pub async fn load_root(&self, url: &str) -> Result<RootPlaylist, FeedError> {
        if Url::parse(url).is_err() {
            return Err(FeedError::InvalidUrl(url.to_string()));
        }

        let text = self.load_document(url).await?;
        match m3u8::parse(&text, url).map_err(|e| FeedError::format(url, e))? {
            Playlist::Master(playlist) => {
                debug!(
                    url,
                    variants = playlist.variants.len(),
                    "root document is a master playlist"
                );
                Ok(RootPlaylist::Master {
                    playlist,
                    url: url.to_string(),
                })
            }
            Playlist::Media(playlist) => {
                debug!(
                    url,
                    segments = playlist.segments.len(),
                    "root document is a media playlist"
                );
                Ok(RootPlaylist::Media {
                    playlist,
                    url: url.to_string(),
                })
            }
        }
    }

    /// Fetches a variant's media playlist. A master document here means
    /// the server pointed a variant URL back at another master, which
    /// the engine does not follow.
    pub async fn fetch_media(&self, url: &str) -> Result<MediaPlaylist, FeedError> {
        let text = self.load_document(url).await?;
        if m3u8::is_master(&text) {
            return Err(FeedError::format(
                url,
                "expected a media playlist but found a master playlist",
            ));
        }
        m3u8::parse_media(&text, url).map_err(|e| FeedError::format(url, e))
    }

    async fn load_document(&self, url: &str) -> Result<String, FeedError> {
        let cache_key = CacheKey::new(CacheKind::Playlist, url);
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&cache_key).await {
                trace!(url, "playlist served from cache");
                return Ok(String::from_utf8_lossy(&cached).into_owned());
            }
        }

        let response = self
            .fetch
            .fetch(url, self.config.fetch_timeout)
            .await?
            .error_for_status(url)?;

        if let Some(cache) = &self.cache {
            cache.put(cache_key, response.body.clone()).await;
        }
        Ok(response.text())
    }
}

/// Picks the variant to play from a master playlist.
///
/// Variants are ordered by declared bandwidth, highest first, with ties
/// keeping their listed order. `Auto` takes the top entry. A height cap
/// takes the first entry whose advertised height fits; when none fit
/// (or no variant advertises a resolution) the lowest-bandwidth entry
/// is returned so constrained players still get a stream. Only an empty
/// variant list yields `None`.
pub fn select_variant<'a>(
    variants: &'a [Variant],
    quality: &QualityPreference,
) -> Option<&'a Variant> {
    if variants.is_empty() {
        return None;
    }

    let mut ordered: Vec<&Variant> = variants.iter().collect();
    ordered.sort_by(|a, b| b.bandwidth.cmp(&a.bandwidth));

    let target = match quality {
        QualityPreference::Auto => return ordered.first().copied(),
        QualityPreference::MaxHeight(height) => *height,
    };

    ordered
        .iter()
        .find(|v| v.resolution.is_some_and(|r| r.height <= target))
        .copied()
        .or_else(|| ordered.last().copied())
}
