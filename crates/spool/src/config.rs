use std::convert::Infallible;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Top-level configuration for a [`SegmentFeed`](crate::SegmentFeed).
///
/// Every knob has a working default; `FeedConfig::default()` is a
/// reasonable setup for both VOD and live playback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedConfig {
    /// HTTP client construction options.
    pub http: HttpConfig,
    /// Playlist fetching and live refresh behavior.
    pub playlist: PlaylistConfig,
    /// Segment prefetching behavior.
    pub prefetch: PrefetchConfig,
    /// Decryption key fetching and caching behavior.
    pub keys: KeyConfig,
    /// Which variant to pick when the root document is a master playlist.
    pub quality: QualityPreference,
}

/// Options applied when building the shared HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header sent with every request.
    pub user_agent: String,
    /// Optional Referer header, needed by some origins.
    pub referer: Option<String>,
    /// Extra headers appended to every request.
    pub headers: Vec<(String, String)>,
    /// Whole-request timeout. Zero disables the client-level deadline,
    /// leaving only the per-request deadlines passed at call sites.
    pub timeout: Duration,
    /// Connection establishment timeout. Zero disables it.
    pub connect_timeout: Duration,
    /// Follow redirects (up to 10 hops) when enabled.
    pub follow_redirects: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            referer: None,
            headers: Vec::new(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
        }
    }
}

/// Playlist fetch and live refresh tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistConfig {
    /// Timeout for fetching a playlist document.
    pub fetch_timeout: Duration,
    /// Lower bound on the live refresh interval. The effective interval
    /// is the larger of this and the playlist's target duration.
    pub live_refresh_interval: Duration,
    /// How many consecutive refresh failures to tolerate before the
    /// live stream aborts.
    pub live_max_refresh_retries: u32,
    /// Base delay between refresh retries; grows linearly per attempt.
    pub live_refresh_retry_delay: Duration,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(15),
            live_refresh_interval: Duration::from_secs(1),
            live_max_refresh_retries: 5,
            live_refresh_retry_delay: Duration::from_secs(1),
        }
    }
}

/// Segment prefetch tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefetchConfig {
    /// Number of segment downloads in flight at once.
    pub concurrency: usize,
    /// Timeout for a single segment download attempt.
    pub segment_timeout: Duration,
    /// Retries per segment on retryable failures.
    pub max_segment_retries: u32,
    /// Base delay between segment retries; doubles per attempt.
    pub segment_retry_delay: Duration,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            segment_timeout: Duration::from_secs(10),
            max_segment_retries: 3,
            segment_retry_delay: Duration::from_millis(500),
        }
    }
}

/// Decryption key fetch and cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Timeout for a single key download attempt.
    pub key_timeout: Duration,
    /// Retries per key on retryable failures.
    pub max_key_retries: u32,
    /// Base delay between key retries; doubles per attempt.
    pub key_retry_delay: Duration,
    /// Maximum number of distinct keys held in the in-process cache.
    pub key_cache_capacity: u64,
    /// How long a cached key stays valid.
    pub key_cache_ttl: Duration,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            key_timeout: Duration::from_secs(5),
            max_key_retries: 3,
            key_retry_delay: Duration::from_millis(200),
            key_cache_capacity: 32,
            key_cache_ttl: Duration::from_secs(60 * 60),
        }
    }
}

/// Variant selection policy for master playlists.
///
/// `Auto` takes the highest-bandwidth variant. `MaxHeight(h)` takes the
/// highest-bandwidth variant whose advertised height fits within `h`
/// pixels, falling back to the lowest-bandwidth variant when nothing
/// fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityPreference {
    #[default]
    Auto,
    MaxHeight(u32),
}

impl QualityPreference {
    /// Parses a user-supplied preference string.
    ///
    /// `"auto"` (any case) or an empty string selects `Auto`. Otherwise
    /// the leading digits become the target height, so `"720"` and
    /// `"720p"` both mean `MaxHeight(720)`. Strings with no leading
    /// digits fall back to `Auto`.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("auto") {
            return Self::Auto;
        }
        let digits: String = value.chars().take_while(char::is_ascii_digit).collect();
        digits.parse().map(Self::MaxHeight).unwrap_or(Self::Auto)
    }
}

impl FromStr for QualityPreference {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(value))
    }
}

impl Serialize for QualityPreference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Auto => serializer.serialize_str("auto"),
            Self::MaxHeight(height) => serializer.collect_str(height),
        }
    }
}

impl<'de> Deserialize<'de> for QualityPreference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}
