//! HLS playlist ingestion engine.
//!
//! Opens a master or media playlist URL and turns it into an ordered,
//! decryption-ready segment stream: the root document is fetched and
//! classified, a variant is selected against the configured quality
//! preference, and the variant's media playlist drives either a
//! one-shot (VOD) or continuously refreshed (live) segment feed.
//! Segment payloads and AES keys can be prefetched with bounded
//! concurrency while playback order is preserved.
//!
//! ```no_run
//! use futures::StreamExt;
//! use spool_engine::{FeedConfig, SegmentFeed};
//!
//! # async fn run() -> spool_engine::Result<()> {
//! let feed = SegmentFeed::open("https://example.com/master.m3u8", FeedConfig::default()).await?;
//! let mut segments = feed.prefetch();
//! while let Some(item) = segments.next().await {
//!     let segment = item?;
//!     println!("{} ({} bytes)", segment.segment.url, segment.data.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod keys;
pub mod playlist;
pub mod prefetch;

// Playlist grammar types appear throughout the public API.
pub use m3u8;

pub use cache::{CacheKey, CacheKind, CacheStore, MemoryCache};
pub use config::{
    FeedConfig, HttpConfig, KeyConfig, PlaylistConfig, PrefetchConfig, QualityPreference,
};
pub use error::FeedError;
pub use feed::{CancelHandle, SegmentFeed, SegmentStream};
pub use fetch::{Fetch, FetchResponse, HttpFetch, build_client, fetch_with_retries};
pub use keys::KeyService;
pub use playlist::{PlaylistEngine, RootPlaylist, select_variant};
pub use prefetch::{PrefetchedSegment, SegmentPrefetcher};

pub type Result<T> = std::result::Result<T, FeedError>;
