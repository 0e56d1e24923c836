use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use m3u8::{MasterPlaylist, MediaPlaylist, PlaylistType, Segment, Variant};
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, trace, warn};

use crate::cache::CacheStore;
use crate::config::{FeedConfig, PlaylistConfig};
use crate::error::FeedError;
use crate::fetch::{Fetch, HttpFetch};
use crate::keys::KeyService;
use crate::playlist::{PlaylistEngine, RootPlaylist, select_variant};
use crate::prefetch::SegmentPrefetcher;

/// How many segment URLs the live dedup window remembers. EVENT
/// playlists keep their whole history in the document, so the window
/// has to cover a long session, not just the sliding live edge.
const SEEN_URL_CAPACITY: u64 = 4096;

const STREAM_CHANNEL_CAPACITY: usize = 16;

/// Cancels a feed and every stream derived from it.
///
/// Cloneable and cheap to pass across tasks; the first `cancel` wins
/// and later calls are no-ops.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    shutdown: broadcast::Sender<()>,
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    fn new() -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            shutdown,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stops every active stream and marks the feed as cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        if self.shutdown.receiver_count() > 0 {
            let _ = self.shutdown.send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }
}

/// An opened playlist ready to hand out segments.
///
/// `open` resolves the whole front half of the pipeline: fetch the root
/// document, classify it, pick a variant if it was a master playlist,
/// and fetch that variant's media playlist. The resulting feed exposes
/// the parsed playlist and produces segment streams on demand.
pub struct SegmentFeed {
    config: FeedConfig,
    fetch: Arc<dyn Fetch>,
    cache: Option<Arc<dyn CacheStore>>,
    master: Option<MasterPlaylist>,
    selected: Option<Variant>,
    media: MediaPlaylist,
    media_url: String,
    cancel: CancelHandle,
}

// Manual impl: the `fetch` and `cache` trait objects are not `Debug`.
impl fmt::Debug for SegmentFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentFeed")
            .field("config", &self.config)
            .field("master", &self.master)
            .field("selected", &self.selected)
            .field("media", &self.media)
            .field("media_url", &self.media_url)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl SegmentFeed {
    /// Opens a feed over a fresh HTTP client.
    pub async fn open(url: &str, config: FeedConfig) -> Result<Self, FeedError> {
        let fetch: Arc<dyn Fetch> = Arc::new(HttpFetch::new(&config.http)?);
        Self::open_with(fetch, None, url, config).await
    }

    /// Opens a feed over caller-supplied transport and cache. This is
    /// the injection seam: tests script the transport, hosts share one
    /// client and cache across many feeds.
    pub async fn open_with(
        fetch: Arc<dyn Fetch>,
        cache: Option<Arc<dyn CacheStore>>,
        url: &str,
        config: FeedConfig,
    ) -> Result<Self, FeedError> {
        let engine =
            PlaylistEngine::new(Arc::clone(&fetch), cache.clone(), config.playlist.clone());

        debug!(url, "fetching root playlist");
        let root = engine.load_root(url).await?;

        let (master, selected, media, media_url) = match root {
            RootPlaylist::Master { playlist, url } => {
                let variant = select_variant(&playlist.variants, &config.quality)
                    .cloned()
                    .ok_or_else(|| FeedError::NoPlayableVariant { url: url.clone() })?;
                info!(
                    url = %variant.url,
                    bandwidth = variant.bandwidth,
                    resolution = ?variant.resolution,
                    "variant selected"
                );
                let media = engine.fetch_media(&variant.url).await?;
                let media_url = variant.url.clone();
                (Some(playlist), Some(variant), media, media_url)
            }
            RootPlaylist::Media { playlist, url } => (None, None, playlist, url),
        };

        info!(
            url = %media_url,
            segments = media.segments.len(),
            complete = media.end_list,
            "feed ready"
        );

        Ok(Self {
            config,
            fetch,
            cache,
            master,
            selected,
            media,
            media_url,
            cancel: CancelHandle::new(),
        })
    }

    /// Segments known at open time. For live feeds this is only the
    /// initial window; `stream` follows the live edge.
    pub fn segments(&self) -> &[Segment] {
        &self.media.segments
    }

    /// Whether the playlist carried an end marker at open time.
    pub fn is_complete(&self) -> bool {
        self.media.end_list
    }

    pub fn playlist_type(&self) -> Option<PlaylistType> {
        self.media.playlist_type
    }

    pub fn target_duration(&self) -> u64 {
        self.media.target_duration
    }

    /// Total advertised duration of the segments known at open time.
    pub fn total_duration(&self) -> f64 {
        self.media.total_duration()
    }

    /// URL of the media playlist actually being played.
    pub fn media_url(&self) -> &str {
        &self.media_url
    }

    /// The variant chosen from the master playlist, when there was one.
    pub fn selected_variant(&self) -> Option<&Variant> {
        self.selected.as_ref()
    }

    /// The master playlist, when the root document was one.
    pub fn master(&self) -> Option<&MasterPlaylist> {
        self.master.as_ref()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Produces the ordered segment stream.
    ///
    /// Finished playlists replay their full segment list, so calling
    /// this again restarts playback from the top. Live playlists emit
    /// the current window and then follow the live edge, refreshing no
    /// faster than the playlist's target duration, until an end marker
    /// appears or the feed is cancelled.
    pub fn stream(&self) -> SegmentStream {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        if self.cancel.is_cancelled() {
            let _ = tx.try_send(Err(FeedError::Cancelled));
            return SegmentStream::new(rx);
        }

        let snapshot = self.media.segments.clone();
        let shutdown_rx = self.cancel.subscribe();

        if self.media.end_list {
            debug!(
                url = %self.media_url,
                segments = snapshot.len(),
                "streaming finished playlist"
            );
            tokio::spawn(emit_snapshot(snapshot, tx, shutdown_rx));
        } else {
            debug!(url = %self.media_url, "starting live segment stream");
            let monitor = LiveMonitor {
                fetch: Arc::clone(&self.fetch),
                config: self.config.playlist.clone(),
                url: self.media_url.clone(),
                target_duration: self.media.target_duration,
            };
            tokio::spawn(monitor.run(snapshot, tx, shutdown_rx));
        }

        SegmentStream::new(rx)
    }

    /// Streams segments with their payloads and decryption keys
    /// downloaded ahead of playback.
    pub fn prefetch(&self) -> SegmentPrefetcher {
        let keys = Arc::new(KeyService::new(
            Arc::clone(&self.fetch),
            self.cache.clone(),
            self.config.keys.clone(),
        ));
        SegmentPrefetcher::spawn(
            self.stream(),
            Arc::clone(&self.fetch),
            keys,
            self.config.prefetch.clone(),
            &self.cancel,
        )
    }
}

/// Ordered stream of [`Segment`]s produced by [`SegmentFeed::stream`].
pub struct SegmentStream {
    inner: ReceiverStream<Result<Segment, FeedError>>,
}

impl SegmentStream {
    fn new(rx: mpsc::Receiver<Result<Segment, FeedError>>) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
        }
    }
}

impl Stream for SegmentStream {
    type Item = Result<Segment, FeedError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

async fn emit_snapshot(
    segments: Vec<Segment>,
    tx: mpsc::Sender<Result<Segment, FeedError>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    for segment in segments {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                debug!("segment stream cancelled");
                return;
            }
            sent = tx.send(Ok(segment)) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}

/// Follows the live edge of a media playlist, emitting each segment
/// exactly once, in playlist order.
struct LiveMonitor {
    fetch: Arc<dyn Fetch>,
    config: PlaylistConfig,
    url: String,
    target_duration: u64,
}

impl LiveMonitor {
    async fn run(
        mut self,
        snapshot: Vec<Segment>,
        tx: mpsc::Sender<Result<Segment, FeedError>>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let seen: Cache<String, ()> = Cache::builder()
            .max_capacity(SEEN_URL_CAPACITY)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        for segment in snapshot {
            seen.insert(segment.url.clone(), ()).await;
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    debug!(url = %self.url, "live stream cancelled");
                    return;
                }
                sent = tx.send(Ok(segment)) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }

        let mut retries: u32 = 0;
        let mut last_body: Option<Bytes> = None;

        loop {
            let refresh_delay =
                Duration::from_secs(self.target_duration).max(self.config.live_refresh_interval);
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    debug!(url = %self.url, "live refresh stopped");
                    return;
                }
                _ = tokio::time::sleep(refresh_delay) => {}
            }

            match self.refresh(last_body.as_ref()).await {
                Ok(Some((playlist, body))) => {
                    retries = 0;
                    last_body = Some(body);
                    self.target_duration = playlist.target_duration;

                    for segment in playlist.segments {
                        if seen.contains_key(&segment.url) {
                            continue;
                        }
                        seen.insert(segment.url.clone(), ()).await;
                        trace!(url = %segment.url, duration = segment.duration, "new live segment");
                        tokio::select! {
                            biased;
                            _ = shutdown_rx.recv() => {
                                debug!(url = %self.url, "live stream cancelled");
                                return;
                            }
                            sent = tx.send(Ok(segment)) => {
                                if sent.is_err() {
                                    return;
                                }
                            }
                        }
                    }

                    if playlist.end_list {
                        info!(url = %self.url, "end marker reached, live stream complete");
                        return;
                    }
                }
                Ok(None) => {
                    // Unchanged document; nothing new this round.
                    retries = 0;
                }
                Err(error) => {
                    retries += 1;
                    let fatal = matches!(error, FeedError::Format { .. })
                        || retries > self.config.live_max_refresh_retries;
                    if fatal {
                        warn!(url = %self.url, %error, "live refresh failed, stopping");
                        let _ = tx.send(Err(error)).await;
                        return;
                    }

                    let delay = self.config.live_refresh_retry_delay * retries;
                    warn!(
                        url = %self.url,
                        attempt = retries,
                        %error,
                        delay_ms = delay.as_millis() as u64,
                        "live refresh failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => {
                            debug!(url = %self.url, "live refresh stopped");
                            return;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Re-fetches the playlist. `Ok(None)` means the document has not
    /// changed since the previous refresh and parsing was skipped.
    async fn refresh(
        &self,
        last_body: Option<&Bytes>,
    ) -> Result<Option<(MediaPlaylist, Bytes)>, FeedError> {
        let response = self
            .fetch
            .fetch(&self.url, self.config.fetch_timeout)
            .await?
            .error_for_status(&self.url)?;

        if last_body == Some(&response.body) {
            trace!(url = %self.url, "playlist unchanged");
            return Ok(None);
        }

        let playlist = m3u8::parse_media(&response.text(), &self.url)
            .map_err(|e| FeedError::format(&self.url, e))?;
        Ok(Some((playlist, response.body)))
    }
}
