use std::collections::BTreeMap;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use m3u8::Segment;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::config::PrefetchConfig;
use crate::error::FeedError;
use crate::feed::CancelHandle;
use crate::fetch::{Fetch, fetch_with_retries};
use crate::keys::KeyService;

/// A segment whose payload and key material are already in memory.
#[derive(Debug, Clone)]
pub struct PrefetchedSegment {
    /// Zero-based position in the emission order.
    pub sequence: u64,
    /// Playlist metadata for the segment.
    pub segment: Segment,
    /// Raw (possibly encrypted) payload.
    pub data: Bytes,
    /// Key bytes when the segment is encrypted and its key tag carried
    /// a URI.
    pub key: Option<Bytes>,
}

impl PrefetchedSegment {
    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }
}

/// Downloads segments ahead of playback with bounded concurrency.
///
/// Payloads download in parallel but segments are always released in
/// playlist order; a slow download holds back later, already finished
/// ones until it resolves. The first failure is released in its own
/// sequence position and ends the stream.
pub struct SegmentPrefetcher {
    inner: ReceiverStream<Result<PrefetchedSegment, FeedError>>,
}

impl SegmentPrefetcher {
    /// Spawns the download driver over an ordered segment stream.
    pub fn spawn<S>(
        segments: S,
        fetch: Arc<dyn Fetch>,
        keys: Arc<KeyService>,
        config: PrefetchConfig,
        cancel: &CancelHandle,
    ) -> Self
    where
        S: Stream<Item = Result<Segment, FeedError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(config.concurrency.max(1) * 2);
        let shutdown_rx = cancel.subscribe();
        tokio::spawn(run_driver(segments, fetch, keys, config, tx, shutdown_rx));
        Self {
            inner: ReceiverStream::new(rx),
        }
    }
}

impl Stream for SegmentPrefetcher {
    type Item = Result<PrefetchedSegment, FeedError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

async fn run_driver<S>(
    segments: S,
    fetch: Arc<dyn Fetch>,
    keys: Arc<KeyService>,
    config: PrefetchConfig,
    tx: mpsc::Sender<Result<PrefetchedSegment, FeedError>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) where
    S: Stream<Item = Result<Segment, FeedError>> + Send + 'static,
{
    let concurrency = config.concurrency.max(1);
    let mut input = pin!(segments.fuse());
    let mut in_flight = FuturesUnordered::new();
    let mut ready: BTreeMap<u64, Result<PrefetchedSegment, FeedError>> = BTreeMap::new();
    let mut next_sequence: u64 = 0;
    let mut next_release: u64 = 0;
    let mut input_done = false;

    loop {
        let in_progress = in_flight.len();

        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                debug!("prefetch cancelled");
                return;
            }
            item = input.next(), if !input_done && in_progress < concurrency => {
                match item {
                    Some(Ok(segment)) => {
                        let sequence = next_sequence;
                        next_sequence += 1;
                        in_flight.push(fetch_segment(
                            Arc::clone(&fetch),
                            Arc::clone(&keys),
                            config.clone(),
                            sequence,
                            segment,
                        ));
                    }
                    Some(Err(error)) => {
                        // The upstream failure takes the next slot so it
                        // is released only after everything before it.
                        ready.insert(next_sequence, Err(error));
                        next_sequence += 1;
                        input_done = true;
                    }
                    None => {
                        input_done = true;
                    }
                }
            }
            Some((sequence, result)) = in_flight.next(), if in_progress > 0 => {
                ready.insert(sequence, result);
            }
        }

        // Release every segment that is next in line.
        while let Some(result) = ready.remove(&next_release) {
            next_release += 1;
            let failed = result.is_err();
            if tx.send(result).await.is_err() || failed {
                return;
            }
        }

        if input_done && in_flight.is_empty() && ready.is_empty() {
            debug!(segments = next_release, "prefetch complete");
            return;
        }
    }
}

async fn fetch_segment(
    fetch: Arc<dyn Fetch>,
    keys: Arc<KeyService>,
    config: PrefetchConfig,
    sequence: u64,
    segment: Segment,
) -> (u64, Result<PrefetchedSegment, FeedError>) {
    // Key first: a missing key makes the payload useless anyway.
    let key = match &segment.key {
        Some(key) => match keys.prefetch(key).await {
            Ok(bytes) => bytes,
            Err(error) => return (sequence, Err(error)),
        },
        None => None,
    };

    match fetch_with_retries(
        fetch.as_ref(),
        &segment.url,
        config.segment_timeout,
        config.max_segment_retries,
        config.segment_retry_delay,
    )
    .await
    {
        Ok(data) => {
            debug!(sequence, url = %segment.url, bytes = data.len(), "segment ready");
            (
                sequence,
                Ok(PrefetchedSegment {
                    sequence,
                    segment,
                    data,
                    key,
                }),
            )
        }
        Err(error) => (sequence, Err(error)),
    }
}
