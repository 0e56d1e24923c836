mod common;

use std::time::Duration;

use common::StubFetch;
use futures::StreamExt;
use m3u8::Segment;
use spool_engine::{FeedConfig, FeedError, SegmentFeed, SegmentStream};
use tokio::time::timeout;

const LIVE_URL: &str = "http://cdn.test/live/media.m3u8";

const WINDOW_1: &str = "#EXTM3U\n\
#EXTINF:2.0,\n\
seg0.ts\n\
#EXTINF:2.0,\n\
seg1.ts\n";

const WINDOW_2: &str = "#EXTM3U\n\
#EXTINF:2.0,\n\
seg1.ts\n\
#EXTINF:2.0,\n\
seg2.ts\n";

const WINDOW_3: &str = "#EXTM3U\n\
#EXTINF:2.0,\n\
seg2.ts\n\
#EXTINF:2.0,\n\
seg3.ts\n\
#EXT-X-ENDLIST\n";

/// Fast refresh cadence so live tests finish in tens of milliseconds.
fn live_config(retries: u32) -> FeedConfig {
    let mut config = FeedConfig::default();
    config.playlist.live_refresh_interval = Duration::from_millis(10);
    config.playlist.live_max_refresh_retries = retries;
    config.playlist.live_refresh_retry_delay = Duration::from_millis(5);
    config
}

async fn drain(mut stream: SegmentStream) -> Vec<Result<Segment, FeedError>> {
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item);
    }
    items
}

async fn segment_urls(stream: SegmentStream) -> Vec<String> {
    drain(stream)
        .await
        .into_iter()
        .map(|item| item.expect("segment").url)
        .collect()
}

#[tokio::test]
async fn follows_the_live_edge_until_the_end_marker() {
    let stub = StubFetch::new();
    stub.route(LIVE_URL, WINDOW_1);
    stub.route(LIVE_URL, WINDOW_2);
    stub.route(LIVE_URL, WINDOW_3);

    let feed = SegmentFeed::open_with(stub.clone(), None, LIVE_URL, live_config(5))
        .await
        .unwrap();
    assert!(!feed.is_complete());

    let urls = timeout(Duration::from_secs(5), segment_urls(feed.stream()))
        .await
        .expect("live stream should complete");

    assert_eq!(
        urls,
        [
            "http://cdn.test/live/seg0.ts",
            "http://cdn.test/live/seg1.ts",
            "http://cdn.test/live/seg2.ts",
            "http://cdn.test/live/seg3.ts",
        ]
    );
    assert_eq!(stub.calls(LIVE_URL), 3);
}

#[tokio::test]
async fn repeated_windows_emit_nothing_new() {
    let stub = StubFetch::new();
    stub.route(LIVE_URL, WINDOW_1);
    stub.route(LIVE_URL, WINDOW_1);
    stub.route(LIVE_URL, WINDOW_3);

    let feed = SegmentFeed::open_with(stub.clone(), None, LIVE_URL, live_config(5))
        .await
        .unwrap();

    let urls = timeout(Duration::from_secs(5), segment_urls(feed.stream()))
        .await
        .expect("live stream should complete");

    // seg0 and seg1 appear once despite being served twice.
    assert_eq!(
        urls,
        [
            "http://cdn.test/live/seg0.ts",
            "http://cdn.test/live/seg1.ts",
            "http://cdn.test/live/seg2.ts",
            "http://cdn.test/live/seg3.ts",
        ]
    );
}

#[tokio::test]
async fn refresh_retries_then_recovers() {
    let stub = StubFetch::new();
    stub.route(LIVE_URL, WINDOW_1);
    stub.route_error(
        LIVE_URL,
        FeedError::Timeout {
            url: LIVE_URL.to_string(),
        },
    );
    stub.route(LIVE_URL, WINDOW_3);

    let feed = SegmentFeed::open_with(stub.clone(), None, LIVE_URL, live_config(3))
        .await
        .unwrap();

    let urls = timeout(Duration::from_secs(5), segment_urls(feed.stream()))
        .await
        .expect("live stream should complete");

    assert_eq!(urls.len(), 4);
    assert_eq!(stub.calls(LIVE_URL), 3);
}

#[tokio::test]
async fn refresh_exhaustion_surfaces_the_error() {
    let stub = StubFetch::new();
    stub.route(LIVE_URL, WINDOW_1);
    stub.route_error(
        LIVE_URL,
        FeedError::Timeout {
            url: LIVE_URL.to_string(),
        },
    );

    let feed = SegmentFeed::open_with(stub.clone(), None, LIVE_URL, live_config(2))
        .await
        .unwrap();

    let items = timeout(Duration::from_secs(5), drain(feed.stream()))
        .await
        .expect("live stream should abort");

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_ref().unwrap().url, "http://cdn.test/live/seg0.ts");
    assert_eq!(items[1].as_ref().unwrap().url, "http://cdn.test/live/seg1.ts");
    assert!(matches!(items[2], Err(FeedError::Timeout { .. })));

    // Initial load plus the failed refresh and its two retries.
    assert_eq!(stub.calls(LIVE_URL), 4);
}

#[tokio::test]
async fn garbage_refresh_aborts_without_retries() {
    let stub = StubFetch::new();
    stub.route(LIVE_URL, WINDOW_1);
    stub.route(LIVE_URL, "<html>stream offline</html>");

    let feed = SegmentFeed::open_with(stub.clone(), None, LIVE_URL, live_config(5))
        .await
        .unwrap();

    let items = timeout(Duration::from_secs(5), drain(feed.stream()))
        .await
        .expect("live stream should abort");

    assert!(matches!(items.last(), Some(Err(FeedError::Format { .. }))));
    // A malformed document is fatal, so exactly one refresh happened.
    assert_eq!(stub.calls(LIVE_URL), 2);
}

#[tokio::test]
async fn cancellation_halts_the_refresh_loop() {
    let stub = StubFetch::new();
    stub.route(LIVE_URL, WINDOW_1);

    let mut config = live_config(5);
    config.playlist.live_refresh_interval = Duration::from_secs(30);

    let feed = SegmentFeed::open_with(stub.clone(), None, LIVE_URL, config)
        .await
        .unwrap();

    let mut stream = feed.stream();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.url, "http://cdn.test/live/seg0.ts");
    let second = stream.next().await.unwrap().unwrap();
    assert_eq!(second.url, "http://cdn.test/live/seg1.ts");

    // The monitor is now parked on a 30s refresh timer; cancellation
    // must cut it short rather than wait the timer out.
    feed.cancel_handle().cancel();
    let end = timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("cancellation should end the stream promptly");
    assert!(end.is_none());

    assert_eq!(stub.calls(LIVE_URL), 1);
}
