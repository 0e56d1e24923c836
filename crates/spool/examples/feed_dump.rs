//! Opens a playlist URL and prints each segment as it is handed off.
//!
//! Usage: cargo run --example feed_dump -- <playlist-url> [quality]
//!
//! `quality` is `auto` or a pixel height such as `720`.

use futures::StreamExt;
use spool_engine::{FeedConfig, QualityPreference, SegmentFeed};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .ok_or("usage: feed_dump <playlist-url> [quality]")?;
    let mut config = FeedConfig::default();
    if let Some(quality) = args.next() {
        config.quality = QualityPreference::parse(&quality);
    }

    let feed = SegmentFeed::open(&url, config).await?;
    if let Some(variant) = feed.selected_variant() {
        println!("variant: {} ({} bps)", variant.url, variant.bandwidth);
    }
    println!(
        "{} segments known, complete: {}",
        feed.segments().len(),
        feed.is_complete()
    );

    let mut segments = feed.prefetch();
    while let Some(item) = segments.next().await {
        let segment = item?;
        println!(
            "#{} {} {:.3}s {} bytes{}",
            segment.sequence,
            segment.segment.url,
            segment.segment.duration,
            segment.data.len(),
            if segment.is_encrypted() {
                " [encrypted]"
            } else {
                ""
            }
        );
    }
    Ok(())
}
