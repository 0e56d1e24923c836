#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use spool_engine::{FeedError, Fetch, FetchResponse};

#[derive(Clone)]
enum Scripted {
    Respond {
        status: u16,
        body: Bytes,
        delay: Duration,
    },
    Fail(FeedError),
}

/// Scripted [`Fetch`] implementation.
///
/// Each URL gets a queue of responses; the queue drains in order and
/// the final entry repeats forever, which lets live-refresh tests serve
/// successive playlist generations and then settle. Unrouted URLs
/// answer 404.
#[derive(Default)]
pub struct StubFetch {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubFetch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, url: &str, body: &str) {
        self.push(
            url,
            Scripted::Respond {
                status: 200,
                body: Bytes::copy_from_slice(body.as_bytes()),
                delay: Duration::ZERO,
            },
        );
    }

    pub fn route_bytes(&self, url: &str, body: &[u8]) {
        self.push(
            url,
            Scripted::Respond {
                status: 200,
                body: Bytes::copy_from_slice(body),
                delay: Duration::ZERO,
            },
        );
    }

    pub fn route_status(&self, url: &str, status: u16, body: &str) {
        self.push(
            url,
            Scripted::Respond {
                status,
                body: Bytes::copy_from_slice(body.as_bytes()),
                delay: Duration::ZERO,
            },
        );
    }

    pub fn route_delayed(&self, url: &str, delay: Duration, body: &[u8]) {
        self.push(
            url,
            Scripted::Respond {
                status: 200,
                body: Bytes::copy_from_slice(body),
                delay,
            },
        );
    }

    pub fn route_error(&self, url: &str, error: FeedError) {
        self.push(url, Scripted::Fail(error));
    }

    fn push(&self, url: &str, item: Scripted) {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(item);
    }

    /// How many times the given URL was requested.
    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Peak number of concurrently outstanding requests.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for StubFetch {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResponse, FeedError> {
        self.calls.lock().unwrap().push(url.to_string());

        let scripted = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(url) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        let Some(scripted) = scripted else {
            return Err(FeedError::Status {
                url: url.to_string(),
                status: 404,
            });
        };

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let outcome = match scripted {
            Scripted::Fail(error) => Err(error),
            Scripted::Respond {
                status,
                body,
                delay,
            } => {
                if !timeout.is_zero() && !delay.is_zero() && delay >= timeout {
                    tokio::time::sleep(timeout).await;
                    Err(FeedError::Timeout {
                        url: url.to_string(),
                    })
                } else {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    Ok(FetchResponse { status, body })
                }
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}
