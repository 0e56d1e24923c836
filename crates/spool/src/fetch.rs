use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONNECTION, HeaderMap, HeaderName, HeaderValue, REFERER,
    UPGRADE_INSECURE_REQUESTS,
};
use reqwest::redirect::Policy;
use rustls::ClientConfig;
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::warn;

use crate::config::HttpConfig;
use crate::error::FeedError;

/// A fetched HTTP document: status code plus raw body.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as text, replacing invalid UTF-8 sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Converts a non-success status into [`FeedError::Status`].
    pub fn error_for_status(self, url: &str) -> Result<Self, FeedError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FeedError::Status {
                url: url.to_string(),
                status: self.status,
            })
        }
    }
}

/// Transport abstraction used by every component that touches the
/// network. Production code uses [`HttpFetch`]; tests substitute a
/// scripted implementation.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Performs a GET and returns the status and body, regardless of
    /// status class. Interpretation of non-success codes is left to the
    /// caller.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResponse, FeedError>;
}

/// [`Fetch`] implementation backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetch {
    client: Client,
}

impl HttpFetch {
    pub fn new(config: &HttpConfig) -> Result<Self, FeedError> {
        Ok(Self {
            client: build_client(config)?,
        })
    }

    /// Wraps an existing client, sharing its connection pool.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for HttpFetch {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResponse, FeedError> {
        let mut request = self.client.get(url);
        if !timeout.is_zero() {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| classify_error(url, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(url, e))?;

        Ok(FetchResponse { status, body })
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> FeedError {
    if error.is_timeout() {
        FeedError::Timeout {
            url: url.to_string(),
        }
    } else {
        FeedError::Network {
            url: url.to_string(),
            source: Arc::new(error),
        }
    }
}

/// Builds the shared HTTP client with platform certificate
/// verification and browser-like default headers.
pub fn build_client(config: &HttpConfig) -> Result<Client, FeedError> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| FeedError::Config(format!("TLS protocol setup failed: {e}")))?
        .with_platform_verifier()
        .map_err(|e| FeedError::Config(format!("platform certificate verifier failed: {e}")))?
        .with_no_client_auth();

    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    if let Some(referer) = &config.referer {
        let value = HeaderValue::from_str(referer)
            .map_err(|e| FeedError::Config(format!("invalid referer value: {e}")))?;
        headers.insert(REFERER, value);
    }
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| FeedError::Config(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| FeedError::Config(format!("invalid header value for {name}: {e}")))?;
        headers.insert(name, value);
    }

    let mut builder = Client::builder()
        .pool_max_idle_per_host(5)
        .user_agent(&config.user_agent)
        .default_headers(headers)
        .use_preconfigured_tls(tls_config)
        .redirect(if config.follow_redirects {
            Policy::limited(10)
        } else {
            Policy::none()
        });

    if !config.timeout.is_zero() {
        builder = builder.timeout(config.timeout);
    }
    if !config.connect_timeout.is_zero() {
        builder = builder.connect_timeout(config.connect_timeout);
    }

    builder
        .build()
        .map_err(|e| FeedError::Config(format!("failed to build HTTP client: {e}")))
}

/// Fetches a URL with exponential backoff on retryable failures.
///
/// Non-success statuses are converted to [`FeedError::Status`] first so
/// the retry decision follows [`FeedError::is_retryable`]: 5xx and
/// transport hiccups retry, 4xx fail immediately. `max_retries` counts
/// retries, so the request is attempted at most `max_retries + 1` times.
pub async fn fetch_with_retries(
    fetch: &dyn Fetch,
    url: &str,
    timeout: Duration,
    max_retries: u32,
    retry_delay_base: Duration,
) -> Result<Bytes, FeedError> {
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        let error = match fetch.fetch(url, timeout).await {
            Ok(response) => match response.error_for_status(url) {
                Ok(response) => return Ok(response.body),
                Err(error) => error,
            },
            Err(error) => error,
        };

        if !error.is_retryable() || attempts > max_retries {
            return Err(error);
        }

        let delay = retry_delay_base * 2_u32.pow(attempts.saturating_sub(1));
        warn!(url, attempt = attempts, error = %error, delay_ms = delay.as_millis() as u64, "fetch failed, retrying");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Fails with the given error a fixed number of times, then serves
    /// the scripted body.
    struct FlakyFetch {
        failures: u32,
        error: FeedError,
        body: &'static str,
        calls: AtomicU32,
    }

    impl FlakyFetch {
        fn new(failures: u32, error: FeedError, body: &'static str) -> Self {
            Self {
                failures,
                error,
                body,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetch for FlakyFetch {
        async fn fetch(&self, _url: &str, _timeout: Duration) -> Result<FetchResponse, FeedError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(self.error.clone());
            }
            Ok(FetchResponse {
                status: 200,
                body: Bytes::from_static(self.body.as_bytes()),
            })
        }
    }

    fn timeout_error() -> FeedError {
        FeedError::Timeout {
            url: "http://example.com/seg.ts".to_string(),
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let fetch = FlakyFetch::new(2, timeout_error(), "payload");
        let body = fetch_with_retries(
            &fetch,
            "http://example.com/seg.ts",
            Duration::from_secs(1),
            3,
            Duration::from_millis(1),
        )
        .await
        .unwrap();

        assert_eq!(body.as_ref(), b"payload");
        assert_eq!(fetch.calls(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let fetch = FlakyFetch::new(u32::MAX, timeout_error(), "");
        let error = fetch_with_retries(
            &fetch,
            "http://example.com/seg.ts",
            Duration::from_secs(1),
            2,
            Duration::from_millis(1),
        )
        .await
        .unwrap_err();

        assert!(matches!(error, FeedError::Timeout { .. }));
        // Initial attempt plus two retries.
        assert_eq!(fetch.calls(), 3);
    }

    #[tokio::test]
    async fn client_errors_fail_without_retry() {
        struct NotFound;

        #[async_trait]
        impl Fetch for NotFound {
            async fn fetch(
                &self,
                _url: &str,
                _timeout: Duration,
            ) -> Result<FetchResponse, FeedError> {
                Ok(FetchResponse {
                    status: 404,
                    body: Bytes::new(),
                })
            }
        }

        let error = fetch_with_retries(
            &NotFound,
            "http://example.com/gone.ts",
            Duration::from_secs(1),
            3,
            Duration::from_millis(1),
        )
        .await
        .unwrap_err();

        assert!(matches!(error, FeedError::Status { status: 404, .. }));
    }

    #[test]
    fn status_conversion() {
        let response = FetchResponse {
            status: 500,
            body: Bytes::new(),
        };
        let error = response.error_for_status("http://example.com/a.m3u8").unwrap_err();
        assert!(matches!(error, FeedError::Status { status: 500, .. }));

        let response = FetchResponse {
            status: 204,
            body: Bytes::new(),
        };
        assert!(response.error_for_status("http://example.com/a.m3u8").is_ok());
    }

    #[test]
    fn lossy_text_decoding() {
        let response = FetchResponse {
            status: 200,
            body: Bytes::from_static(b"#EXTM3U\xff\n"),
        };
        assert!(response.text().starts_with("#EXTM3U"));
    }
}
