//! HTTP fetching with optional exponential backoff.
//!
//! # Architecture
//!
//! - [`Fetcher`]: Core trait for "GET this URL" as text or bytes
//! - [`HttpFetcher`]: `reqwest` implementation that treats non-2xx as failure
//! - [`RetryFetch`]: Decorator that retries retryable failures on any `Fetcher`
//!
//! # Retry Strategy
//!
//! - Only transport errors, HTTP 429 and 5xx are retried
//! - Exponential backoff starting at 1 second, capped at 30 seconds
//! - Random jitter (0-250ms) added to each delay
//! - With `max_retries == 0` the first failure is returned as-is

use crate::config::FetchConfig;
use crate::error::FetchError;
use rand::{rng, Rng};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Something that can GET a URL.
///
/// The pipeline is generic over this trait so tests can serve canned pages.
pub trait Fetcher {
    /// GET `url` and return the body as text.
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;

    /// GET `url` and return the raw body.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

impl<T: Fetcher> Fetcher for &T {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        (**self).fetch_text(url).await
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        (**self).fetch_bytes(url).await
    }
}

/// `reqwest`-backed fetcher sharing one connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let body = self
            .get(url)
            .await?
            .text()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        debug!(bytes = body.len(), elapsed_ms = t0.elapsed().as_millis(), "Fetched page");
        Ok(body)
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let body = self
            .get(url)
            .await?
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        debug!(bytes = body.len(), "Fetched bytes");
        Ok(body.to_vec())
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`Fetcher`].
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryFetch<T>
where
    T: Fetcher,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1).min(16));
        if delay > self.max_delay {
            delay = self.max_delay;
        }
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + StdDuration::from_millis(jitter_ms)
    }

    async fn with_retries<R, Fut>(&self, url: &str, mut call: impl FnMut() -> Fut) -> Result<R, FetchError>
    where
        Fut: std::future::Future<Output = Result<R, FetchError>>,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match call().await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if !e.is_retryable() || attempt > self.max_retries {
                        if self.max_retries > 0 {
                            error!(
                                %url,
                                attempt,
                                max = self.max_retries,
                                elapsed_ms_total = total_dt.as_millis(),
                                error = %e,
                                "GET gave up"
                            );
                        }
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        %url,
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "GET failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> Fetcher for RetryFetch<T>
where
    T: Fetcher,
{
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.with_retries(url, || self.inner.fetch_text(url)).await
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.with_retries(url, || self.inner.fetch_bytes(url)).await
    }
}

/// Build the production fetcher from configuration.
pub fn build_fetcher(config: &FetchConfig) -> Result<RetryFetch<HttpFetcher>, reqwest::Error> {
    let http = HttpFetcher::new(config)?;
    Ok(RetryFetch::new(http, config.retries, StdDuration::from_secs(1)))
}
