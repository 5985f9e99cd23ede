use crate::{core::config::RemoteConfig, MapError, Result};
use std::{future::Future, time::Duration};

/// Bounded retries with a fixed delay, for upstreams that shed load with
/// 429/503/504 (Overpass does).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn overpass(config: &RemoteConfig) -> Self {
        Self::new(config.overpass_max_retries, config.overpass_retry_delay())
    }

    pub fn is_retryable(error: &MapError) -> bool {
        matches!(
            error,
            MapError::RemoteFetch {
                status: Some(429 | 503 | 504),
                ..
            }
        )
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error or
    /// the retry budget is spent. The last error is returned as is.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && Self::is_retryable(&e) => {
                    attempt += 1;
                    log::warn!(
                        "attempt {} failed ({}), retrying in {:?}",
                        attempt,
                        e,
                        self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
