//! Per-host request spacing for polite crawling.
//!
//! ```rust,no_run
//! use palmcrawl_core::CrawlConfig;
//! use palmcrawl_core::throttle::{ThrottleConfig, ThrottledFetcher};
//!
//! # use palmcrawl_core::traits::Fetcher;
//! # #[derive(Clone)] struct MyFetcher;
//! # impl Fetcher for MyFetcher {
//! #     async fn fetch(&self, _: &str) -> Result<String, palmcrawl_core::CrawlError> { todo!() }
//! # }
//! let config = CrawlConfig::default();
//! let fetcher = ThrottledFetcher::new(MyFetcher, ThrottleConfig::from_crawl(&config));
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::config::CrawlConfig;
use crate::domain::host_of;
use crate::error::CrawlError;
use crate::traits::Fetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Minimum gap between two request starts on one host.
    pub delay: Duration,
}

impl ThrottleConfig {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_crawl(config: &CrawlConfig) -> Self {
        Self::new(config.fetch_delay())
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

/// Next free start time per host.
#[derive(Debug, Default)]
struct HostSchedule {
    next_start: HashMap<String, Instant>,
}

impl HostSchedule {
    /// Book the next start for `host` as seen at `now`; returns the wait.
    fn book(&mut self, host: &str, now: Instant, delay: Duration) -> Duration {
        let start = self
            .next_start
            .get(host)
            .copied()
            .filter(|slot| *slot > now)
            .unwrap_or(now);
        self.next_start.insert(host.to_string(), start + delay);
        start - now
    }
}

/// A [`Fetcher`] that keeps requests to one host `delay` apart.
///
/// Waits are booked under the lock and slept outside it, so workers on the
/// same host line up and other hosts proceed immediately. Urls without a
/// host pass straight through.
#[derive(Clone)]
pub struct ThrottledFetcher<F> {
    inner: F,
    config: ThrottleConfig,
    schedule: Arc<Mutex<HostSchedule>>,
}

impl<F: Fetcher> ThrottledFetcher<F> {
    pub fn new(inner: F, config: ThrottleConfig) -> Self {
        Self {
            inner,
            config,
            schedule: Arc::new(Mutex::new(HostSchedule::default())),
        }
    }
}

impl<F: Fetcher> Fetcher for ThrottledFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<String, CrawlError> {
        let host = host_of(url).filter(|_| !self.config.delay.is_zero());
        if let Some(host) = host {
            let wait = self
                .schedule
                .lock()
                .await
                .book(&host, Instant::now(), self.config.delay);
            if !wait.is_zero() {
                tracing::debug!(%host, wait_ms = wait.as_millis() as u64, "Waiting for host slot");
                tokio::time::sleep(wait).await;
            }
        }
        self.inner.fetch(url).await
    }
}
