//! Vulnerability lookups against the NVD CVE API.
//!
//! [`NvdClient`] searches the CVE database by keyword (one keyword per
//! product name), validates and normalizes the response, and caches
//! results in a [`VulnCache`]. Multi-product lookups run in small
//! concurrent batches separated by a fixed delay to stay under the public
//! API's rate limit.
//!
//! # Example
//!
//! ```no_run
//! use depwatch::nvd::{NvdClient, ReqwestTransport};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = NvdClient::new(ReqwestTransport::nvd(None)?);
//!     let products = vec!["log4j".to_string(), "lodash".to_string()];
//!     let fetched = client.fetch_for_products(&products, 20, &CancellationToken::new()).await?;
//!     for cve in &fetched.records {
//!         println!("{} {}", cve.id, cve.severity);
//!     }
//!     Ok(())
//! }
//! ```

mod cache;
mod response;
mod sleeper;
mod transport;

pub use cache::{Clock, ManualClock, SystemClock, VulnCache, DEFAULT_CAPACITY, DEFAULT_TTL};
pub use response::{is_valid_cve_id, parse_response, sanitize_text, validate};
pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};
pub use transport::{NvdQuery, NvdTransport, ReqwestTransport, NVD_API_URL, REQUEST_TIMEOUT};

use crate::guard::InFlight;
use crate::model::VulnerabilityRecord;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const BATCH_SIZE: usize = 5;
pub const BATCH_DELAY: Duration = Duration::from_millis(6500);
pub const DEFAULT_RESULTS_PER_PRODUCT: usize = 20;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid response: {0}")]
    Validation(String),

    #[error("rate limited by the NVD API (HTTP 403); set an API key or retry later")]
    RateLimited,

    #[error("NVD API returned HTTP {status}")]
    Api { status: u16 },

    #[error("response is not valid JSON: {0}")]
    Malformed(String),

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("fetch cancelled")]
    Cancelled,

    #[error("a fetch is already in progress")]
    Busy,
}

/// Batch pacing and cache sizing for an [`NvdClient`].
///
/// `batch_size` is capped at [`BATCH_SIZE`] when fetching.
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            batch_delay: BATCH_DELAY,
            cache_ttl: DEFAULT_TTL,
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// A product whose lookup failed during a multi-product fetch.
#[derive(Debug)]
pub struct ProductFailure {
    pub product: String,
    pub error: FetchError,
}

/// Outcome of [`NvdClient::fetch_for_products`].
#[derive(Debug, Default)]
pub struct ProductFetch {
    /// Deduplicated records, newest first.
    pub records: Vec<VulnerabilityRecord>,
    pub failures: Vec<ProductFailure>,
}

impl ProductFetch {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn rate_limited(&self) -> bool {
        self.failures
            .iter()
            .any(|f| matches!(f.error, FetchError::RateLimited))
    }
}

/// Cached, paced CVE lookups over an [`NvdTransport`].
///
/// Only one [`fetch_for_products`](Self::fetch_for_products) call runs at a
/// time per client; single keyword lookups are not guarded.
pub struct NvdClient<T: NvdTransport> {
    transport: T,
    cache: VulnCache,
    sleeper: Arc<dyn Sleeper>,
    options: ClientOptions,
    in_flight: InFlight,
}

impl<T: NvdTransport> NvdClient<T> {
    pub fn new(transport: T) -> Self {
        Self::with_parts(
            transport,
            ClientOptions::default(),
            Arc::new(SystemClock),
            Arc::new(TokioSleeper),
        )
    }

    /// Builds a client with explicit pacing, cache clock and sleeper.
    pub fn with_parts(
        transport: T,
        options: ClientOptions,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            transport,
            cache: VulnCache::new(clock, options.cache_ttl, options.cache_capacity),
            sleeper,
            options,
            in_flight: InFlight::new(),
        }
    }

    pub fn cache(&self) -> &VulnCache {
        &self.cache
    }

    /// Looks up CVEs matching `keyword`, served from cache within the TTL.
    ///
    /// # Errors
    ///
    /// Any [`FetchError`] from the transport, or [`FetchError::Validation`]
    /// if the response fails the structural checks.
    pub async fn fetch_for_keyword(
        &self,
        keyword: &str,
        results_per_page: usize,
    ) -> Result<Vec<VulnerabilityRecord>, FetchError> {
        let key = VulnCache::key(keyword, results_per_page);
        if let Some(records) = self.cache.get(&key) {
            debug!(keyword, hits = records.len(), "CVE cache hit");
            return Ok(records);
        }

        let body = self
            .transport
            .search(&NvdQuery::new(keyword, results_per_page))
            .await?;
        let records = parse_response(&body)?;
        debug!(keyword, found = records.len(), "Fetched CVEs");

        self.cache.insert(key, records.clone());
        Ok(records)
    }

    /// Looks up every product, in paced batches, and merges the results.
    ///
    /// A failing product contributes no records and is listed in
    /// [`ProductFetch::failures`].
    ///
    /// # Errors
    ///
    /// - [`FetchError::Busy`] if another multi-product fetch is running on this client
    /// - [`FetchError::Cancelled`] once `cancel` fires; partial results are dropped
    pub async fn fetch_for_products(
        &self,
        products: &[String],
        results_per_product: usize,
        cancel: &CancellationToken,
    ) -> Result<ProductFetch, FetchError> {
        let _guard = self.in_flight.try_enter().ok_or(FetchError::Busy)?;

        let batch_size = self.options.batch_size.clamp(1, BATCH_SIZE);
        let batches = products.len().div_ceil(batch_size);
        info!(products = products.len(), batches, "Fetching vulnerabilities");

        let mut fetched = Vec::with_capacity(products.len());
        let mut failures = Vec::new();

        for (index, batch) in products.chunks(batch_size).enumerate() {
            if index > 0 {
                if cancel.is_cancelled() {
                    return Err(FetchError::Cancelled);
                }
                tokio::select! {
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    _ = self.sleeper.sleep(self.options.batch_delay) => {}
                }
            }
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            debug!(batch = index + 1, of = batches, size = batch.len(), "Fetching batch");
            let results = join_all(
                batch
                    .iter()
                    .map(|product| self.fetch_for_keyword(product, results_per_product)),
            )
            .await;
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            for (product, result) in batch.iter().zip(results) {
                match result {
                    Ok(records) => fetched.push((product.clone(), records)),
                    Err(error) => {
                        warn!(product = %product, error = %error, "Vulnerability lookup failed");
                        failures.push(ProductFailure {
                            product: product.clone(),
                            error,
                        });
                    }
                }
            }
        }

        let records = merge(fetched);
        info!(
            records = records.len(),
            failed = failures.len(),
            "Vulnerability fetch finished"
        );
        Ok(ProductFetch { records, failures })
    }
}

/// Flattens per-product results, keeping the first occurrence of each id
/// tagged with its product, newest first.
fn merge(fetched: Vec<(String, Vec<VulnerabilityRecord>)>) -> Vec<VulnerabilityRecord> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for (product, records) in fetched {
        for mut record in records {
            if seen.insert(record.id.clone()) {
                record.matched_product = Some(product.clone());
                merged.push(record);
            }
        }
    }

    merged.sort_by(|a, b| b.published_at().cmp(&a.published_at()));
    merged
}
