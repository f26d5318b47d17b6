//! Extraction pipeline with retry.
//!
//! This module provides `ExtractionPipeline`, which runs fetch, locate,
//! decode and normalize for a product URL and retries failed attempts up to
//! a fixed budget. Each attempt presents a freshly randomized browser
//! identity; nothing else changes between attempts and there is no delay.

use crate::decoder::decode_payload;
use crate::error::{ExtractError, ExtractionFailure, Result};
use crate::fetcher::{fetcher_from_config, PageFetcher};
use crate::locator::locate_payload;
use crate::normalizer::VariantNormalizer;
use crate::observer::{ExtractionObserver, TracingObserver};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use stockwatch_browser::FingerprintConfig;
use stockwatch_core::{AppConfig, Product, ProductUrl, RetryPolicy, SiteConfig, StockwatchError};

/// Default number of attempts per extraction.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default number of extractions `extract_many` runs at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Outcome of one URL in a batch.
pub type ExtractionResult = std::result::Result<Product, ExtractionFailure>;

/// Runs product extractions against a retail site.
pub struct ExtractionPipeline {
    /// Page source
    fetcher: Arc<dyn PageFetcher>,
    /// Failure reporting
    observer: Arc<dyn ExtractionObserver>,
    /// Payload tree to product mapping
    normalizer: VariantNormalizer,
    /// Substring identifying the product-state script
    marker: String,
    /// Attempts per extraction
    max_retries: u32,
    /// Which failures are retried
    policy: RetryPolicy,
}

impl ExtractionPipeline {
    /// Create a pipeline over `fetcher` for the site described by `site`.
    ///
    /// Uses the default attempt budget, uniform retries and a
    /// [`TracingObserver`].
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        site: &SiteConfig,
    ) -> std::result::Result<Self, StockwatchError> {
        let normalizer = VariantNormalizer::new(&site.base_url).map_err(|e| {
            StockwatchError::Validation(format!("invalid site base URL '{}': {e}", site.base_url))
        })?;

        Ok(Self {
            fetcher,
            observer: Arc::new(TracingObserver),
            normalizer,
            marker: site.marker.clone(),
            max_retries: DEFAULT_MAX_RETRIES,
            policy: RetryPolicy::Uniform,
        })
    }

    /// Create a pipeline with the fetch strategy, site and retry settings
    /// from `config`.
    pub fn from_config(config: &AppConfig) -> std::result::Result<Self, StockwatchError> {
        config.validate()?;
        let fetcher = fetcher_from_config(config)?;

        Ok(Self::new(fetcher, &config.site)?
            .with_max_retries(config.retry.max_retries)
            .with_policy(config.retry.policy))
    }

    /// Replace the failure observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ExtractionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Set the attempt budget. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attempt budget used when no override is given.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Extract the product at `url` with the configured attempt budget.
    pub async fn extract(&self, url: &str) -> ExtractionResult {
        self.extract_with_retries(url, None).await
    }

    /// Extract the product at `url`, optionally overriding the attempt
    /// budget for this call.
    ///
    /// Never returns an attempt error directly: once the budget is spent
    /// (or a permanent error stops a `TransientOnly` run) the result is an
    /// [`ExtractionFailure`] carrying the URL and the last error.
    pub async fn extract_with_retries(
        &self,
        url: &str,
        max_retries: Option<u32>,
    ) -> ExtractionResult {
        if let Err(e) = ProductUrl::new(url) {
            tracing::warn!("Rejecting extraction for {}: {}", url, e);
            self.observer.extraction_failed(url);
            return Err(ExtractionFailure {
                url: url.to_string(),
                attempts: 0,
                last_error: Some(ExtractError::fetch(url, e)),
            });
        }

        let budget = max_retries.unwrap_or(self.max_retries).max(1);
        let mut attempts = 0;
        let mut last_error = None;

        for attempt in 1..=budget {
            attempts = attempt;
            let identity = FingerprintConfig::randomized();

            match self.run_attempt(url, &identity).await {
                Ok(product) => {
                    tracing::info!(
                        "Extracted {} ({} variants) from {} on attempt {}/{}",
                        product.name(),
                        product.variants().len(),
                        url,
                        attempt,
                        budget
                    );
                    return Ok(product);
                }
                Err(e) => {
                    self.observer.attempt_failed(attempt, url, &e);
                    let give_up = self.policy == RetryPolicy::TransientOnly && !e.is_transient();
                    last_error = Some(e);

                    if give_up {
                        tracing::warn!(
                            "Permanent failure for {}, skipping remaining attempts",
                            url
                        );
                        break;
                    }
                }
            }
        }

        self.observer.extraction_failed(url);
        Err(ExtractionFailure {
            url: url.to_string(),
            attempts,
            last_error,
        })
    }

    /// One pass of fetch, locate, decode and normalize.
    async fn run_attempt(&self, url: &str, identity: &FingerprintConfig) -> Result<Product> {
        tracing::debug!("Fetching {} as {}", url, identity.user_agent());
        let html = self.fetcher.fetch(url, identity).await?;

        let payload = locate_payload(&html, &self.marker)?;
        tracing::debug!("Located payload ({} bytes) on {}", payload.len(), url);

        let tree = decode_payload(&payload)?;
        self.normalizer.normalize(&tree, url)
    }

    /// Extract several products, at most `max_concurrent` at a time.
    ///
    /// Results come back in completion order, each paired with its URL.
    pub async fn extract_many(
        &self,
        urls: &[String],
        max_concurrent: usize,
    ) -> Vec<(String, ExtractionResult)> {
        let max_concurrent = max_concurrent.max(1);
        let mut futures = FuturesUnordered::new();
        let mut results = Vec::with_capacity(urls.len());

        for url in urls {
            futures.push(async move { (url.clone(), self.extract(url).await) });

            // Respect concurrency limit
            while futures.len() >= max_concurrent {
                if let Some(result) = futures.next().await {
                    results.push(result);
                }
            }
        }

        // Collect remaining results
        while let Some(result) = futures.next().await {
            results.push(result);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_constants() {
        const _: () = assert!(DEFAULT_MAX_RETRIES == 3);
        const _: () = assert!(DEFAULT_MAX_CONCURRENT > 0);
    }

    #[test]
    fn test_from_default_config() {
        let pipeline = ExtractionPipeline::from_config(&AppConfig::default()).expect("pipeline");
        assert_eq!(pipeline.max_retries(), 3);
        assert_eq!(pipeline.policy, RetryPolicy::Uniform);
        assert_eq!(pipeline.marker, "currentStock");
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let mut config = AppConfig::default();
        config.retry.max_retries = 0;
        assert!(ExtractionPipeline::from_config(&config).is_err());
    }

    #[test]
    fn test_zero_budget_raised_to_one() {
        let pipeline = ExtractionPipeline::from_config(&AppConfig::default())
            .expect("pipeline")
            .with_max_retries(0);
        assert_eq!(pipeline.max_retries(), 1);
    }
}
