//! Reporting hooks for failed attempts and failed extractions.

use crate::error::ExtractError;

/// Receives failure notifications from the retry loop.
pub trait ExtractionObserver: Send + Sync {
    /// Attempt `attempt` (1-based) for `url` failed with `error`.
    fn attempt_failed(&self, attempt: u32, url: &str, error: &ExtractError);

    /// Every attempt for `url` failed.
    fn extraction_failed(&self, url: &str);
}

/// Default observer that writes to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ExtractionObserver for TracingObserver {
    fn attempt_failed(&self, attempt: u32, url: &str, error: &ExtractError) {
        tracing::warn!(
            kind = %error.kind(),
            "Attempt {} failed for {}: {}",
            attempt,
            url,
            error
        );
    }

    fn extraction_failed(&self, url: &str) {
        tracing::error!("Error fetching product data from {}", url);
    }
}
