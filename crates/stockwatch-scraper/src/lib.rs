//! Stockwatch Scraper - Product stock extraction.
//!
//! This crate turns a product page URL into a [`Product`](stockwatch_core::Product)
//! record. One attempt runs four stages:
//!
//! - [`fetcher`] - retrieve the page past bot challenges and consent dialogs
//! - [`locator`] - find the script carrying the embedded product state
//! - [`decoder`] - unescape and unwrap that script into a JSON tree
//! - [`normalizer`] - map the tree onto products and variants
//!
//! [`ExtractionPipeline`] wraps the stages in a bounded retry loop with a
//! fresh browser identity per attempt.
//!
//! # Example
//!
//! ```rust,ignore
//! use stockwatch_core::AppConfig;
//! use stockwatch_scraper::ExtractionPipeline;
//!
//! let config = AppConfig::load_with_env()?;
//! let pipeline = ExtractionPipeline::from_config(&config)?;
//!
//! match pipeline.extract("https://www.thefragranceshop.co.uk/aqua").await {
//!     Ok(product) => println!("{} in stock: {}", product.name(), product.any_in_stock()),
//!     Err(failure) => eprintln!("{}", failure.user_message()),
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod decoder;
pub mod error;
pub mod fetcher;
pub mod locator;
pub mod normalizer;
pub mod observer;
pub mod pipeline;

// Re-export commonly used types
pub use decoder::decode_payload;
pub use error::{ErrorKind, ExtractError, ExtractionFailure, Result};
pub use fetcher::{
    fetcher_from_config, navigation_headers, BrowserFetcher, CookieReplayFetcher, PageFetcher,
};
pub use locator::locate_payload;
pub use normalizer::VariantNormalizer;
pub use observer::{ExtractionObserver, TracingObserver};
pub use pipeline::{
    ExtractionPipeline, ExtractionResult, DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_RETRIES,
};
