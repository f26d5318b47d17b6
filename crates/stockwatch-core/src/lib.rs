//! Stockwatch Core - Foundation crate for the Stockwatch stock checker.
//!
//! This crate provides the product data model, error handling and
//! configuration management that the browser and scraper crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - `Product`, `Variant` and the `ProductUrl` newtype
//!
//! # Example
//!
//! ```rust
//! use stockwatch_core::{AppConfig, Product, Variant};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.retry.max_retries, 3);
//!
//! let variant = Variant::new("Aqua 50ml", 5, "AQ1", "£10.00", "https://shop.example/p/aqua");
//! let product = Product::new(
//!     "Aqua",
//!     "AQ1",
//!     vec![variant],
//!     "https://shop.example/p/aqua",
//!     "123",
//!     "http://x/img.png",
//! )?;
//! assert!(product.any_in_stock());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserConfig, FetchStrategy, FetcherConfig, RetryConfig, RetryPolicy, SiteConfig,
};
pub use error::{ConfigError, ConfigResult, Result, StockwatchError};
pub use types::{Product, ProductUrl, Variant};
