//! Product records produced by the extraction pipeline.
//!
//! Both records are immutable once built. `Variant::in_stock` is always
//! derived from the stock level, and a `Product` always owns at least one
//! variant.

use crate::error::StockwatchError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype for an absolute product-page URL.
///
/// Only `http` and `https` URLs with a host are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductUrl(String);

impl ProductUrl {
    /// Create a new `ProductUrl` from a string.
    ///
    /// # Errors
    /// Returns error if the string is not an absolute http(s) URL.
    pub fn new(url: impl Into<String>) -> Result<Self, StockwatchError> {
        let url = url.into();
        Self::validate(&url)?;
        Ok(Self(url))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(raw: &str) -> Result<(), StockwatchError> {
        let parsed = url::Url::parse(raw).map_err(|e| {
            StockwatchError::Validation(format!("invalid product URL '{raw}': {e}"))
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(StockwatchError::Validation(format!(
                "invalid product URL '{raw}': scheme must be http or https"
            )));
        }

        if parsed.host_str().is_none() {
            return Err(StockwatchError::Validation(format!(
                "invalid product URL '{raw}': missing host"
            )));
        }

        Ok(())
    }
}

impl TryFrom<String> for ProductUrl {
    type Error = StockwatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProductUrl> for String {
    fn from(url: ProductUrl) -> Self {
        url.0
    }
}

impl fmt::Display for ProductUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One purchasable SKU of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "VariantRecord")]
pub struct Variant {
    name: String,
    stock_level: u32,
    in_stock: bool,
    code: String,
    formatted_price: String,
    url: String,
}

impl Variant {
    /// Build a variant. `in_stock` is derived from `stock_level`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        stock_level: u32,
        code: impl Into<String>,
        formatted_price: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            stock_level,
            in_stock: stock_level > 0,
            code: code.into(),
            formatted_price: formatted_price.into(),
            url: url.into(),
        }
    }

    /// Display name of the variant (e.g. size or strength).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Units currently in stock.
    #[must_use]
    pub fn stock_level(&self) -> u32 {
        self.stock_level
    }

    /// Whether at least one unit is in stock.
    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.in_stock
    }

    /// Retailer stock code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Display-ready, currency-inclusive price.
    #[must_use]
    pub fn formatted_price(&self) -> &str {
        &self.formatted_price
    }

    /// Absolute URL of the variant page.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Wire shape of a variant. Any serialized `in_stock` is ignored and
/// recomputed on the way in.
#[derive(Deserialize)]
struct VariantRecord {
    name: String,
    stock_level: u32,
    code: String,
    formatted_price: String,
    url: String,
}

impl From<VariantRecord> for Variant {
    fn from(record: VariantRecord) -> Self {
        Self::new(
            record.name,
            record.stock_level,
            record.code,
            record.formatted_price,
            record.url,
        )
    }
}

/// One catalog entry and its purchasable variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProductRecord")]
pub struct Product {
    name: String,
    code: String,
    variants: Vec<Variant>,
    url: String,
    ean: String,
    image_url: String,
}

impl Product {
    /// Build a product.
    ///
    /// # Errors
    /// Returns `StockwatchError::Validation` if `variants` is empty.
    pub fn new(
        name: impl Into<String>,
        code: impl Into<String>,
        variants: Vec<Variant>,
        url: impl Into<String>,
        ean: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Result<Self, StockwatchError> {
        let code = code.into();
        if variants.is_empty() {
            return Err(StockwatchError::Validation(format!(
                "product {code} has no variants"
            )));
        }

        Ok(Self {
            name: name.into(),
            code,
            variants,
            url: url.into(),
            ean: ean.into(),
            image_url: image_url.into(),
        })
    }

    /// Full product name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Primary stock code of the product group.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Variants in page order. Never empty.
    #[must_use]
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Canonical product page URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// EAN barcode, empty when the page has none.
    #[must_use]
    pub fn ean(&self) -> &str {
        &self.ean
    }

    /// Product image URL.
    #[must_use]
    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    /// Whether any variant is in stock.
    #[must_use]
    pub fn any_in_stock(&self) -> bool {
        self.variants.iter().any(Variant::in_stock)
    }

    /// Sum of stock across all variants.
    #[must_use]
    pub fn total_stock(&self) -> u64 {
        self.variants
            .iter()
            .map(|v| u64::from(v.stock_level()))
            .sum()
    }
}

#[derive(Deserialize)]
struct ProductRecord {
    name: String,
    code: String,
    variants: Vec<Variant>,
    url: String,
    #[serde(default)]
    ean: String,
    image_url: String,
}

impl TryFrom<ProductRecord> for Product {
    type Error = StockwatchError;

    fn try_from(record: ProductRecord) -> Result<Self, Self::Error> {
        Self::new(
            record.name,
            record.code,
            record.variants,
            record.url,
            record.ean,
            record.image_url,
        )
    }
}
