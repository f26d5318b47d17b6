//! Mapping of the decoded payload tree onto `Product` and `Variant`.
//!
//! The payload has no stable keyed path to the product data, only fixed
//! positions inside nested flight rows. Each position lives in exactly one
//! accessor below so an upstream index shift is a one-line change.

use crate::error::{ExtractError, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use stockwatch_core::{Product, Variant};
use url::Url;

/// Product-detail record: first row, props slot, `data.product`.
pub const PRODUCT_DETAIL_PATH: &str = "/children/0/3/data/product";

/// Group-buy record holding the sibling variants: second row, props slot.
pub const GROUP_DATA_PATH: &str = "/children/1/3/gbProductData";

#[derive(Debug, Deserialize)]
struct FormattedPrice {
    #[serde(rename = "withTax")]
    with_tax: String,
}

#[derive(Debug, Deserialize)]
struct Price {
    formatted: FormattedPrice,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductDetail {
    full_name: String,
    stock_code: String,
    current_stock: i64,
    price: Price,
    #[serde(default, deserialize_with = "string_or_number")]
    barcode: String,
    image: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantEntry {
    product_name: String,
    stock_code: String,
    current_stock: i64,
    price: Price,
    slug: String,
}

/// Barcodes show up as strings, bare numbers or `null`.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn clamp_stock(raw: i64) -> u32 {
    u32::try_from(raw.max(0)).unwrap_or(u32::MAX)
}

/// Locate the product-detail record.
pub fn product_detail_node(tree: &Value) -> Result<&Value> {
    tree.pointer(PRODUCT_DETAIL_PATH).ok_or_else(|| {
        ExtractError::MalformedProduct(format!("no product record at {PRODUCT_DETAIL_PATH}"))
    })
}

/// Locate the sibling-variant list. An absent, `null` or empty list means
/// the page sells a single variant; the group record itself must exist.
pub fn variant_list_node(tree: &Value) -> Result<&[Value]> {
    let group = tree.pointer(GROUP_DATA_PATH).ok_or_else(|| {
        ExtractError::MalformedProduct(format!("no group record at {GROUP_DATA_PATH}"))
    })?;

    match group.get("variantProducts") {
        None | Some(Value::Null) => Ok(&[][..]),
        Some(Value::Array(entries)) => Ok(entries.as_slice()),
        Some(other) => Err(ExtractError::MalformedProduct(format!(
            "variantProducts is not a list: {other}"
        ))),
    }
}

/// Builds `Product` records from decoded payload trees.
#[derive(Debug, Clone)]
pub struct VariantNormalizer {
    site_base: Url,
}

impl VariantNormalizer {
    /// `site_base` is the URL variant slugs are appended to. A missing
    /// trailing slash is added so the last path segment is kept; any query
    /// or fragment is dropped.
    pub fn new(site_base: &str) -> std::result::Result<Self, url::ParseError> {
        let mut site_base = Url::parse(site_base)?;
        if site_base.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
        }
        if !site_base.path().ends_with('/') {
            let path = format!("{}/", site_base.path());
            site_base.set_path(&path);
        }
        site_base.set_query(None);
        site_base.set_fragment(None);
        Ok(Self { site_base })
    }

    /// Base URL variant slugs are appended to.
    #[must_use]
    pub fn site_base(&self) -> &Url {
        &self.site_base
    }

    /// Build the product for the page at `page_url`.
    pub fn normalize(&self, tree: &Value, page_url: &str) -> Result<Product> {
        let detail = ProductDetail::deserialize(product_detail_node(tree)?)
            .map_err(|e| ExtractError::MalformedProduct(format!("product record: {e}")))?;
        let entries = variant_list_node(tree)?;

        let variants = if entries.is_empty() {
            vec![Variant::new(
                detail.full_name.clone(),
                clamp_stock(detail.current_stock),
                detail.stock_code.clone(),
                detail.price.formatted.with_tax.clone(),
                page_url,
            )]
        } else {
            entries
                .iter()
                .enumerate()
                .map(|(idx, entry)| self.variant_from_entry(idx, entry))
                .collect::<Result<Vec<_>>>()?
        };

        tracing::debug!(
            "Normalized {} ({}) with {} variant(s)",
            detail.full_name,
            detail.stock_code,
            variants.len()
        );

        Product::new(
            detail.full_name,
            detail.stock_code,
            variants,
            page_url,
            detail.barcode,
            detail.image,
        )
        .map_err(|e| ExtractError::MalformedProduct(e.to_string()))
    }

    /// Append `slug` to the site base as path text. Empty and dot segments
    /// are dropped, so the result always stays under the base.
    fn variant_url(&self, slug: &str) -> Option<Url> {
        let segments: Vec<&str> = slug
            .split('/')
            .filter(|segment| !matches!(*segment, "" | "." | ".."))
            .collect();
        if segments.is_empty() {
            return None;
        }

        let mut url = self.site_base.clone();
        url.path_segments_mut().ok()?.pop_if_empty().extend(segments);
        Some(url)
    }

    fn variant_from_entry(&self, idx: usize, entry: &Value) -> Result<Variant> {
        let entry = VariantEntry::deserialize(entry)
            .map_err(|e| ExtractError::MalformedProduct(format!("variant {idx}: {e}")))?;

        let url = self.variant_url(&entry.slug).ok_or_else(|| {
            ExtractError::MalformedProduct(format!(
                "variant {idx} has no usable slug {:?}",
                entry.slug
            ))
        })?;

        Ok(Variant::new(
            entry.product_name,
            clamp_stock(entry.current_stock),
            entry.stock_code,
            entry.price.formatted.with_tax,
            url.as_str(),
        ))
    }
}
