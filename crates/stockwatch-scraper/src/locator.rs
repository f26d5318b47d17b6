//! Locating the embedded product-state script.

use crate::error::{ExtractError, Result};
use scraper::{Html, Selector};
use std::sync::OnceLock;

fn script_selector() -> &'static Selector {
    static SCRIPT: OnceLock<Selector> = OnceLock::new();
    SCRIPT.get_or_init(|| Selector::parse("script").expect("valid selector"))
}

/// Return the text of the first `<script>` element, in document order,
/// whose content contains `marker`.
pub fn locate_payload(html: &str, marker: &str) -> Result<String> {
    let document = Html::parse_document(html);

    document
        .select(script_selector())
        .map(|script| script.text().collect::<String>())
        .find(|text| text.contains(marker))
        .ok_or_else(|| ExtractError::DataNotFound {
            marker: marker.to_string(),
        })
}
