//! Payload decoding.
//!
//! The product state is embedded as a JavaScript string literal holding a
//! React flight row, e.g.
//!
//! ```text
//! self.__next_f.push([1,"2a:[\"$\",\"$L2b\",null,{ ...payload... }]\n"])
//! ```
//!
//! Decoding unescapes the literal in place and then cuts the fixed framing
//! off both ends. The steps run in a fixed order: the nested-quote rewrite
//! must see the raw escaping before the plain unescape consumes it.

use crate::error::{ExtractError, Result};
use serde_json::Value;

/// Characters of wrapper text before the payload object, counted after
/// unescaping: `self.__next_f.push([1,"2a:["$","$L2b",null,`.
pub const PAYLOAD_PREFIX_LEN: usize = 43;

/// Characters of wrapper text after the payload object: `]\n"])`.
pub const PAYLOAD_SUFFIX_LEN: usize = 6;

/// Steps 1-3: drop newlines, turn nested `\\\"` quotes into `'`, then
/// unescape the remaining `\"`.
#[must_use]
pub fn unescape(raw: &str) -> String {
    raw.replace('\n', "")
        .replace(r#"\\\""#, "'")
        .replace(r#"\""#, "\"")
}

/// Step 4: remove the framing around the payload object.
///
/// Offsets are in characters, not bytes. The remaining text must still be
/// delimited by `{` and `}`; anything else means the page template moved
/// and the offsets no longer line up.
pub fn strip_framing(text: &str) -> Result<&str> {
    let char_count = text.chars().count();
    if char_count < PAYLOAD_PREFIX_LEN + PAYLOAD_SUFFIX_LEN + 2 {
        return Err(ExtractError::Decode(format!(
            "payload too short to hold its framing ({char_count} chars)"
        )));
    }

    let start = text
        .char_indices()
        .nth(PAYLOAD_PREFIX_LEN)
        .map(|(idx, _)| idx)
        .ok_or_else(|| ExtractError::Decode("payload prefix out of range".to_string()))?;
    let end = text
        .char_indices()
        .nth_back(PAYLOAD_SUFFIX_LEN - 1)
        .map(|(idx, _)| idx)
        .ok_or_else(|| ExtractError::Decode("payload suffix out of range".to_string()))?;

    let body = &text[start..end];
    if !body.starts_with('{') || !body.ends_with('}') {
        let head: String = body.chars().take(12).collect();
        return Err(ExtractError::Decode(format!(
            "framing offsets do not land on object delimiters (body starts with {head:?})"
        )));
    }

    Ok(body)
}

/// Run the full transform and parse the result.
pub fn decode_payload(raw: &str) -> Result<Value> {
    let unescaped = unescape(raw);
    let body = strip_framing(&unescaped)?;

    let tree: Value = serde_json::from_str(body)
        .map_err(|e| ExtractError::Decode(format!("invalid JSON payload: {e}")))?;

    tracing::debug!("Decoded payload ({} bytes)", body.len());
    Ok(tree)
}
