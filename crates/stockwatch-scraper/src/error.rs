//! Error taxonomy for a single extraction attempt and for a whole extraction.

use std::fmt;
use thiserror::Error;

/// Which stage of an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network, browser-launch or challenge-dismissal failure
    FetchFailure,
    /// No script carried the product-state marker
    DataNotFound,
    /// The located payload did not decode to a JSON tree
    DecodeFailure,
    /// The decoded tree lacked an expected field
    MalformedProduct,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FetchFailure => "fetch_failure",
            Self::DataNotFound => "data_not_found",
            Self::DecodeFailure => "decode_failure",
            Self::MalformedProduct => "malformed_product",
        };
        f.write_str(name)
    }
}

/// Failure of one extraction attempt.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The page could not be retrieved
    #[error("fetch failed for {url}: {reason}")]
    Fetch {
        /// Requested URL
        url: String,
        /// Underlying cause
        reason: String,
    },

    /// No script carried the marker
    #[error("no script containing '{marker}' found")]
    DataNotFound {
        /// Marker that was searched for
        marker: String,
    },

    /// Payload transform or JSON parse failed
    #[error("payload decode failed: {0}")]
    Decode(String),

    /// Tree shape did not match the product model
    #[error("malformed product data: {0}")]
    MalformedProduct(String),
}

impl ExtractError {
    /// Wrap any displayable error as a fetch failure for `url`.
    pub fn fetch(url: &str, reason: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Stage that produced this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch { .. } => ErrorKind::FetchFailure,
            Self::DataNotFound { .. } => ErrorKind::DataNotFound,
            Self::Decode(_) => ErrorKind::DecodeFailure,
            Self::MalformedProduct(_) => ErrorKind::MalformedProduct,
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Fetch failures and missing payloads vary between renders; a payload
    /// that decodes wrongly or lacks fields points at a page layout change.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::FetchFailure | ErrorKind::DataNotFound
        )
    }
}

/// Result type for a single attempt stage.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Terminal failure of an extraction once the attempt budget is spent.
#[derive(Debug, Error)]
#[error("failed to fetch product data from {url}; verify the URL is correct")]
pub struct ExtractionFailure {
    /// URL the caller asked for
    pub url: String,
    /// Attempts made before giving up
    pub attempts: u32,
    /// Error from the final attempt
    #[source]
    pub last_error: Option<ExtractError>,
}

impl ExtractionFailure {
    /// Message for a rendering collaborator to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}
