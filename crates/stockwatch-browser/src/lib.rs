//! Browser automation for challenge-protected retail pages.
//!
//! Provides scoped headless browser sessions with randomized identities,
//! automation masking and best-effort consent/challenge dismissal.

pub mod actions;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod stealth;

pub use actions::{cookie_header, extract_domain, BrowserActions, SessionCookie};
pub use engine::BrowserSession;
pub use error::{BrowserError, Result};
pub use fingerprint::{BrowserProfile, FingerprintConfig, BROWSER_PROFILES};
