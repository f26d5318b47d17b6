//! Challenge-resilient page fetching.
//!
//! Both strategies start with the same browser pass: launch a stealth
//! session with the attempt's identity, navigate, let the page settle,
//! simulate a little human input and clear consent/challenge dialogs.
//! [`BrowserFetcher`] then reads the rendered DOM; [`CookieReplayFetcher`]
//! keeps only the cookie jar and repeats the request over plain HTTP.

use crate::error::{ExtractError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE, USER_AGENT};
use reqwest::{Client, ClientBuilder};
use std::sync::Arc;
use std::time::Duration;
use stockwatch_browser::{
    cookie_header, extract_domain, BrowserActions, BrowserSession, FingerprintConfig,
    SessionCookie,
};
use stockwatch_core::{AppConfig, BrowserConfig, FetchStrategy, FetcherConfig, StockwatchError};

/// Turns a URL into page markup.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` presenting `identity` to the site.
    async fn fetch(&self, url: &str, identity: &FingerprintConfig) -> Result<String>;
}

/// Build the fetcher selected by `config.fetcher.strategy`.
pub fn fetcher_from_config(
    config: &AppConfig,
) -> std::result::Result<Arc<dyn PageFetcher>, StockwatchError> {
    let fetcher: Arc<dyn PageFetcher> = match config.fetcher.strategy {
        FetchStrategy::Browser => Arc::new(BrowserFetcher::new(
            config.browser.clone(),
            config.fetcher.clone(),
        )),
        FetchStrategy::CookieReplay => Arc::new(CookieReplayFetcher::new(
            config.browser.clone(),
            config.fetcher.clone(),
        )?),
    };
    Ok(fetcher)
}

/// Launch a session and run the challenge pass. The session is closed
/// before returning an error.
async fn open_cleared_session(
    browser: &BrowserConfig,
    fetcher: &FetcherConfig,
    url: &str,
    identity: &FingerprintConfig,
) -> Result<BrowserSession> {
    let session = BrowserSession::launch(browser, identity.clone(), &fetcher.accept_language)
        .await
        .map_err(|e| ExtractError::fetch(url, e))?;

    match clear_challenges(&session, fetcher, url).await {
        Ok(()) => Ok(session),
        Err(e) => {
            release(session, url).await;
            Err(e)
        }
    }
}

async fn clear_challenges(
    session: &BrowserSession,
    fetcher: &FetcherConfig,
    url: &str,
) -> Result<()> {
    session
        .navigate(url)
        .await
        .map_err(|e| ExtractError::fetch(url, e))?;

    tokio::time::sleep(Duration::from_millis(fetcher.settle_delay_ms)).await;

    session
        .simulate_human()
        .await
        .map_err(|e| ExtractError::fetch(url, e))?;

    if session.dismiss_challenge().await {
        tracing::debug!("Challenge widget clicked on {}", url);
    }
    if !session
        .dismiss_consent(&fetcher.consent_selectors, fetcher.consent_timeout_ms)
        .await
    {
        tracing::debug!("No consent dialog dismissed on {}", url);
    }

    Ok(())
}

async fn release(session: BrowserSession, url: &str) {
    if let Err(e) = session.close().await {
        tracing::warn!("Closing browser for {} failed: {}", url, e);
    }
}

/// Reads the rendered DOM straight out of the browser.
pub struct BrowserFetcher {
    browser: BrowserConfig,
    fetcher: FetcherConfig,
}

impl BrowserFetcher {
    /// Fetcher that launches a browser per call with `browser` settings and
    /// clears dialogs per `fetcher`.
    #[must_use]
    pub fn new(browser: BrowserConfig, fetcher: FetcherConfig) -> Self {
        Self { browser, fetcher }
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str, identity: &FingerprintConfig) -> Result<String> {
        let session = open_cleared_session(&self.browser, &self.fetcher, url, identity).await?;
        let content = session
            .content()
            .await
            .map_err(|e| ExtractError::fetch(url, e));
        release(session, url).await;

        let content = content?;
        tracing::debug!("Rendered {} ({} bytes)", url, content.len());
        Ok(content)
    }
}

/// Harvests session cookies with the browser, then replays the request
/// over plain HTTP with a matching navigation header set.
pub struct CookieReplayFetcher {
    browser: BrowserConfig,
    fetcher: FetcherConfig,
    client: Client,
}

impl CookieReplayFetcher {
    /// Fetcher that harvests cookies with `browser` settings and replays
    /// over HTTP with the timeout and headers from `fetcher`.
    pub fn new(
        browser: BrowserConfig,
        fetcher: FetcherConfig,
    ) -> std::result::Result<Self, StockwatchError> {
        let client = client_builder(&fetcher).build().map_err(|e| {
            StockwatchError::Internal(format!("failed to create HTTP client: {e}"))
        })?;

        Ok(Self {
            browser,
            fetcher,
            client,
        })
    }

    async fn harvest_cookies(
        &self,
        url: &str,
        identity: &FingerprintConfig,
    ) -> Result<Vec<SessionCookie>> {
        let session = open_cleared_session(&self.browser, &self.fetcher, url, identity).await?;
        let cookies = session
            .cookies()
            .await
            .map_err(|e| ExtractError::fetch(url, e));
        release(session, url).await;
        cookies
    }
}

#[async_trait]
impl PageFetcher for CookieReplayFetcher {
    async fn fetch(&self, url: &str, identity: &FingerprintConfig) -> Result<String> {
        let cookies = self.harvest_cookies(url, identity).await?;
        let domain = extract_domain(url).map_err(|e| ExtractError::fetch(url, e))?;
        tracing::debug!("Harvested {} cookies for {}", cookies.len(), domain);

        replay_request(
            &self.client,
            url,
            identity,
            &self.fetcher.accept_language,
            &cookies,
        )
        .await
    }
}

/// HTTP client settings shared by every replayed request.
fn client_builder(fetcher: &FetcherConfig) -> ClientBuilder {
    Client::builder().timeout(Duration::from_secs(fetcher.http_timeout_secs))
}

/// GET `url` as the browser described by `identity`, carrying `cookies`.
/// Transport errors, timeouts and non-success statuses are fetch failures.
async fn replay_request(
    client: &Client,
    url: &str,
    identity: &FingerprintConfig,
    accept_language: &str,
    cookies: &[SessionCookie],
) -> Result<String> {
    let headers = navigation_headers(identity, accept_language, cookies)
        .map_err(|e| ExtractError::fetch(url, e))?;

    let response = client
        .get(url)
        .headers(headers)
        .send()
        .await
        .map_err(|e| ExtractError::fetch(url, e))?
        .error_for_status()
        .map_err(|e| ExtractError::fetch(url, e))?;

    let body = response
        .text()
        .await
        .map_err(|e| ExtractError::fetch(url, e))?;

    tracing::debug!("Replayed {} ({} bytes)", url, body.len());
    Ok(body)
}

/// Headers of a top-level navigation from a Windows Chromium browser
/// matching `identity`, carrying the harvested cookies.
pub fn navigation_headers(
    identity: &FingerprintConfig,
    accept_language: &str,
    cookies: &[SessionCookie],
) -> std::result::Result<HeaderMap, reqwest::header::InvalidHeaderValue> {
    let profile = identity.profile;
    let fixed: [(&'static str, &str); 18] = [
        (
            "accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
        ),
        ("accept-language", accept_language),
        ("cache-control", "max-age=0"),
        ("priority", "u=0, i"),
        ("sec-ch-ua", profile.sec_ch_ua),
        ("sec-ch-ua-arch", "\"x86\""),
        ("sec-ch-ua-bitness", "\"64\""),
        (
            "sec-ch-ua-full-version-list",
            profile.sec_ch_ua_full_version_list,
        ),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-model", "\"\""),
        ("sec-ch-ua-platform", "\"Windows\""),
        ("sec-ch-ua-platform-version", "\"15.0.0\""),
        ("sec-fetch-dest", "document"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-site", "same-origin"),
        ("sec-fetch-user", "?1"),
        ("sec-gpc", "1"),
        ("upgrade-insecure-requests", "1"),
    ];

    let mut headers = HeaderMap::with_capacity(fixed.len() + 2);
    for (name, value) in fixed {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_str(value)?);
    }
    headers.insert(USER_AGENT, HeaderValue::from_static(profile.user_agent));
    if !cookies.is_empty() {
        headers.insert(COOKIE, HeaderValue::from_str(&cookie_header(cookies))?);
    }

    Ok(headers)
}
