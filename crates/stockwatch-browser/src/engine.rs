use crate::actions::{BrowserActions, SessionCookie};
use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use crate::stealth::{STEALTH_ARGS, STEALTH_SCRIPTS};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetTimezoneOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType,
};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use rand::Rng;
use std::time::Duration;
use stockwatch_core::BrowserConfig as BrowserSettings;
use tokio::task::JoinHandle;

const SELECTOR_POLL_MS: u64 = 250;

/// Challenge widgets worth a best-effort click (Cloudflare Turnstile and
/// the managed-challenge checkbox).
pub const CHALLENGE_SELECTORS: &[&str] = &[
    "iframe[src*='challenges.cloudflare.com']",
    "#challenge-stage input[type='checkbox']",
    "#turnstile-wrapper iframe",
];

/// One browser process with a single tab, owned by one fetch attempt.
///
/// Call [`BrowserSession::close`] when done. If the session is dropped
/// instead (error unwinding, cancelled future) the event-handler task is
/// aborted and the child process is killed along with the `Browser`.
pub struct BrowserSession {
    page: Page,
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    fingerprint: FingerprintConfig,
}

impl BrowserSession {
    /// Launch a stealth browser with the given identity and open a blank tab.
    pub async fn launch(
        settings: &BrowserSettings,
        fingerprint: FingerprintConfig,
        accept_language: &str,
    ) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .request_timeout(Duration::from_secs(settings.request_timeout_secs))
            .arg(format!("--user-agent={}", fingerprint.user_agent()));

        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        for arg in STEALTH_ARGS {
            builder = builder.arg(*arg);
        }
        for arg in &settings.extra_args {
            builder = builder.arg(arg.clone());
        }

        let config = builder.build().map_err(BrowserError::ChromiumError)?;

        tracing::info!(
            "Launching browser (headless={}, ua={})",
            settings.headless,
            fingerprint.user_agent()
        );
        let (browser, mut handler) = Browser::launch(config).await?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(e.into());
            }
        };

        let session = Self {
            page,
            browser: Some(browser),
            handler: Some(handler),
            fingerprint,
        };
        session.apply_identity(accept_language).await?;

        Ok(session)
    }

    async fn apply_identity(&self, accept_language: &str) -> Result<()> {
        let ua_override = SetUserAgentOverrideParams::builder()
            .user_agent(self.fingerprint.user_agent())
            .accept_language(accept_language)
            .platform("Win32")
            .build()
            .map_err(BrowserError::ChromiumError)?;
        self.page.execute(ua_override).await?;

        self.page
            .execute(SetDeviceMetricsOverrideParams::new(
                i64::from(self.fingerprint.viewport_width),
                i64::from(self.fingerprint.viewport_height),
                1.0,
                false,
            ))
            .await?;

        self.page
            .execute(SetTimezoneOverrideParams::new(
                self.fingerprint.timezone.clone(),
            ))
            .await?;

        for script in STEALTH_SCRIPTS {
            self.page
                .execute(AddScriptToEvaluateOnNewDocumentParams::new(*script))
                .await?;
        }

        Ok(())
    }

    /// Move the mouse around the viewport and scroll a little, pausing
    /// between steps like a person skimming the page.
    pub async fn simulate_human(&self) -> Result<()> {
        let (moves, scroll) = {
            let mut rng = rand::thread_rng();
            let width = f64::from(self.fingerprint.viewport_width);
            let height = f64::from(self.fingerprint.viewport_height);
            let count = rng.gen_range(3..6);
            let moves: Vec<(f64, f64, u64)> = (0..count)
                .map(|_| {
                    (
                        rng.gen_range(0.0..width),
                        rng.gen_range(0.0..height),
                        rng.gen_range(80..250),
                    )
                })
                .collect();
            (moves, rng.gen_range(200..700))
        };

        for (x, y, pause_ms) in moves {
            self.page
                .execute(DispatchMouseEventParams::new(
                    DispatchMouseEventType::MouseMoved,
                    x,
                    y,
                ))
                .await?;
            tokio::time::sleep(Duration::from_millis(pause_ms)).await;
        }

        self.page
            .evaluate(format!("window.scrollBy(0, {scroll})"))
            .await?;

        Ok(())
    }

    /// Click the first consent button that shows up. Best effort: returns
    /// whether anything was clicked and never fails the fetch.
    pub async fn dismiss_consent(&self, selectors: &[String], timeout_ms: u64) -> bool {
        for selector in selectors {
            if self.wait_for_selector(selector, timeout_ms).await.is_err() {
                tracing::debug!("Consent button {} not present", selector);
                continue;
            }
            match self.click(selector).await {
                Ok(()) => {
                    tracing::debug!("Dismissed consent dialog via {}", selector);
                    return true;
                }
                Err(e) => tracing::debug!("Consent click on {} failed: {}", selector, e),
            }
        }
        false
    }

    /// Click a visible challenge widget, if any, and give it time to clear.
    pub async fn dismiss_challenge(&self) -> bool {
        for selector in CHALLENGE_SELECTORS {
            if self.page.find_element(*selector).await.is_err() {
                continue;
            }
            match self.click(selector).await {
                Ok(()) => {
                    tracing::debug!("Clicked challenge widget {}", selector);
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    return true;
                }
                Err(e) => tracing::debug!("Challenge click on {} failed: {}", selector, e),
            }
        }
        false
    }

    /// Close the browser and wait for the process to exit.
    pub async fn close(mut self) -> Result<()> {
        let mut closed = Ok(());
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                closed = Err(e.into());
            }
            if let Err(e) = browser.wait().await {
                tracing::debug!("Waiting for browser exit failed: {}", e);
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        closed
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        if self.browser.is_some() {
            tracing::warn!("Browser session dropped without close, killing browser process");
        }
    }
}

#[async_trait::async_trait]
impl BrowserActions for BrowserSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationError(format!("{url}: {e}")))?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
        element.click().await?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let poll = async {
            loop {
                if self.page.find_element(selector).await.is_ok() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(SELECTOR_POLL_MS)).await;
            }
        };

        tokio::time::timeout(Duration::from_millis(timeout_ms), poll)
            .await
            .map_err(|_| BrowserError::Timeout(format!("waiting for {selector}")))
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn cookies(&self) -> Result<Vec<SessionCookie>> {
        let cookies = self.page.get_cookies().await?;
        Ok(cookies
            .into_iter()
            .map(|c| SessionCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
            })
            .collect())
    }
}
