use rand::seq::SliceRandom;
use rand::Rng;

/// A desktop browser identity: the user agent plus the client-hint headers
/// a real copy of that browser sends alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserProfile {
    pub user_agent: &'static str,
    pub sec_ch_ua: &'static str,
    pub sec_ch_ua_full_version_list: &'static str,
}

/// Windows desktop Chromium-family browsers.
pub const BROWSER_PROFILES: &[BrowserProfile] = &[
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
        sec_ch_ua: r#""Chromium";v="122", "Not(A:Brand";v="24", "Google Chrome";v="122""#,
        sec_ch_ua_full_version_list: r#""Chromium";v="122.0.6261.95", "Not(A:Brand";v="24.0.0.0", "Google Chrome";v="122.0.6261.95""#,
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36 Edg/121.0.0.0",
        sec_ch_ua: r#""Not A(Brand";v="99", "Microsoft Edge";v="121", "Chromium";v="121""#,
        sec_ch_ua_full_version_list: r#""Not A(Brand";v="99.0.0.0", "Microsoft Edge";v="121.0.2277.128", "Chromium";v="121.0.6167.185""#,
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36 OPR/108.0.0.0",
        sec_ch_ua: r#""Chromium";v="122", "Not(A:Brand";v="24", "Opera";v="108""#,
        sec_ch_ua_full_version_list: r#""Chromium";v="122.0.6261.95", "Not(A:Brand";v="24.0.0.0", "Opera";v="108.0.5067.29""#,
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36 Vivaldi/6.5.3206.63",
        sec_ch_ua: r#""Not A(Brand";v="99", "Chromium";v="121""#,
        sec_ch_ua_full_version_list: r#""Not A(Brand";v="99.0.0.0", "Chromium";v="121.0.6167.185""#,
    },
];

/// Fingerprint configuration for anti-detection
#[derive(Debug, Clone)]
pub struct FingerprintConfig {
    pub profile: BrowserProfile,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub timezone: String,
}

impl FingerprintConfig {
    /// Generate a randomized fingerprint configuration
    pub fn randomized() -> Self {
        let mut rng = rand::thread_rng();

        // Common desktop viewport sizes
        let viewports = [(1920, 1080), (1366, 768), (1536, 864), (1440, 900)];

        let vp_idx = rng.gen_range(0..viewports.len());
        let (width, height) = viewports[vp_idx];

        let profile = *BROWSER_PROFILES
            .choose(&mut rng)
            .unwrap_or(&BROWSER_PROFILES[0]);

        Self {
            profile,
            viewport_width: width,
            viewport_height: height,
            timezone: "Europe/London".to_string(),
        }
    }

    pub fn user_agent(&self) -> &'static str {
        self.profile.user_agent
    }
}
