use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use stockwatch_browser::{FingerprintConfig, BROWSER_PROFILES};
use stockwatch_core::{RetryPolicy, SiteConfig};
use stockwatch_scraper::{
    ErrorKind, ExtractError, ExtractionObserver, ExtractionPipeline, PageFetcher, Result,
};

const SINGLE_VARIANT: &str = include_str!("fixtures/single_variant.html");
const MULTI_VARIANT: &str = include_str!("fixtures/multi_variant.html");
const NO_PAYLOAD: &str = include_str!("fixtures/no_payload.html");

const AQUA_URL: &str = "https://shop.example/p/aqua";
const SAUVAGE_URL: &str = "https://www.thefragranceshop.co.uk/sauvage";

#[derive(Debug, Clone)]
enum Outcome {
    Page(String),
    Unreachable,
}

fn page(html: &str) -> Outcome {
    Outcome::Page(html.to_string())
}

/// Serves a fixed sequence of outcomes; the last one repeats.
struct ScriptedFetcher {
    script: Vec<Outcome>,
    calls: AtomicUsize,
    user_agents: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn new(script: Vec<Outcome>) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            user_agents: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, identity: &FingerprintConfig) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.user_agents
            .lock()
            .expect("lock user agents")
            .push(identity.user_agent().to_string());

        let outcome = self
            .script
            .get(call)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or(Outcome::Unreachable);

        match outcome {
            Outcome::Page(html) => Ok(html),
            Outcome::Unreachable => Err(ExtractError::fetch(url, "connection reset by peer")),
        }
    }
}

/// Serves a fixture per URL; unknown URLs are unreachable.
struct RoutedFetcher {
    pages: HashMap<&'static str, &'static str>,
}

#[async_trait]
impl PageFetcher for RoutedFetcher {
    async fn fetch(&self, url: &str, _identity: &FingerprintConfig) -> Result<String> {
        self.pages
            .get(url)
            .map(|html| (*html).to_string())
            .ok_or_else(|| ExtractError::fetch(url, "no route to host"))
    }
}

#[derive(Default)]
struct RecordingObserver {
    attempts: Mutex<Vec<(u32, String, ErrorKind)>>,
    failures: Mutex<Vec<String>>,
}

impl RecordingObserver {
    fn attempts(&self) -> Vec<(u32, String, ErrorKind)> {
        self.attempts.lock().expect("lock attempts").clone()
    }

    fn failures(&self) -> Vec<String> {
        self.failures.lock().expect("lock failures").clone()
    }
}

impl ExtractionObserver for RecordingObserver {
    fn attempt_failed(&self, attempt: u32, url: &str, error: &ExtractError) {
        self.attempts
            .lock()
            .expect("lock attempts")
            .push((attempt, url.to_string(), error.kind()));
    }

    fn extraction_failed(&self, url: &str) {
        self.failures
            .lock()
            .expect("lock failures")
            .push(url.to_string());
    }
}

/// Helper to build a pipeline over `fetcher` against the default site
fn pipeline_with(
    fetcher: Arc<dyn PageFetcher>,
    observer: Arc<RecordingObserver>,
) -> ExtractionPipeline {
    ExtractionPipeline::new(fetcher, &SiteConfig::default())
        .expect("create pipeline")
        .with_observer(observer)
}

#[tokio::test]
async fn test_single_variant_page() {
    let fetcher = ScriptedFetcher::new(vec![page(SINGLE_VARIANT)]);
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = pipeline_with(fetcher.clone(), observer.clone());

    let product = pipeline.extract(AQUA_URL).await.expect("extract product");

    assert_eq!(product.name(), "Aqua");
    assert_eq!(product.code(), "AQ1");
    assert_eq!(product.ean(), "123");
    assert_eq!(product.image_url(), "http://x/img.png");
    assert_eq!(product.url(), AQUA_URL);

    let variants = product.variants();
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].name(), "Aqua");
    assert_eq!(variants[0].code(), "AQ1");
    assert_eq!(variants[0].stock_level(), 5);
    assert_eq!(variants[0].formatted_price(), "£10.00");
    assert_eq!(variants[0].url(), AQUA_URL);
    assert!(variants[0].in_stock());

    assert_eq!(fetcher.calls(), 1);
    assert!(observer.attempts().is_empty());
    assert!(observer.failures().is_empty());
}

#[tokio::test]
async fn test_multi_variant_page() {
    let fetcher = ScriptedFetcher::new(vec![page(MULTI_VARIANT)]);
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = pipeline_with(fetcher, observer);

    let product = pipeline.extract(SAUVAGE_URL).await.expect("extract product");

    assert_eq!(product.name(), "Sauvage Eau de Toilette");
    assert_eq!(product.code(), "SAU-GRP");
    assert_eq!(product.ean(), "3348901250146");
    assert_eq!(product.url(), SAUVAGE_URL);
    assert!(product.any_in_stock());
    assert_eq!(product.total_stock(), 12);

    let variants = product.variants();
    assert_eq!(variants.len(), 2);

    assert_eq!(variants[0].name(), "Sauvage 60ml");
    assert_eq!(variants[0].code(), "SAU60");
    assert_eq!(variants[0].formatted_price(), "£72.00");
    assert_eq!(
        variants[0].url(),
        "https://www.thefragranceshop.co.uk/sauvage-60ml"
    );
    assert!(variants[0].in_stock());

    assert_eq!(variants[1].code(), "SAU100");
    assert_eq!(variants[1].formatted_price(), "£98.00");
    assert_eq!(
        variants[1].url(),
        "https://www.thefragranceshop.co.uk/sauvage-100ml"
    );
    assert!(!variants[1].in_stock());
}

#[tokio::test]
async fn test_missing_payload_exhausts_budget() {
    let fetcher = ScriptedFetcher::new(vec![page(NO_PAYLOAD)]);
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = pipeline_with(fetcher.clone(), observer.clone());

    let failure = pipeline.extract(AQUA_URL).await.expect_err("no payload");

    assert_eq!(failure.url, AQUA_URL);
    assert_eq!(failure.attempts, 3);
    assert!(matches!(
        failure.last_error,
        Some(ExtractError::DataNotFound { ref marker }) if marker == "currentStock"
    ));
    assert_eq!(
        failure.user_message(),
        format!("failed to fetch product data from {AQUA_URL}; verify the URL is correct")
    );

    assert_eq!(fetcher.calls(), 3);
    let attempts = observer.attempts();
    assert_eq!(attempts.len(), 3);
    assert!(attempts
        .iter()
        .all(|(_, _, kind)| *kind == ErrorKind::DataNotFound));
    assert_eq!(observer.failures(), vec![AQUA_URL.to_string()]);
}

#[tokio::test]
async fn test_fetch_failures_reported_per_attempt() {
    let fetcher = ScriptedFetcher::new(vec![Outcome::Unreachable]);
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = pipeline_with(fetcher, observer.clone());

    let failure = pipeline.extract(AQUA_URL).await.expect_err("unreachable");
    assert_eq!(failure.attempts, 3);

    let attempts = observer.attempts();
    let numbers: Vec<u32> = attempts.iter().map(|(n, _, _)| *n).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert!(attempts
        .iter()
        .all(|(_, url, kind)| url == AQUA_URL && *kind == ErrorKind::FetchFailure));

    // Terminal report comes once, after the attempts
    assert_eq!(observer.failures().len(), 1);
}

#[tokio::test]
async fn test_recovers_on_second_attempt() {
    let fetcher = ScriptedFetcher::new(vec![Outcome::Unreachable, page(SINGLE_VARIANT)]);
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = pipeline_with(fetcher.clone(), observer.clone());

    let product = pipeline.extract(AQUA_URL).await.expect("second attempt");
    assert_eq!(product.code(), "AQ1");

    assert_eq!(fetcher.calls(), 2);
    assert_eq!(
        observer.attempts(),
        vec![(1, AQUA_URL.to_string(), ErrorKind::FetchFailure)]
    );
    assert!(observer.failures().is_empty());
}

#[tokio::test]
async fn test_uniform_policy_retries_decode_failures() {
    let broken = r"<html><body><script>var currentStock = 1;</script></body></html>";
    let fetcher = ScriptedFetcher::new(vec![page(broken)]);
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = pipeline_with(fetcher.clone(), observer.clone());

    let failure = pipeline.extract(AQUA_URL).await.expect_err("decode failure");
    assert_eq!(failure.attempts, 3);
    assert!(matches!(failure.last_error, Some(ExtractError::Decode(_))));
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn test_transient_only_stops_on_permanent_errors() {
    let broken = r"<html><body><script>var currentStock = 1;</script></body></html>";
    let fetcher = ScriptedFetcher::new(vec![page(broken)]);
    let observer = Arc::new(RecordingObserver::default());
    let pipeline =
        pipeline_with(fetcher.clone(), observer.clone()).with_policy(RetryPolicy::TransientOnly);

    let failure = pipeline.extract(AQUA_URL).await.expect_err("decode failure");
    assert_eq!(failure.attempts, 1);
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(observer.failures().len(), 1);

    let malformed = SINGLE_VARIANT.replace("stockCode", "sku");
    let fetcher = ScriptedFetcher::new(vec![page(&malformed)]);
    let pipeline = pipeline_with(fetcher.clone(), Arc::new(RecordingObserver::default()))
        .with_policy(RetryPolicy::TransientOnly);

    let failure = pipeline.extract(AQUA_URL).await.expect_err("malformed");
    assert!(matches!(
        failure.last_error,
        Some(ExtractError::MalformedProduct(_))
    ));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_transient_only_still_retries_fetch_failures() {
    let fetcher = ScriptedFetcher::new(vec![Outcome::Unreachable]);
    let pipeline = pipeline_with(fetcher.clone(), Arc::new(RecordingObserver::default()))
        .with_policy(RetryPolicy::TransientOnly);

    let failure = pipeline.extract(AQUA_URL).await.expect_err("unreachable");
    assert_eq!(failure.attempts, 3);
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn test_retry_budget_override() {
    let fetcher = ScriptedFetcher::new(vec![Outcome::Unreachable]);
    let pipeline = pipeline_with(fetcher.clone(), Arc::new(RecordingObserver::default()));

    let failure = pipeline
        .extract_with_retries(AQUA_URL, Some(5))
        .await
        .expect_err("unreachable");
    assert_eq!(failure.attempts, 5);
    assert_eq!(fetcher.calls(), 5);

    // A zero budget still makes one attempt
    let failure = pipeline
        .extract_with_retries(AQUA_URL, Some(0))
        .await
        .expect_err("unreachable");
    assert_eq!(failure.attempts, 1);
    assert_eq!(fetcher.calls(), 6);

    let fetcher = ScriptedFetcher::new(vec![Outcome::Unreachable]);
    let pipeline =
        pipeline_with(fetcher.clone(), Arc::new(RecordingObserver::default())).with_max_retries(2);
    let failure = pipeline.extract(AQUA_URL).await.expect_err("unreachable");
    assert_eq!(failure.attempts, 2);
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_invalid_url_fails_without_fetching() {
    let fetcher = ScriptedFetcher::new(vec![page(SINGLE_VARIANT)]);
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = pipeline_with(fetcher.clone(), observer.clone());

    let failure = pipeline.extract("not a url").await.expect_err("invalid url");

    assert_eq!(failure.url, "not a url");
    assert_eq!(failure.attempts, 0);
    assert!(matches!(failure.last_error, Some(ExtractError::Fetch { .. })));
    assert_eq!(fetcher.calls(), 0);
    assert!(observer.attempts().is_empty());
    assert_eq!(observer.failures(), vec!["not a url".to_string()]);
}

#[tokio::test]
async fn test_identity_drawn_per_attempt() {
    let fetcher = ScriptedFetcher::new(vec![Outcome::Unreachable]);
    let pipeline = pipeline_with(fetcher.clone(), Arc::new(RecordingObserver::default()));

    let _ = pipeline.extract(AQUA_URL).await;

    let agents = fetcher.user_agents.lock().expect("lock user agents").clone();
    assert_eq!(agents.len(), 3);
    for agent in &agents {
        assert!(BROWSER_PROFILES
            .iter()
            .any(|profile| profile.user_agent == agent));
    }
}

#[tokio::test]
async fn test_extract_many() {
    let fetcher = Arc::new(RoutedFetcher {
        pages: HashMap::from([(AQUA_URL, SINGLE_VARIANT), (SAUVAGE_URL, MULTI_VARIANT)]),
    });
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = pipeline_with(fetcher, observer.clone()).with_max_retries(1);

    let missing = "https://shop.example/p/discontinued";
    let urls = vec![
        AQUA_URL.to_string(),
        missing.to_string(),
        SAUVAGE_URL.to_string(),
    ];

    let results = pipeline.extract_many(&urls, 2).await;

    assert_eq!(results.len(), 3);
    let by_url: HashMap<_, _> = results.into_iter().collect();

    assert_eq!(by_url[AQUA_URL].as_ref().expect("aqua").code(), "AQ1");
    assert_eq!(
        by_url[SAUVAGE_URL].as_ref().expect("sauvage").variants().len(),
        2
    );
    let failure = by_url[missing].as_ref().expect_err("missing page");
    assert_eq!(failure.attempts, 1);

    assert_eq!(observer.failures(), vec![missing.to_string()]);
}
