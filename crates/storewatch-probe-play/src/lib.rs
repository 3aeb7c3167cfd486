// # Google Play Store Probe
//
// This crate provides a Google Play implementation of `StoreProbe` for
// storewatch.
//
// ## Purpose
//
// Answers one question per call: is this package listed on Google Play
// right now, and if so, when was it released or last updated.
//
// ## Architecture
//
// Fetches the public details page for the package. A listed app answers
// 200; a removed or unknown package answers 404.
//
// The page embeds its data as `AF_initDataCallback({key: 'ds:N', ...,
// data: [...], sideChannel: {}});` script blocks. The app details live in
// dataset `ds:5`:
//
// | field      | path in `ds:5`          | form                  |
// |------------|-------------------------|-----------------------|
// | `released` | `[1][2][10][0]`         | text, e.g. "Nov 14, 2023" |
// | `updated`  | `[1][2][145][0][1][0]`  | epoch seconds         |
//
// ## Constraints
//
// - One HTTP request per lookup
// - No retry, no backoff, no sleeping (the engine throttles every call)
// - Never touches the tabular store

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use storewatch_core::ComponentRegistry;
use storewatch_core::config::ProbeConfig;
use storewatch_core::traits::{AppMetadata, DateValue, StoreProbe, StoreProbeFactory};
use storewatch_core::{Error, Result};

/// Google Play base URL
const PLAY_BASE_URL: &str = "https://play.google.com";

/// Default HTTP timeout for page requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// Dataset holding the app details
const DETAILS_DATASET: &str = "ds:5";

/// JSON pointer to the release date text inside the details dataset
const RELEASED_POINTER: &str = "/1/2/10/0";

/// JSON pointer to the last-update epoch inside the details dataset
const UPDATED_POINTER: &str = "/1/2/145/0/1/0";

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"AF_initDataCallback[\s\S]*?</script").expect("valid script regex")
});

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(ds:.*?)'").expect("valid dataset key regex"));

static DATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"data:([\s\S]*?), sideChannel: \{\}\}\);</").expect("valid dataset regex")
});

/// Google Play store probe
#[derive(Debug, Clone)]
pub struct PlayStoreProbe {
    /// Base URL (overridable for tests)
    base_url: String,

    /// Listing language (`hl`)
    language: String,

    /// Listing country (`gl`)
    country: String,

    /// HTTP client for page requests
    client: reqwest::Client,
}

impl PlayStoreProbe {
    /// Create a probe for the given listing language and country
    pub fn new(language: impl Into<String>, country: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(concat!("storewatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: PLAY_BASE_URL.to_string(),
            language: language.into(),
            country: country.into(),
            client,
        })
    }

    /// Point the probe at another host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetch the details page of a package
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /store/apps/details?id=com.example&hl=en&gl=us
    /// ```
    async fn fetch_details(&self, package_id: &str) -> Result<String> {
        let url = format!("{}/store/apps/details", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("id", package_id),
                ("hl", self.language.as_str()),
                ("gl", self.country.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::http(format!("Request for {} failed: {}", package_id, e)))?;

        let status = response.status();
        if !status.is_success() {
            return match status.as_u16() {
                404 => Err(Error::not_found(format!(
                    "{} is not listed on Google Play",
                    package_id
                ))),
                429 => Err(Error::rate_limited(format!(
                    "Google Play rate limit hit while checking {}",
                    package_id
                ))),
                _ => Err(Error::probe(format!(
                    "Google Play answered {} for {}",
                    status, package_id
                ))),
            };
        }

        response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read details page: {}", e)))
    }
}

/// Extract listing dates from a details page
///
/// A page without the details dataset, or without dates in it, is still a
/// listed app.
pub fn parse_details_page(html: &str) -> AppMetadata {
    let datasets = datasets(html);
    let Some(details) = datasets.get(DETAILS_DATASET) else {
        tracing::debug!("Details page has no {} dataset", DETAILS_DATASET);
        return AppMetadata::empty();
    };

    AppMetadata {
        released: date_at(details, RELEASED_POINTER),
        updated: date_at(details, UPDATED_POINTER),
    }
}

/// Every `AF_initDataCallback` dataset of a page, by key
fn datasets(html: &str) -> HashMap<String, Value> {
    let mut datasets = HashMap::new();

    for script in SCRIPT_RE.find_iter(html) {
        let script = script.as_str();
        let (Some(key), Some(data)) = (KEY_RE.captures(script), DATA_RE.captures(script)) else {
            continue;
        };
        match serde_json::from_str::<Value>(&data[1]) {
            Ok(value) => {
                datasets.insert(key[1].to_string(), value);
            }
            Err(e) => tracing::debug!("Skipping unparseable dataset {}: {}", &key[1], e),
        }
    }

    datasets
}

fn date_at(dataset: &Value, pointer: &str) -> Option<DateValue> {
    match dataset.pointer(pointer)? {
        Value::Number(n) => n.as_i64().map(DateValue::Epoch),
        Value::String(s) if !s.trim().is_empty() => Some(DateValue::Text(s.trim().to_string())),
        _ => None,
    }
}

#[async_trait]
impl StoreProbe for PlayStoreProbe {
    async fn lookup(&self, package_id: &str) -> Result<AppMetadata> {
        let page = self.fetch_details(package_id).await?;
        let metadata = parse_details_page(&page);

        tracing::trace!(
            "{}: released={:?} updated={:?}",
            package_id,
            metadata.released,
            metadata.updated
        );

        Ok(metadata)
    }

    fn probe_name(&self) -> &'static str {
        "play"
    }
}

/// Factory for creating Google Play probes
pub struct PlayProbeFactory;

impl StoreProbeFactory for PlayProbeFactory {
    fn create(&self, config: &ProbeConfig) -> Result<Box<dyn StoreProbe>> {
        match config {
            ProbeConfig::Play { language, country } => {
                Ok(Box::new(PlayStoreProbe::new(language, country)?))
            }
            _ => Err(Error::config("Invalid config for Google Play probe")),
        }
    }
}

/// Register the Google Play probe with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_probe("play", Box::new(PlayProbeFactory));
}
