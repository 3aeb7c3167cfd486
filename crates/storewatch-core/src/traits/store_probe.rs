// # Store Probe Trait
//
// Defines the interface for looking up one package in an app store.
//
// ## Implementations
//
// - Google Play: `storewatch-probe-play` crate
// - Test doubles: `tests/common/mod.rs`
//
// ## Usage
//
// ```rust,ignore
// use storewatch_core::StoreProbe;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let probe = /* StoreProbe implementation */;
//
//     match probe.lookup("com.example.app").await {
//         Ok(metadata) => println!("listed, released {:?}", metadata.released),
//         Err(e) => println!("not listed: {}", e),
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A date as reported by a store: either epoch seconds or text
///
/// Stores are inconsistent about this. Play reports `released` as a
/// human string ("Nov 14, 2023") and `updated` as epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateValue {
    /// Seconds since the Unix epoch
    Epoch(i64),
    /// Already formatted date text
    Text(String),
}

impl DateValue {
    /// Whether the value carries any information
    ///
    /// `0` and the empty string count as "no date".
    pub fn is_present(&self) -> bool {
        match self {
            DateValue::Epoch(secs) => *secs != 0,
            DateValue::Text(text) => !text.is_empty(),
        }
    }

    /// Render the value as sheet cell text
    pub fn to_cell(&self) -> String {
        match self {
            DateValue::Epoch(secs) => secs.to_string(),
            DateValue::Text(text) => text.clone(),
        }
    }
}

impl From<i64> for DateValue {
    fn from(secs: i64) -> Self {
        DateValue::Epoch(secs)
    }
}

impl From<&str> for DateValue {
    fn from(text: &str) -> Self {
        DateValue::Text(text.to_string())
    }
}

impl From<String> for DateValue {
    fn from(text: String) -> Self {
        DateValue::Text(text)
    }
}

/// Listing metadata returned by a successful lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    /// First release date
    #[serde(default)]
    pub released: Option<DateValue>,
    /// Last update date
    #[serde(default)]
    pub updated: Option<DateValue>,
}

impl AppMetadata {
    /// Metadata with both dates absent
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set the release date
    pub fn with_released(mut self, released: impl Into<DateValue>) -> Self {
        self.released = Some(released.into());
        self
    }

    /// Set the update date
    pub fn with_updated(mut self, updated: impl Into<DateValue>) -> Self {
        self.updated = Some(updated.into());
        self
    }
}

/// Trait for store probe implementations
///
/// A probe performs exactly one lookup per call and reports the outcome.
///
/// # Failure Semantics
///
/// Any `Err` means "the package is not available right now". Missing
/// listings, network errors and unexpected responses are all reported the
/// same way; the engine never distinguishes between them.
///
/// # Forbidden Capabilities
/// - ❌ Retry or back off (one lookup per call)
/// - ❌ Sleep for rate limiting (the engine throttles every call)
/// - ❌ Touch the tabular store
#[async_trait]
pub trait StoreProbe: Send + Sync {
    /// Look up a package by its identifier
    ///
    /// # Parameters
    ///
    /// - `package_id`: The store package identifier (e.g. "com.example.app")
    ///
    /// # Returns
    ///
    /// - `Ok(AppMetadata)`: The package is listed
    /// - `Err(Error)`: The package is not listed or the lookup failed
    async fn lookup(&self, package_id: &str) -> Result<AppMetadata, crate::Error>;

    /// Get the probe name (for logging/debugging)
    fn probe_name(&self) -> &'static str;
}

/// Helper trait for constructing store probes from configuration
pub trait StoreProbeFactory: Send + Sync {
    /// Create a StoreProbe instance from configuration
    fn create(
        &self,
        config: &crate::config::ProbeConfig,
    ) -> Result<Box<dyn StoreProbe>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_value_deserializes_numbers_and_text() {
        let meta: AppMetadata =
            serde_json::from_str(r#"{"released": "Nov 14, 2023", "updated": 1700000000}"#)
                .unwrap();
        assert_eq!(meta.released, Some(DateValue::Text("Nov 14, 2023".into())));
        assert_eq!(meta.updated, Some(DateValue::Epoch(1_700_000_000)));
    }

    #[test]
    fn missing_fields_are_absent() {
        let meta: AppMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(meta, AppMetadata::empty());
    }

    #[test]
    fn zero_and_empty_are_not_present() {
        assert!(!DateValue::Epoch(0).is_present());
        assert!(!DateValue::Text(String::new()).is_present());
        assert!(DateValue::Epoch(5).is_present());
        assert!(DateValue::from("2020-01-01").is_present());
    }
}
