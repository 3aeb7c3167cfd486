//! Configuration types for storewatch
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::address::CellAddress;
use crate::credentials::Credentials;

/// Main monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Store probe configuration
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Tabular store configuration
    pub store: StoreConfig,

    /// Column layout of the tracked-packages sheet
    #[serde(default)]
    pub layout: SheetLayout,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl MonitorConfig {
    /// Create a new configuration with defaults around the given store
    pub fn new(store: StoreConfig) -> Self {
        Self {
            probe: ProbeConfig::default(),
            store,
            layout: SheetLayout::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.probe.validate()?;
        self.store.validate()?;
        self.layout.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Store probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeConfig {
    /// Google Play details page
    Play {
        /// Listing language (e.g. "en")
        #[serde(default = "default_language")]
        language: String,
        /// Listing country (e.g. "us")
        #[serde(default = "default_country")]
        country: String,
    },

    /// Custom probe
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProbeConfig {
    /// Validate the probe configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProbeConfig::Play { language, country } => {
                if language.is_empty() || country.is_empty() {
                    return Err(crate::Error::config(
                        "Play probe language and country cannot be empty",
                    ));
                }
                Ok(())
            }
            ProbeConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom probe factory cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the probe type name
    pub fn type_name(&self) -> &str {
        match self {
            ProbeConfig::Play { .. } => "play",
            ProbeConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig::Play {
            language: default_language(),
            country: default_country(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

fn default_country() -> String {
    "us".to_string()
}

/// Tabular store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Google Sheets spreadsheet
    GoogleSheets {
        /// Spreadsheet key from the sheet URL
        spreadsheet_id: String,
        /// Worksheet holding the tracked packages
        #[serde(default = "default_worksheet")]
        worksheet: String,
        /// Worksheet receiving the change log
        #[serde(default = "default_log_worksheet")]
        log_worksheet: String,
        /// Credentials for the Sheets API
        credentials: Credentials,
    },

    /// JSON worksheet file
    File {
        /// Path to the worksheet file
        path: String,
    },

    /// In-memory worksheet (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::GoogleSheets {
                spreadsheet_id,
                worksheet,
                log_worksheet,
                credentials,
            } => {
                if spreadsheet_id.is_empty() {
                    return Err(crate::Error::config("Spreadsheet id cannot be empty"));
                }
                if worksheet.is_empty() || log_worksheet.is_empty() {
                    return Err(crate::Error::config("Worksheet names cannot be empty"));
                }
                if worksheet == log_worksheet {
                    return Err(crate::Error::config(
                        "Change log worksheet must differ from the tracked worksheet",
                    ));
                }
                credentials.validate()
            }
            StoreConfig::File { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("File store path cannot be empty"));
                }
                Ok(())
            }
            StoreConfig::Memory => Ok(()),
            StoreConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom store factory cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::GoogleSheets { .. } => "google_sheets",
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

fn default_worksheet() -> String {
    "Sheet1".to_string()
}

fn default_log_worksheet() -> String {
    "Changes Log".to_string()
}

/// Column layout of the tracked-packages sheet
///
/// Row 1 is the header. Columns are 0-based (`A` = 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    /// Sequence number column (reporting only)
    #[serde(default = "default_sequence_column")]
    pub sequence_column: usize,

    /// Status column (`""`, `ready`, `ban`)
    #[serde(default = "default_status_column")]
    pub status_column: usize,

    /// Release date column
    #[serde(default = "default_release_date_column")]
    pub release_date_column: usize,

    /// First-observed-unavailable date column
    #[serde(default = "default_not_found_date_column")]
    pub not_found_date_column: usize,

    /// Package identifier column
    ///
    /// Rows that do not reach this column are not tracked.
    #[serde(default = "default_package_column")]
    pub package_column: usize,

    /// Column that carries the availability colour
    #[serde(default = "default_indicator_column")]
    pub indicator_column: usize,

    /// Cell receiving the available-package count
    #[serde(default = "default_summary_cell")]
    pub summary_cell: CellAddress,
}

impl SheetLayout {
    /// Validate the layout
    pub fn validate(&self) -> Result<(), crate::Error> {
        let widest = [
            self.sequence_column,
            self.status_column,
            self.release_date_column,
            self.not_found_date_column,
        ]
        .into_iter()
        .max()
        .unwrap_or(0);

        if self.package_column <= widest {
            return Err(crate::Error::config(format!(
                "Package column ({}) must be right of every other tracked column ({})",
                self.package_column, widest
            )));
        }

        let written = [
            self.status_column,
            self.release_date_column,
            self.not_found_date_column,
        ];
        for (i, a) in written.iter().enumerate() {
            if written[i + 1..].contains(a) {
                return Err(crate::Error::config(format!(
                    "Written columns must be distinct, column {} is used twice",
                    a
                )));
            }
        }

        Ok(())
    }

    /// Minimum row length for a row to be tracked
    pub fn min_row_len(&self) -> usize {
        self.package_column + 1
    }
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            sequence_column: default_sequence_column(),
            status_column: default_status_column(),
            release_date_column: default_release_date_column(),
            not_found_date_column: default_not_found_date_column(),
            package_column: default_package_column(),
            indicator_column: default_indicator_column(),
            summary_cell: default_summary_cell(),
        }
    }
}

fn default_sequence_column() -> usize {
    0
}

fn default_status_column() -> usize {
    3
}

fn default_release_date_column() -> usize {
    5
}

fn default_not_found_date_column() -> usize {
    6
}

fn default_package_column() -> usize {
    7
}

fn default_indicator_column() -> usize {
    0
}

fn default_summary_cell() -> CellAddress {
    // J2
    CellAddress::new(2, 9)
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of probes in flight at once
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Delay before every lookup (in milliseconds)
    ///
    /// Keeps the probe under the store's implicit rate limit. Applied to
    /// every call, successful or not.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Upper bound for a single lookup (in seconds)
    ///
    /// A lookup that exceeds it counts as a failed probe. Set to 0 to wait
    /// for as long as the probe itself allows.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.workers == 0 {
            return Err(crate::Error::config("Engine workers must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Per-call throttle delay
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Per-call lookup bound, `None` when disabled
    pub fn probe_timeout(&self) -> Option<Duration> {
        (self.probe_timeout_secs > 0).then(|| Duration::from_secs(self.probe_timeout_secs))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            throttle_ms: default_throttle_ms(),
            probe_timeout_secs: default_probe_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_workers() -> usize {
    5
}

fn default_throttle_ms() -> u64 {
    500
}

fn default_probe_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1000
}
