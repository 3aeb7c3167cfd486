// # storewatchd - App Availability Monitor Daemon
//
// This daemon is a THIN integration layer. All reconciliation logic lives
// in storewatch-core.
//
// The storewatchd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Loading credentials
// 3. Initializing the runtime
// 4. Registering probes and stores
// 5. Running the engine once, or on a fixed period until signalled
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Credentials
// - `GOOGLE_CREDENTIALS`: service-account key file or access token JSON
//   (required for the sheets store)
//
// ### Store
// - `STOREWATCH_STORE_TYPE`: Type of tabular store (sheets, file)
// - `STOREWATCH_SPREADSHEET_ID`: Spreadsheet key (for sheets)
// - `STOREWATCH_WORKSHEET`: Tracked worksheet title (default: Sheet1)
// - `STOREWATCH_LOG_WORKSHEET`: Change log worksheet title (default: Changes Log)
// - `STOREWATCH_STORE_PATH`: Path to worksheet file (for file)
//
// ### Probe
// - `STOREWATCH_PLAY_LANG`: Listing language (default: en)
// - `STOREWATCH_PLAY_COUNTRY`: Listing country (default: us)
//
// ### Engine
// - `STOREWATCH_WORKERS`: Probes in flight at once
// - `STOREWATCH_THROTTLE_MS`: Delay before every lookup
// - `STOREWATCH_PROBE_TIMEOUT_SECS`: Upper bound per lookup (0 = none)
// - `STOREWATCH_INTERVAL_SECS`: Period between runs (unset or 0 = run once)
// - `STOREWATCH_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export GOOGLE_CREDENTIALS="$(cat service-account.json)"
// export STOREWATCH_SPREADSHEET_ID=1AbC...xyz
// export STOREWATCH_INTERVAL_SECS=900
//
// storewatchd
// ```

use anyhow::{Context, Result};
use std::env;
use std::future::Future;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use storewatch_core::config::{EngineConfig, MonitorConfig, ProbeConfig, StoreConfig};
use storewatch_core::engine::EngineEvent;
use storewatch_core::{ComponentRegistry, Credentials, MonitorEngine};
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StorewatchExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<StorewatchExitCode> for ExitCode {
    fn from(code: StorewatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    credentials: Option<Credentials>,
    store_type: String,
    spreadsheet_id: Option<String>,
    worksheet: String,
    log_worksheet: String,
    store_path: Option<String>,
    play_lang: String,
    play_country: String,
    workers: Option<usize>,
    throttle_ms: Option<u64>,
    probe_timeout_secs: Option<u64>,
    interval_secs: Option<u64>,
    log_level: String,
}

/// Read an optional numeric variable; a value that does not parse is an error
fn numeric_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer. Got: '{}'", name, raw)),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let credentials = match env::var("GOOGLE_CREDENTIALS") {
            Ok(blob) => Some(
                Credentials::from_json(&blob).context("GOOGLE_CREDENTIALS is malformed")?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            credentials,
            store_type: env::var("STOREWATCH_STORE_TYPE").unwrap_or_else(|_| "sheets".to_string()),
            spreadsheet_id: env::var("STOREWATCH_SPREADSHEET_ID").ok(),
            worksheet: env::var("STOREWATCH_WORKSHEET").unwrap_or_else(|_| "Sheet1".to_string()),
            log_worksheet: env::var("STOREWATCH_LOG_WORKSHEET")
                .unwrap_or_else(|_| "Changes Log".to_string()),
            store_path: env::var("STOREWATCH_STORE_PATH").ok(),
            play_lang: env::var("STOREWATCH_PLAY_LANG").unwrap_or_else(|_| "en".to_string()),
            play_country: env::var("STOREWATCH_PLAY_COUNTRY").unwrap_or_else(|_| "us".to_string()),
            workers: numeric_var("STOREWATCH_WORKERS")?,
            throttle_ms: numeric_var("STOREWATCH_THROTTLE_MS")?,
            probe_timeout_secs: numeric_var("STOREWATCH_PROBE_TIMEOUT_SECS")?,
            interval_secs: numeric_var("STOREWATCH_INTERVAL_SECS")?,
            log_level: env::var("STOREWATCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// This performs validation including:
    /// - Required field presence
    /// - Numeric range validation
    /// - Type enumeration validation
    fn validate(&self) -> Result<()> {
        match self.store_type.as_str() {
            "sheets" => {
                if self.credentials.is_none() {
                    anyhow::bail!(
                        "GOOGLE_CREDENTIALS is required. \
                        Set it to a service-account key file or a JSON document \
                        with an access_token field"
                    );
                }
                if self.spreadsheet_id.as_ref().is_none_or(|id| id.trim().is_empty()) {
                    anyhow::bail!(
                        "STOREWATCH_SPREADSHEET_ID is required when STOREWATCH_STORE_TYPE=sheets"
                    );
                }
                if self.worksheet == self.log_worksheet {
                    anyhow::bail!(
                        "STOREWATCH_LOG_WORKSHEET must differ from STOREWATCH_WORKSHEET ('{}')",
                        self.worksheet
                    );
                }
            }
            "file" => {
                let Some(ref path) = self.store_path else {
                    anyhow::bail!(
                        "STOREWATCH_STORE_PATH is required when STOREWATCH_STORE_TYPE=file. \
                        Set it via: export STOREWATCH_STORE_PATH=/var/lib/storewatch/sheet.json"
                    );
                };
                if path.is_empty() {
                    anyhow::bail!(
                        "STOREWATCH_STORE_PATH cannot be empty when STOREWATCH_STORE_TYPE=file"
                    );
                }
            }
            _ => anyhow::bail!(
                "STOREWATCH_STORE_TYPE '{}' is not supported. \
                Supported types: sheets, file",
                self.store_type
            ),
        }

        if let Some(workers) = self.workers
            && !(1..=64).contains(&workers)
        {
            anyhow::bail!("STOREWATCH_WORKERS must be between 1 and 64. Got: {}", workers);
        }

        if let Some(throttle) = self.throttle_ms
            && throttle > 60_000
        {
            anyhow::bail!(
                "STOREWATCH_THROTTLE_MS must be between 0 and 60000. Got: {}",
                throttle
            );
        }

        if let Some(timeout) = self.probe_timeout_secs
            && timeout > 600
        {
            anyhow::bail!(
                "STOREWATCH_PROBE_TIMEOUT_SECS must be between 0 and 600 seconds. Got: {}",
                timeout
            );
        }

        if let Some(interval) = self.interval_secs
            && interval != 0
            && !(10..=86_400).contains(&interval)
        {
            anyhow::bail!(
                "STOREWATCH_INTERVAL_SECS must be 0 (run once) or between 10 and 86400 seconds. Got: {}",
                interval
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "STOREWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Period between runs, `None` for a single run
    fn interval(&self) -> Option<Duration> {
        self.interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Build the library configuration
    fn monitor_config(&self) -> Result<MonitorConfig> {
        let store = match self.store_type.as_str() {
            "sheets" => StoreConfig::GoogleSheets {
                spreadsheet_id: self.spreadsheet_id.clone().unwrap_or_default(),
                worksheet: self.worksheet.clone(),
                log_worksheet: self.log_worksheet.clone(),
                credentials: self
                    .credentials
                    .clone()
                    .context("GOOGLE_CREDENTIALS is required")?,
            },
            _ => StoreConfig::File {
                path: self.store_path.clone().unwrap_or_default(),
            },
        };

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            workers: self.workers.unwrap_or(defaults.workers),
            throttle_ms: self.throttle_ms.unwrap_or(defaults.throttle_ms),
            probe_timeout_secs: self.probe_timeout_secs.unwrap_or(defaults.probe_timeout_secs),
            event_channel_capacity: defaults.event_channel_capacity,
        };

        let mut config = MonitorConfig::new(store);
        config.probe = ProbeConfig::Play {
            language: self.play_lang.clone(),
            country: self.play_country.clone(),
        };
        config.engine = engine;
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return StorewatchExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return StorewatchExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return StorewatchExitCode::ConfigError.into();
    }

    info!("Starting storewatchd");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return StorewatchExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let engine = match build_engine(&config).await {
            Ok(engine) => engine,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return StorewatchExitCode::ConfigError;
            }
        };

        match run_daemon(engine, config.interval()).await {
            Ok(()) => StorewatchExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                StorewatchExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Register collaborators and construct the engine
async fn build_engine(config: &Config) -> Result<MonitorEngine> {
    let registry = ComponentRegistry::with_builtin_stores();

    #[cfg(feature = "play")]
    {
        debug!("Registering Google Play probe");
        storewatch_probe_play::register(&registry);
    }

    #[cfg(feature = "sheets")]
    {
        debug!("Registering Google Sheets store");
        storewatch_sheets::register(&registry);
    }

    let monitor_config = config.monitor_config()?;

    if let Some(ref credentials) = config.credentials {
        info!("Authenticated as {}", credentials.identity());
    }

    let probe = registry
        .create_probe(&monitor_config.probe)
        .with_context(|| format!("Cannot create probe '{}'", monitor_config.probe.type_name()))?;
    let store = registry
        .create_store(&monitor_config.store)
        .await
        .with_context(|| format!("Cannot create store '{}'", monitor_config.store.type_name()))?;

    info!(
        "Probe: {}, store: {}, workers: {}",
        probe.probe_name(),
        store.store_name(),
        monitor_config.engine.workers
    );

    let (engine, events) = MonitorEngine::new(probe, store, monitor_config)?;
    tokio::spawn(log_events(events));

    Ok(engine)
}

/// Run the daemon
async fn run_daemon(engine: MonitorEngine, interval: Option<Duration>) -> Result<()> {
    match interval {
        None => {
            let report = engine.run_once().await?;
            if !report.is_clean() {
                warn!(
                    "{} write(s) failed; they will be retried on the next run",
                    report.write_failures.len()
                );
            }
        }
        Some(period) => {
            info!("Checking every {:?}", period);
            let shutdown = shutdown_signal()?;
            engine.run_until(period, shutdown).await?;
            info!("Shutting down daemon");
        }
    }

    Ok(())
}

/// Drain engine events into the debug log
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Engine event: {:?}", event);
    }
}

/// Resolve on the first SIGTERM or SIGINT
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
    })
}

/// Resolve on CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal: SIGINT"),
            Err(e) => error!("Failed to wait for CTRL-C: {}", e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheets_config() -> Config {
        Config {
            credentials: Some(Credentials::from_token("token")),
            store_type: "sheets".to_string(),
            spreadsheet_id: Some("sheet-key".to_string()),
            worksheet: "Sheet1".to_string(),
            log_worksheet: "Changes Log".to_string(),
            store_path: None,
            play_lang: "en".to_string(),
            play_country: "us".to_string(),
            workers: None,
            throttle_ms: None,
            probe_timeout_secs: None,
            interval_secs: None,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn sheets_config_is_valid() {
        let config = sheets_config();
        assert!(config.validate().is_ok());

        let monitor = config.monitor_config().unwrap();
        assert_eq!(monitor.store.type_name(), "google_sheets");
        assert_eq!(monitor.engine.workers, 5);
        assert_eq!(config.interval(), None);
    }

    #[test]
    fn missing_credentials_is_fatal() {
        let mut config = sheets_config();
        config.credentials = None;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("GOOGLE_CREDENTIALS"));
    }

    #[test]
    fn file_store_needs_path_not_credentials() {
        let mut config = sheets_config();
        config.store_type = "file".to_string();
        config.credentials = None;
        assert!(config.validate().is_err());

        config.store_path = Some("/tmp/sheet.json".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.monitor_config().unwrap().store.type_name(), "file");
    }

    #[test]
    fn numeric_ranges_are_checked() {
        let mut config = sheets_config();
        config.workers = Some(0);
        assert!(config.validate().is_err());

        let mut config = sheets_config();
        config.interval_secs = Some(5);
        assert!(config.validate().is_err());

        let mut config = sheets_config();
        config.interval_secs = Some(0);
        assert!(config.validate().is_ok());
        assert_eq!(config.interval(), None);

        config.interval_secs = Some(900);
        assert_eq!(config.interval(), Some(Duration::from_secs(900)));
    }

    #[test]
    fn engine_overrides_are_applied() {
        let mut config = sheets_config();
        config.workers = Some(8);
        config.throttle_ms = Some(0);
        config.probe_timeout_secs = Some(0);

        let monitor = config.monitor_config().unwrap();
        assert_eq!(monitor.engine.workers, 8);
        assert_eq!(monitor.engine.throttle_ms, 0);
        assert_eq!(monitor.engine.probe_timeout(), None);
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut config = sheets_config();
        config.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn exit_codes_follow_convention() {
        assert_eq!(StorewatchExitCode::CleanShutdown as u8, 0);
        assert_eq!(StorewatchExitCode::ConfigError as u8, 1);
        assert_eq!(StorewatchExitCode::RuntimeError as u8, 2);
    }
}
