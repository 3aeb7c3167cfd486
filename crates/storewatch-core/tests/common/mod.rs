//! Test doubles and common utilities for reconciliation contract tests
//!
//! This module provides scripted collaborators that let the contract
//! tests observe exactly what the engine asked for, without any network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use storewatch_core::address::CellAddress;
use storewatch_core::config::{MonitorConfig, StoreConfig};
use storewatch_core::error::{Error, Result};
use storewatch_core::store::MemoryTabularStore;
use storewatch_core::traits::{
    AppMetadata, CellMutation, LogRow, SheetRow, StoreProbe, StyleMutation, TabularStore,
};

/// Fixed run date used by the contract tests
pub fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

/// `run_date()` as written to the sheet
pub const RUN_DATE: &str = "2024-03-15";

/// Build an 8-column tracked row
pub fn tracked(seq: &str, status: &str, release: &str, not_found: &str, package: &str) -> Vec<String> {
    vec![
        seq.to_string(),
        String::new(),
        String::new(),
        status.to_string(),
        String::new(),
        release.to_string(),
        not_found.to_string(),
        package.to_string(),
    ]
}

/// Engine configuration with no throttle, for fast tests
pub fn test_config() -> MonitorConfig {
    let mut config = MonitorConfig::new(StoreConfig::Memory);
    config.engine.throttle_ms = 0;
    config
}

/// What a scripted lookup does
#[derive(Debug, Clone)]
pub enum Script {
    /// Lookup succeeds with this metadata
    Listed(AppMetadata),
    /// Lookup fails as if the package was removed
    Missing,
    /// Lookup never completes
    Hang,
}

/// Counters shared between a ScriptedProbe and the test
#[derive(Debug, Default)]
pub struct ProbeStats {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    looked_up: Mutex<Vec<String>>,
}

impl ProbeStats {
    /// Number of lookups started
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of lookups observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Packages looked up, in start order
    pub fn looked_up(&self) -> Vec<String> {
        self.looked_up.lock().unwrap().clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A StoreProbe answering from a per-package script
///
/// Packages without a script are reported missing.
pub struct ScriptedProbe {
    scripts: HashMap<String, Script>,
    latency: Duration,
    first_latency: Duration,
    stats: Arc<ProbeStats>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            latency: Duration::ZERO,
            first_latency: Duration::ZERO,
            stats: Arc::new(ProbeStats::default()),
        }
    }

    /// Script a package as listed with the given metadata
    pub fn listed(mut self, package: &str, metadata: AppMetadata) -> Self {
        self.scripts.insert(package.to_string(), Script::Listed(metadata));
        self
    }

    /// Script a package as missing
    pub fn missing(mut self, package: &str) -> Self {
        self.scripts.insert(package.to_string(), Script::Missing);
        self
    }

    /// Script a package whose lookup never returns
    pub fn hanging(mut self, package: &str) -> Self {
        self.scripts.insert(package.to_string(), Script::Hang);
        self
    }

    /// Make every lookup take this long
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make only the first lookup take this long
    pub fn with_slow_first_lookup(mut self, latency: Duration) -> Self {
        self.first_latency = latency;
        self
    }

    /// Shared counters
    pub fn stats(&self) -> Arc<ProbeStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait::async_trait]
impl StoreProbe for ScriptedProbe {
    async fn lookup(&self, package_id: &str) -> Result<AppMetadata> {
        let call = self.stats.calls.fetch_add(1, Ordering::SeqCst);
        self.stats
            .looked_up
            .lock()
            .unwrap()
            .push(package_id.to_string());

        let running = self.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let _guard = InFlight(&self.stats.in_flight);

        if call == 0 && !self.first_latency.is_zero() {
            tokio::time::sleep(self.first_latency).await;
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.scripts.get(package_id) {
            Some(Script::Listed(metadata)) => Ok(metadata.clone()),
            Some(Script::Hang) => std::future::pending().await,
            Some(Script::Missing) | None => {
                Err(Error::not_found(format!("{} is not listed", package_id)))
            }
        }
    }

    fn probe_name(&self) -> &'static str {
        "scripted"
    }
}

/// Write category a RecordingStore can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Read,
    Cells,
    Styles,
    Log,
    SummaryCell,
}

/// Counters and failure switches shared between a RecordingStore and the test
#[derive(Debug, Default)]
pub struct StoreStats {
    read_calls: AtomicUsize,
    cell_calls: AtomicUsize,
    style_calls: AtomicUsize,
    log_calls: AtomicUsize,
    set_cell_calls: AtomicUsize,
    fail_read: AtomicBool,
    fail_cells: AtomicBool,
    fail_styles: AtomicBool,
    fail_log: AtomicBool,
    fail_summary: AtomicBool,
    cell_batches: Mutex<Vec<Vec<CellMutation>>>,
    style_batches: Mutex<Vec<Vec<StyleMutation>>>,
    log_batches: Mutex<Vec<Vec<LogRow>>>,
}

impl StoreStats {
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn cell_calls(&self) -> usize {
        self.cell_calls.load(Ordering::SeqCst)
    }

    pub fn style_calls(&self) -> usize {
        self.style_calls.load(Ordering::SeqCst)
    }

    pub fn log_calls(&self) -> usize {
        self.log_calls.load(Ordering::SeqCst)
    }

    pub fn set_cell_calls(&self) -> usize {
        self.set_cell_calls.load(Ordering::SeqCst)
    }

    /// Every cell batch received, including failed ones
    pub fn cell_batches(&self) -> Vec<Vec<CellMutation>> {
        self.cell_batches.lock().unwrap().clone()
    }

    /// Every style batch received, including failed ones
    pub fn style_batches(&self) -> Vec<Vec<StyleMutation>> {
        self.style_batches.lock().unwrap().clone()
    }

    /// Every log batch received, including failed ones
    pub fn log_batches(&self) -> Vec<Vec<LogRow>> {
        self.log_batches.lock().unwrap().clone()
    }

    /// Make a category fail from now on
    pub fn fail(&self, point: FailPoint) {
        self.switch(point).store(true, Ordering::SeqCst);
    }

    /// Make a category succeed again
    pub fn heal(&self, point: FailPoint) {
        self.switch(point).store(false, Ordering::SeqCst);
    }

    fn switch(&self, point: FailPoint) -> &AtomicBool {
        match point {
            FailPoint::Read => &self.fail_read,
            FailPoint::Cells => &self.fail_cells,
            FailPoint::Styles => &self.fail_styles,
            FailPoint::Log => &self.fail_log,
            FailPoint::SummaryCell => &self.fail_summary,
        }
    }

    fn failing(&self, point: FailPoint) -> bool {
        self.switch(point).load(Ordering::SeqCst)
    }
}

/// A TabularStore over a MemoryTabularStore that records every call
pub struct RecordingStore {
    sheet: MemoryTabularStore,
    stats: Arc<StoreStats>,
}

impl RecordingStore {
    /// Create a store holding the given data rows (header row is blank)
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            sheet: MemoryTabularStore::with_rows(rows),
            stats: Arc::new(StoreStats::default()),
        }
    }

    /// Handle on the underlying sheet, shares state with this store
    pub fn sheet(&self) -> MemoryTabularStore {
        self.sheet.clone()
    }

    /// Shared counters and failure switches
    pub fn stats(&self) -> Arc<StoreStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait::async_trait]
impl TabularStore for RecordingStore {
    async fn read_rows(&self) -> Result<Vec<SheetRow>> {
        self.stats.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.stats.failing(FailPoint::Read) {
            return Err(Error::tabular_store("sheet unavailable"));
        }
        self.sheet.read_rows().await
    }

    async fn apply_cell_mutations(&self, cells: &[CellMutation]) -> Result<()> {
        self.stats.cell_calls.fetch_add(1, Ordering::SeqCst);
        self.stats.cell_batches.lock().unwrap().push(cells.to_vec());
        if self.stats.failing(FailPoint::Cells) {
            return Err(Error::tabular_store("cell batch rejected"));
        }
        self.sheet.apply_cell_mutations(cells).await
    }

    async fn apply_style_mutations(&self, styles: &[StyleMutation]) -> Result<()> {
        self.stats.style_calls.fetch_add(1, Ordering::SeqCst);
        self.stats.style_batches.lock().unwrap().push(styles.to_vec());
        if self.stats.failing(FailPoint::Styles) {
            return Err(Error::tabular_store("format batch rejected"));
        }
        self.sheet.apply_style_mutations(styles).await
    }

    async fn append_log_rows(&self, rows: &[LogRow]) -> Result<()> {
        self.stats.log_calls.fetch_add(1, Ordering::SeqCst);
        self.stats.log_batches.lock().unwrap().push(rows.to_vec());
        if self.stats.failing(FailPoint::Log) {
            return Err(Error::tabular_store("log append rejected"));
        }
        self.sheet.append_log_rows(rows).await
    }

    async fn set_cell(&self, address: &CellAddress, value: &str) -> Result<()> {
        self.stats.set_cell_calls.fetch_add(1, Ordering::SeqCst);
        if self.stats.failing(FailPoint::SummaryCell) {
            return Err(Error::tabular_store("summary cell rejected"));
        }
        self.sheet.set_cell(address, value).await
    }

    fn store_name(&self) -> &'static str {
        "recording"
    }
}

/// Log rows as written, header excluded
pub async fn logged(sheet: &MemoryTabularStore) -> Vec<Vec<String>> {
    sheet
        .log_rows()
        .await
        .map(|rows| rows.into_iter().skip(1).collect())
        .unwrap_or_default()
}
