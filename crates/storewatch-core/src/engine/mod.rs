//! Reconciliation engine
//!
//! The MonitorEngine is responsible for:
//! - Reading one snapshot of the tracked rows
//! - Probing every tracked package with bounded concurrency
//! - Classifying status transitions into change events
//! - Planning and applying the batched sheet writes
//! - Flushing the change log once per run
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   snapshot    ┌──────────────┐   lookup   ┌─────────────┐
//! │ TabularStore │──────────────▶│MonitorEngine │───────────▶│ StoreProbe  │
//! └──────────────┘               └──────────────┘  (N at a   └─────────────┘
//!        ▲                              │            time)
//!        │   cells / styles / count     │
//!        │   change log (one append)    ▼
//!        └──────────────────────  MutationPlan + ChangeLogBuffer
//! ```
//!
//! ## Run Flow
//!
//! 1. Read the snapshot; it is never re-read during the run
//! 2. Probe every tracked row, classify, buffer change events
//! 3. Plan cell, indicator and summary writes from the same snapshot
//! 4. Apply each write category independently
//! 5. Flush the change log

pub mod classify;
pub mod plan;
pub mod probe;
pub mod reconcile;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

use crate::changelog::ChangeLogBuffer;
use crate::config::{MonitorConfig, SheetLayout};
use crate::error::Result;
use crate::model::{ChangeType, ProbeResult, Status, TrackedRow, tracked_rows};
use crate::traits::{StoreProbe, TabularStore};

pub use classify::classify;
pub use plan::{MutationPlan, plan};
pub use probe::{NOT_FOUND_SENTINEL, ProbeAdapter, ProbeOutcome};
pub use reconcile::Reconciler;

/// Category of a batched write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteCategory {
    /// Status and date cells
    Cells,
    /// Row availability indicators
    Styles,
    /// Available-package count
    SummaryCount,
    /// Change log append
    ChangeLog,
}

impl fmt::Display for WriteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteCategory::Cells => "cell values",
            WriteCategory::Styles => "row indicators",
            WriteCategory::SummaryCount => "available count",
            WriteCategory::ChangeLog => "change log",
        })
    }
}

/// A write category that failed during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    /// Which write failed
    pub category: WriteCategory,
    /// Error text
    pub error: String,
}

/// Summary of one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Run date
    pub date: NaiveDate,
    /// Rows probed
    pub tracked: usize,
    /// Rows found listed
    pub available: usize,
    /// Rows found not listed
    pub unavailable: usize,
    /// Change events written to the change log
    pub events_logged: usize,
    /// Writes that failed (the run still completed)
    pub write_failures: Vec<WriteFailure>,
}

impl RunReport {
    /// Whether every write succeeded
    pub fn is_clean(&self) -> bool {
        self.write_failures.is_empty()
    }
}

/// Events emitted by the MonitorEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Run started
    RunStarted {
        date: NaiveDate,
    },

    /// Snapshot read, probing begins
    SnapshotRead {
        tracked: usize,
    },

    /// A package was probed
    ProbeCompleted {
        package_id: String,
        status: Status,
    },

    /// A package changed state
    TransitionDetected {
        package_id: String,
        change_type: ChangeType,
    },

    /// A write category failed
    WriteFailed {
        category: WriteCategory,
        error: String,
    },

    /// Run finished (possibly with write failures)
    RunCompleted {
        report: RunReport,
    },

    /// Run aborted before any write (snapshot unreadable)
    RunFailed {
        error: String,
    },

    /// Recurring loop stopped
    Stopped {
        reason: String,
    },
}

/// Core reconciliation engine
///
/// ## Lifecycle
///
/// 1. Create with [`MonitorEngine::new()`]
/// 2. Call [`MonitorEngine::run_once()`] from an external scheduler, or
///    [`MonitorEngine::run_until()`] to loop on a fixed period
/// 3. Drop to cleanup
///
/// ## Concurrency
///
/// Only probing runs concurrently. Planning and every write happen after
/// all probes of the run have finished.
pub struct MonitorEngine {
    /// Store probe for package lookups
    probe: Box<dyn StoreProbe>,

    /// Tabular store holding the tracked rows
    store: Box<dyn TabularStore>,

    /// Sheet column layout
    layout: SheetLayout,

    /// Maximum probes in flight
    workers: usize,

    /// Delay before every lookup
    throttle: Duration,

    /// Upper bound per lookup
    probe_timeout: Option<Duration>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl MonitorEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        probe: Box<dyn StoreProbe>,
        store: Box<dyn TabularStore>,
        config: MonitorConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            probe,
            store,
            layout: config.layout,
            workers: config.engine.workers,
            throttle: config.engine.throttle(),
            probe_timeout: config.engine.probe_timeout(),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run one reconciliation pass dated today (local time)
    pub async fn run_once(&self) -> Result<RunReport> {
        self.run_on(chrono::Local::now().date_naive()).await
    }

    /// Run one reconciliation pass with an explicit run date
    ///
    /// # Returns
    ///
    /// - `Ok(RunReport)`: The run completed; check `write_failures`
    /// - `Err(Error)`: The snapshot could not be read, nothing was written
    pub async fn run_on(&self, today: NaiveDate) -> Result<RunReport> {
        self.emit_event(EngineEvent::RunStarted { date: today });
        info!("Starting availability check for {}", today);

        let snapshot = match self.store.read_rows().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Failed to read rows from {}: {}", self.store.store_name(), e);
                self.emit_event(EngineEvent::RunFailed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let rows = tracked_rows(&snapshot, &self.layout);
        info!("Found {} app(s) to check", rows.len());
        self.emit_event(EngineEvent::SnapshotRead {
            tracked: rows.len(),
        });

        let log = ChangeLogBuffer::new();
        let results = self.reconcile(&rows, today, &log).await;

        let plan = plan(&rows, &results, &self.layout);
        let mut write_failures = self.apply_plan(&plan).await;

        let events_logged = match log.flush(self.store.as_ref()).await {
            Ok(count) => count,
            Err(e) => {
                write_failures.push(self.write_failed(WriteCategory::ChangeLog, &e));
                0
            }
        };

        let report = RunReport {
            date: today,
            tracked: rows.len(),
            available: plan.available_count,
            unavailable: plan.rows_touched() - plan.available_count,
            events_logged,
            write_failures,
        };

        if report.is_clean() {
            info!(
                "Check finished: {} available, {} unavailable, {} change(s) logged",
                report.available, report.unavailable, report.events_logged
            );
        } else {
            warn!(
                "Check finished with {} failed write(s)",
                report.write_failures.len()
            );
        }

        self.emit_event(EngineEvent::RunCompleted {
            report: report.clone(),
        });
        Ok(report)
    }

    /// Probe every row, recording transitions into `log`
    pub async fn reconcile(
        &self,
        rows: &[TrackedRow],
        today: NaiveDate,
        log: &ChangeLogBuffer,
    ) -> Vec<ProbeResult> {
        let adapter = ProbeAdapter::new(self.probe.as_ref(), self.throttle, self.probe_timeout);
        let reconciler = Reconciler::new(adapter, self.workers);

        reconciler
            .reconcile(rows, today, log, |_, result, event| {
                self.emit_event(EngineEvent::ProbeCompleted {
                    package_id: result.package_id.clone(),
                    status: result.status,
                });
                if let Some(event) = event {
                    self.emit_event(EngineEvent::TransitionDetected {
                        package_id: event.package_id.clone(),
                        change_type: event.change_type,
                    });
                }
            })
            .await
    }

    /// Apply a plan, one batched call per category
    ///
    /// A failed category is reported and the remaining ones are still
    /// attempted. The summary count is written even when no row matched.
    pub async fn apply_plan(&self, plan: &MutationPlan) -> Vec<WriteFailure> {
        let mut failures = Vec::new();

        if !plan.cells.is_empty() {
            match self.store.apply_cell_mutations(&plan.cells).await {
                Ok(()) => debug!("Wrote {} cell(s)", plan.cells.len()),
                Err(e) => failures.push(self.write_failed(WriteCategory::Cells, &e)),
            }
        }

        if !plan.styles.is_empty() {
            match self.store.apply_style_mutations(&plan.styles).await {
                Ok(()) => debug!("Updated {} row indicator(s)", plan.styles.len()),
                Err(e) => failures.push(self.write_failed(WriteCategory::Styles, &e)),
            }
        }

        let count = plan.available_count.to_string();
        match self.store.set_cell(&plan.summary_cell, &count).await {
            Ok(()) => info!("Available apps: {}", plan.available_count),
            Err(e) => failures.push(self.write_failed(WriteCategory::SummaryCount, &e)),
        }

        failures
    }

    /// Run immediately, then once per `period`, until `shutdown` resolves
    ///
    /// A failed run is logged and the loop carries on. A run in progress
    /// is finished before the loop stops.
    pub async fn run_until<F>(&self, period: Duration, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }

                Some(_) = ticks.next() => {
                    if let Err(e) = self.run_once().await {
                        error!("Availability check failed: {}", e);
                    }
                    info!("Next check in {:?}", period);
                }
            }
        }

        Ok(())
    }

    fn write_failed(&self, category: WriteCategory, error: &crate::Error) -> WriteFailure {
        error!("Failed to write {}: {}", category, error);
        self.emit_event(EngineEvent::WriteFailed {
            category,
            error: error.to_string(),
        });
        WriteFailure {
            category,
            error: error.to_string(),
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_categories_read_naturally() {
        assert_eq!(WriteCategory::Styles.to_string(), "row indicators");
        assert_eq!(WriteCategory::ChangeLog.to_string(), "change log");
    }

    #[test]
    fn report_is_clean_without_failures() {
        let mut report = RunReport {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            tracked: 0,
            available: 0,
            unavailable: 0,
            events_logged: 0,
            write_failures: Vec::new(),
        };
        assert!(report.is_clean());
        report.write_failures.push(WriteFailure {
            category: WriteCategory::Cells,
            error: "boom".into(),
        });
        assert!(!report.is_clean());
    }
}
