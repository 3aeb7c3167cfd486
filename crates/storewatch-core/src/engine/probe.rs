//! Probe adapter
//!
//! Wraps one [`StoreProbe::lookup`] call: throttles, bounds it in time and
//! turns whatever comes back into a [`ProbeOutcome`]. Nothing escapes as an
//! error; an unavailable package is ordinary data.

use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::model::{ProbeResult, Status, TrackedRow, format_date};
use crate::timestamp::normalize_opt;
use crate::traits::{AppMetadata, StoreProbe};

/// Written as the resolved date when a listed package reports no dates
pub const NOT_FOUND_SENTINEL: &str = "Not found";

/// Outcome of a single lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The package is listed
    Available {
        /// Normalized release date, update date, or [`NOT_FOUND_SENTINEL`]
        resolved_date: String,
    },
    /// The package is not listed, or the lookup failed
    Unavailable {
        /// Why the lookup failed
        reason: String,
    },
}

impl ProbeOutcome {
    /// Build the outcome for a successful lookup
    pub fn from_metadata(metadata: &AppMetadata) -> Self {
        let released = normalize_opt(metadata.released.as_ref()).filter(|d| d.is_present());
        let updated = normalize_opt(metadata.updated.as_ref()).filter(|d| d.is_present());

        let resolved_date = released
            .or(updated)
            .map(|d| d.to_cell())
            .unwrap_or_else(|| NOT_FOUND_SENTINEL.to_string());

        ProbeOutcome::Available { resolved_date }
    }

    /// Status this outcome stands for
    pub fn status(&self) -> Status {
        match self {
            ProbeOutcome::Available { .. } => Status::Ready,
            ProbeOutcome::Unavailable { .. } => Status::Ban,
        }
    }

    /// Fold the outcome with the row's previous state into a result
    ///
    /// An unavailable package keeps its previous release date, and its
    /// first-unavailable date is sticky: `today` is only used when none
    /// was recorded before.
    pub fn into_result(self, row: &TrackedRow, today: NaiveDate) -> ProbeResult {
        match self {
            ProbeOutcome::Available { resolved_date } => ProbeResult {
                package_id: row.package_id.clone(),
                status: Status::Ready,
                resolved_date,
                not_found_date: String::new(),
            },
            ProbeOutcome::Unavailable { .. } => {
                let not_found_date = if row.not_found_date.trim().is_empty() {
                    format_date(today)
                } else {
                    row.not_found_date.clone()
                };
                ProbeResult {
                    package_id: row.package_id.clone(),
                    status: Status::Ban,
                    resolved_date: row.release_date.clone(),
                    not_found_date,
                }
            }
        }
    }
}

/// Throttled, time-bounded access to a store probe
pub struct ProbeAdapter<'a> {
    probe: &'a dyn StoreProbe,
    throttle: Duration,
    timeout: Option<Duration>,
}

impl<'a> ProbeAdapter<'a> {
    /// Create a new adapter
    ///
    /// # Parameters
    ///
    /// - `probe`: The store probe to call
    /// - `throttle`: Delay applied before every lookup
    /// - `timeout`: Upper bound per lookup (`None` = unbounded)
    pub fn new(probe: &'a dyn StoreProbe, throttle: Duration, timeout: Option<Duration>) -> Self {
        Self {
            probe,
            throttle,
            timeout,
        }
    }

    /// Look up one package
    pub async fn probe(&self, package_id: &str) -> ProbeOutcome {
        debug!("Checking {} via {}", package_id, self.probe.probe_name());

        if !self.throttle.is_zero() {
            tokio::time::sleep(self.throttle).await;
        }

        let lookup = self.probe.lookup(package_id);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, lookup).await {
                Ok(result) => result,
                Err(_) => Err(crate::Error::timeout(format!(
                    "lookup of {} exceeded {:?}",
                    package_id, limit
                ))),
            },
            None => lookup.await,
        };

        match result {
            Ok(metadata) => {
                let outcome = ProbeOutcome::from_metadata(&metadata);
                if let ProbeOutcome::Available { resolved_date } = &outcome {
                    debug!("Date for {}: {}", package_id, resolved_date);
                }
                outcome
            }
            Err(e) => {
                warn!("Check failed for {}: {}", package_id, e);
                ProbeOutcome::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Look up the package of a tracked row and resolve its result
    pub async fn probe_row(&self, row: &TrackedRow, today: NaiveDate) -> ProbeResult {
        self.probe(&row.package_id).await.into_result(row, today)
    }
}
