//! Reconciliation driver
//!
//! Fans the probe adapter out over every tracked row with at most
//! `workers` lookups in flight, classifies each result as it completes and
//! records transitions in the run's [`ChangeLogBuffer`].

use chrono::NaiveDate;
use futures::StreamExt;
use futures::stream;

use crate::changelog::ChangeLogBuffer;
use crate::engine::classify::classify;
use crate::engine::probe::ProbeAdapter;
use crate::model::{ChangeEvent, ProbeResult, TrackedRow};

/// Bounded-concurrency prober for one run
pub struct Reconciler<'a> {
    adapter: ProbeAdapter<'a>,
    workers: usize,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler running at most `workers` probes at once
    pub fn new(adapter: ProbeAdapter<'a>, workers: usize) -> Self {
        Self {
            adapter,
            workers: workers.max(1),
        }
    }

    /// Probe every row and return one result per row
    ///
    /// Probes run in completion order but results are returned in row
    /// order, so duplicate packages resolve the same way on every run.
    /// `observe` sees every result together with the event it produced,
    /// if any.
    pub async fn reconcile<F>(
        &self,
        rows: &[TrackedRow],
        today: NaiveDate,
        log: &ChangeLogBuffer,
        observe: F,
    ) -> Vec<ProbeResult>
    where
        F: Fn(&TrackedRow, &ProbeResult, Option<&ChangeEvent>),
    {
        let adapter = &self.adapter;
        let observe = &observe;

        let mut results: Vec<(usize, ProbeResult)> = stream::iter(rows.iter().enumerate())
            .map(|(index, row)| async move {
                let result = adapter.probe_row(row, today).await;
                tracing::info!("{}: {} -> {}", row.package_id, row.status, result.status);

                let event = classify(&row.status, result.status).map(|change_type| ChangeEvent {
                    timestamp: today,
                    change_type,
                    sequence_number: row.sequence_number.clone(),
                    package_id: row.package_id.clone(),
                });

                observe(row, &result, event.as_ref());
                if let Some(event) = event {
                    log.record(event);
                }
                (index, result)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        results.sort_unstable_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }
}
