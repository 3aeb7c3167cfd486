//! Mutation planning
//!
//! Folds probe results back onto the snapshot they came from. The plan is
//! plain data; applying it is the tabular store's job.

use std::collections::HashMap;

use crate::address::CellAddress;
use crate::config::SheetLayout;
use crate::model::{ProbeResult, TrackedRow};
use crate::traits::{CellMutation, Indicator, StyleMutation};

/// Batched writes for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationPlan {
    /// Status, resolved date and not-found date for every matched row
    pub cells: Vec<CellMutation>,
    /// One availability indicator per matched row
    pub styles: Vec<StyleMutation>,
    /// Cell that receives `available_count`
    pub summary_cell: CellAddress,
    /// Number of matched rows whose status is `ready`
    pub available_count: usize,
}

impl MutationPlan {
    /// Number of rows the plan touches
    pub fn rows_touched(&self) -> usize {
        self.styles.len()
    }
}

/// Build the mutation plan for a run
///
/// Rows without a matching result are left untouched.
pub fn plan(rows: &[TrackedRow], results: &[ProbeResult], layout: &SheetLayout) -> MutationPlan {
    let mut by_package: HashMap<&str, &ProbeResult> = HashMap::with_capacity(results.len());
    for result in results {
        by_package.entry(result.package_id.as_str()).or_insert(result);
    }

    let mut cells = Vec::with_capacity(rows.len() * 3);
    let mut styles = Vec::with_capacity(rows.len());
    let mut available_count = 0;

    for row in rows {
        let Some(result) = by_package.get(row.package_id.as_str()) else {
            continue;
        };

        cells.push(CellMutation::new(
            row.row_number,
            layout.status_column,
            result.status.as_str(),
        ));
        cells.push(CellMutation::new(
            row.row_number,
            layout.release_date_column,
            result.resolved_date.clone(),
        ));
        cells.push(CellMutation::new(
            row.row_number,
            layout.not_found_date_column,
            result.not_found_date.clone(),
        ));

        let indicator = if result.status.is_available() {
            available_count += 1;
            Indicator::Available
        } else {
            Indicator::Unavailable
        };
        styles.push(StyleMutation {
            row: row.row_number,
            column: layout.indicator_column,
            indicator,
        });
    }

    MutationPlan {
        cells,
        styles,
        summary_cell: layout.summary_cell,
        available_count,
    }
}
