//! Data model for one reconciliation run
//!
//! [`TrackedRow`]s are read from the tabular store, turned into
//! [`ProbeResult`]s by the probe adapter, and compared to decide whether a
//! [`ChangeEvent`] fires.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::SheetLayout;
use crate::traits::{LogRow, SheetRow};

/// Canonical calendar date format used in every written cell
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format a date the way it is written to the sheet
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Availability status produced by a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Listed in the store
    Ready,
    /// Not listed (removed, banned or unreachable)
    Ban,
}

impl Status {
    /// Cell text for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ready => "ready",
            Status::Ban => "ban",
        }
    }

    /// Whether the package is available
    pub fn is_available(&self) -> bool {
        matches!(self, Status::Ready)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status recorded in the sheet before this run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PriorStatus {
    /// Empty cell: never checked
    Unchecked,
    /// `ready`
    Ready,
    /// `ban`
    Ban,
    /// Anything else an operator typed into the cell
    Unrecognized(String),
}

impl PriorStatus {
    /// Parse a status cell
    pub fn parse(cell: &str) -> Self {
        match cell.trim() {
            "" => PriorStatus::Unchecked,
            "ready" => PriorStatus::Ready,
            "ban" => PriorStatus::Ban,
            other => PriorStatus::Unrecognized(other.to_string()),
        }
    }
}

impl From<Status> for PriorStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Ready => PriorStatus::Ready,
            Status::Ban => PriorStatus::Ban,
        }
    }
}

impl fmt::Display for PriorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorStatus::Unchecked => f.write_str("<unchecked>"),
            PriorStatus::Ready => f.write_str("ready"),
            PriorStatus::Ban => f.write_str("ban"),
            PriorStatus::Unrecognized(s) => write!(f, "{:?}", s),
        }
    }
}

/// A tracked package as read from the sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedRow {
    /// 1-based sheet row
    pub row_number: u32,
    /// Opaque sequence number (reporting only)
    pub sequence_number: String,
    /// Store package identifier
    pub package_id: String,
    /// Status before this run
    pub status: PriorStatus,
    /// Previously recorded release date
    pub release_date: String,
    /// Previously recorded first-unavailable date
    pub not_found_date: String,
}

impl TrackedRow {
    /// Extract a tracked row, or `None` when the row is too short or has
    /// no package identifier
    pub fn from_sheet_row(row: &SheetRow, layout: &SheetLayout) -> Option<Self> {
        if row.cells.len() < layout.min_row_len() {
            return None;
        }

        let package_id = row.cell(layout.package_column).trim();
        if package_id.is_empty() {
            return None;
        }

        Some(Self {
            row_number: row.row_number,
            sequence_number: row.cell(layout.sequence_column).to_string(),
            package_id: package_id.to_string(),
            status: PriorStatus::parse(row.cell(layout.status_column)),
            release_date: row.cell(layout.release_date_column).to_string(),
            not_found_date: row.cell(layout.not_found_date_column).to_string(),
        })
    }
}

/// Every trackable row of a snapshot, in sheet order
pub fn tracked_rows(snapshot: &[SheetRow], layout: &SheetLayout) -> Vec<TrackedRow> {
    snapshot
        .iter()
        .filter_map(|row| TrackedRow::from_sheet_row(row, layout))
        .collect()
}

/// Fresh status of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Store package identifier
    pub package_id: String,
    /// Probed status
    pub status: Status,
    /// Release date (or the carried-forward one when unavailable)
    pub resolved_date: String,
    /// First-unavailable date, empty while available
    pub not_found_date: String,
}

/// Kind of availability transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// First time the row was checked
    NewListing,
    /// Unavailable package is listed again
    Restored,
    /// Available package disappeared
    Banned,
}

impl ChangeType {
    /// Stable code written to the change log
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::NewListing => "new_listing",
            ChangeType::Restored => "restored",
            ChangeType::Banned => "banned",
        }
    }

    /// Operator-facing description
    pub fn label(&self) -> &'static str {
        match self {
            ChangeType::NewListing => "New app added",
            ChangeType::Restored => "App is back in the store",
            ChangeType::Banned => "App banned",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected transition, destined for the change log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Run date
    pub timestamp: NaiveDate,
    /// Kind of transition
    pub change_type: ChangeType,
    /// Sequence number of the tracked row
    pub sequence_number: String,
    /// Store package identifier
    pub package_id: String,
}

impl ChangeEvent {
    /// Build the change log row for this event
    pub fn to_log_row(&self) -> LogRow {
        LogRow {
            date: format_date(self.timestamp),
            change_type: self.change_type.as_str().to_string(),
            sequence_number: self.sequence_number.clone(),
            package_id: self.package_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet_row(cells: &[&str]) -> SheetRow {
        SheetRow::new(2, cells.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn parses_prior_status() {
        assert_eq!(PriorStatus::parse(""), PriorStatus::Unchecked);
        assert_eq!(PriorStatus::parse("  "), PriorStatus::Unchecked);
        assert_eq!(PriorStatus::parse("ready"), PriorStatus::Ready);
        assert_eq!(PriorStatus::parse("ban "), PriorStatus::Ban);
        assert_eq!(
            PriorStatus::parse("paused"),
            PriorStatus::Unrecognized("paused".into())
        );
    }

    #[test]
    fn extracts_tracked_row() {
        let row = sheet_row(&["1", "name", "", "ban", "", "2023-01-01", "2024-02-02", "com.app.one"]);
        let tracked = TrackedRow::from_sheet_row(&row, &SheetLayout::default()).unwrap();
        assert_eq!(tracked.row_number, 2);
        assert_eq!(tracked.sequence_number, "1");
        assert_eq!(tracked.package_id, "com.app.one");
        assert_eq!(tracked.status, PriorStatus::Ban);
        assert_eq!(tracked.release_date, "2023-01-01");
        assert_eq!(tracked.not_found_date, "2024-02-02");
    }

    #[test]
    fn skips_short_rows_and_empty_packages() {
        let layout = SheetLayout::default();
        let short = sheet_row(&["1", "", "", "", "", "", "com.app"]);
        let empty = sheet_row(&["2", "", "", "", "", "", "", ""]);
        let blank = sheet_row(&["3", "", "", "", "", "", "", "   "]);
        assert!(TrackedRow::from_sheet_row(&short, &layout).is_none());
        assert!(TrackedRow::from_sheet_row(&empty, &layout).is_none());
        assert!(TrackedRow::from_sheet_row(&blank, &layout).is_none());
        assert!(tracked_rows(&[short, empty, blank], &layout).is_empty());
    }

    #[test]
    fn change_event_log_row() {
        let event = ChangeEvent {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            change_type: ChangeType::Restored,
            sequence_number: "12".into(),
            package_id: "com.app".into(),
        };
        let row = event.to_log_row();
        assert_eq!(row.date, "2024-03-09");
        assert_eq!(row.change_type, "restored");
        assert_eq!(row.sequence_number, "12");
    }
}
