// # Tabular Store Trait
//
// Defines the interface to the spreadsheet that holds the tracked packages.
//
// ## Purpose
//
// The tabular store is the system of record. Each run reads one snapshot
// of the tracked rows, then writes back in a handful of batched calls:
// cell values, row indicators, the available-count summary cell and the
// change log.
//
// ## Implementations
//
// - Google Sheets: `storewatch-sheets` crate
// - In-memory: `store::MemoryTabularStore`
// - JSON file: `store::FileTabularStore`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::CellAddress;

/// Header written to a freshly created change log sheet
pub const LOG_HEADER: [&str; 4] = ["Change date", "Change type", "App number", "Package"];

/// One data row of the tracked-packages sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow {
    /// 1-based sheet row number this row was read from
    pub row_number: u32,
    /// Cell values, left to right
    pub cells: Vec<String>,
}

impl SheetRow {
    /// Create a new sheet row
    pub fn new(row_number: u32, cells: Vec<String>) -> Self {
        Self { row_number, cells }
    }

    /// Cell text at `column`, or `""` past the end of the row
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

/// A single cell write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellMutation {
    /// 1-based row number
    pub row: u32,
    /// 0-based column index
    pub column: usize,
    /// New cell text
    pub value: String,
}

impl CellMutation {
    /// Create a new cell mutation
    pub fn new(row: u32, column: usize, value: impl Into<String>) -> Self {
        Self {
            row,
            column,
            value: value.into(),
        }
    }

    /// Address of the target cell
    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.row, self.column)
    }
}

/// Binary availability indicator shown on a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Indicator {
    /// Package is listed
    Available,
    /// Package is not listed
    Unavailable,
}

impl Indicator {
    /// Background colour as `(red, green, blue)` fractions
    pub fn rgb(&self) -> (f64, f64, f64) {
        match self {
            Indicator::Available => (0.8, 1.0, 0.8),
            Indicator::Unavailable => (1.0, 0.8, 0.8),
        }
    }
}

/// A single cell style write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleMutation {
    /// 1-based row number
    pub row: u32,
    /// 0-based column index of the indicator cell
    pub column: usize,
    /// Indicator to show
    pub indicator: Indicator,
}

impl StyleMutation {
    /// Address of the target cell
    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.row, self.column)
    }
}

/// One appended row of the change log sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRow {
    /// Run date (`YYYY-MM-DD`)
    pub date: String,
    /// Change type code
    pub change_type: String,
    /// Sequence number of the tracked row
    pub sequence_number: String,
    /// Package identifier
    pub package_id: String,
}

impl LogRow {
    /// Cell values in sheet column order
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.change_type.clone(),
            self.sequence_number.clone(),
            self.package_id.clone(),
        ]
    }
}

/// Trait for tabular store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Batching
///
/// Every write method receives the complete batch for one run. Each call
/// is independent: a failure in one category must not undo another.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Read every data row (header excluded), in sheet order
    async fn read_rows(&self) -> Result<Vec<SheetRow>, crate::Error>;

    /// Write a batch of cell values
    async fn apply_cell_mutations(&self, cells: &[CellMutation]) -> Result<(), crate::Error>;

    /// Write a batch of row indicators
    async fn apply_style_mutations(&self, styles: &[StyleMutation]) -> Result<(), crate::Error>;

    /// Append rows to the change log sheet, creating it with
    /// [`LOG_HEADER`] if it does not exist yet
    async fn append_log_rows(&self, rows: &[LogRow]) -> Result<(), crate::Error>;

    /// Write a single cell
    async fn set_cell(&self, address: &CellAddress, value: &str) -> Result<(), crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing tabular stores from configuration
#[async_trait]
pub trait TabularStoreFactory: Send + Sync {
    /// Create a TabularStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::StoreConfig,
    ) -> Result<Box<dyn TabularStore>, crate::Error>;
}
