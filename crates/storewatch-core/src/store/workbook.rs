//! Local worksheet model shared by the memory and file stores

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::CellAddress;
use crate::traits::{CellMutation, Indicator, LOG_HEADER, LogRow, SheetRow, StyleMutation};

/// A tracked worksheet plus its change log sheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    /// Every row of the tracked worksheet; row 1 is the header
    #[serde(default)]
    pub rows: Vec<Vec<String>>,

    /// Cell indicators keyed by A1 address
    #[serde(default)]
    pub styles: BTreeMap<String, Indicator>,

    /// Change log sheet, absent until the first append
    #[serde(default)]
    pub log: Option<Vec<Vec<String>>>,
}

impl Workbook {
    /// Create a workbook from a header and data rows
    pub fn new(header: Vec<String>, data: Vec<Vec<String>>) -> Self {
        let mut rows = Vec::with_capacity(data.len() + 1);
        rows.push(header);
        rows.extend(data);
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Data rows (header excluded) with their sheet row numbers
    pub fn data_rows(&self) -> Vec<SheetRow> {
        self.rows
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, cells)| SheetRow::new(i as u32 + 1, cells.clone()))
            .collect()
    }

    /// Cell text, `None` outside the written area
    pub fn cell(&self, address: &CellAddress) -> Option<&str> {
        let index = (address.row as usize).checked_sub(1)?;
        self.rows
            .get(index)
            .and_then(|row| row.get(address.column))
            .map(String::as_str)
    }

    /// Write one cell, growing the grid as needed
    pub fn set_cell(&mut self, address: &CellAddress, value: &str) {
        let row_index = (address.row as usize).saturating_sub(1);
        if self.rows.len() <= row_index {
            self.rows.resize_with(row_index + 1, Vec::new);
        }
        let row = &mut self.rows[row_index];
        if row.len() <= address.column {
            row.resize(address.column + 1, String::new());
        }
        row[address.column] = value.to_string();
    }

    /// Apply a batch of cell writes
    pub fn apply_cells(&mut self, cells: &[CellMutation]) {
        for cell in cells {
            self.set_cell(&cell.address(), &cell.value);
        }
    }

    /// Apply a batch of indicator writes
    pub fn apply_styles(&mut self, styles: &[StyleMutation]) {
        for style in styles {
            self.styles
                .insert(style.address().to_string(), style.indicator);
        }
    }

    /// Indicator shown on a cell
    pub fn style(&self, address: &CellAddress) -> Option<Indicator> {
        self.styles.get(&address.to_string()).copied()
    }

    /// Append change log rows, creating the log sheet with its header
    pub fn append_log(&mut self, rows: &[LogRow]) {
        let log = self
            .log
            .get_or_insert_with(|| vec![LOG_HEADER.iter().map(|h| h.to_string()).collect()]);
        log.extend(rows.iter().map(LogRow::to_cells));
    }
}
