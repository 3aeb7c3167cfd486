// # Tabular Store Implementations
//
// This module provides implementations of the TabularStore trait that
// keep the worksheet locally instead of in a remote spreadsheet.

pub mod file;
pub mod memory;
pub mod workbook;

pub use file::{FileTabularStore, FileTabularStoreFactory};
pub use memory::{MemoryTabularStore, MemoryTabularStoreFactory};
pub use workbook::Workbook;
