// # Memory Tabular Store
//
// In-memory implementation of TabularStore.
//
// ## Purpose
//
// Holds the worksheet in a RwLock. Nothing survives a restart. Useful for
// tests, dry runs and embedding the engine in another application.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Error;
use crate::address::CellAddress;
use crate::config::StoreConfig;
use crate::store::workbook::Workbook;
use crate::traits::tabular_store::{
    CellMutation, Indicator, LogRow, SheetRow, StyleMutation, TabularStore, TabularStoreFactory,
};

/// In-memory tabular store
///
/// # Example
///
/// ```rust,no_run
/// use storewatch_core::store::MemoryTabularStore;
/// use storewatch_core::traits::TabularStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryTabularStore::with_rows(vec![
///         vec!["1".into(), "".into(), "".into(), "".into(), "".into(), "".into(), "".into(), "com.example".into()],
///     ]);
///
///     let rows = store.read_rows().await?;
///     assert_eq!(rows[0].row_number, 2);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryTabularStore {
    inner: Arc<RwLock<Workbook>>,
}

impl MemoryTabularStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from a workbook
    pub fn from_workbook(workbook: Workbook) -> Self {
        Self {
            inner: Arc::new(RwLock::new(workbook)),
        }
    }

    /// Create a store with an empty header row and the given data rows
    pub fn with_rows(data: Vec<Vec<String>>) -> Self {
        Self::from_workbook(Workbook::new(Vec::new(), data))
    }

    /// Copy of the current workbook
    pub async fn workbook(&self) -> Workbook {
        self.inner.read().await.clone()
    }

    /// Cell text at an address
    pub async fn cell(&self, address: &str) -> Option<String> {
        let address = CellAddress::parse(address).ok()?;
        self.inner.read().await.cell(&address).map(str::to_string)
    }

    /// Indicator at an address
    pub async fn style(&self, address: &str) -> Option<Indicator> {
        let address = CellAddress::parse(address).ok()?;
        self.inner.read().await.style(&address)
    }

    /// Change log rows including the header, `None` if never written
    pub async fn log_rows(&self) -> Option<Vec<Vec<String>>> {
        self.inner.read().await.log.clone()
    }
}

#[async_trait]
impl TabularStore for MemoryTabularStore {
    async fn read_rows(&self) -> Result<Vec<SheetRow>, Error> {
        Ok(self.inner.read().await.data_rows())
    }

    async fn apply_cell_mutations(&self, cells: &[CellMutation]) -> Result<(), Error> {
        self.inner.write().await.apply_cells(cells);
        Ok(())
    }

    async fn apply_style_mutations(&self, styles: &[StyleMutation]) -> Result<(), Error> {
        self.inner.write().await.apply_styles(styles);
        Ok(())
    }

    async fn append_log_rows(&self, rows: &[LogRow]) -> Result<(), Error> {
        self.inner.write().await.append_log(rows);
        Ok(())
    }

    async fn set_cell(&self, address: &CellAddress, value: &str) -> Result<(), Error> {
        self.inner.write().await.set_cell(address, value);
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for in-memory stores
pub struct MemoryTabularStoreFactory;

#[async_trait]
impl TabularStoreFactory for MemoryTabularStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn TabularStore>, Error> {
        match config {
            StoreConfig::Memory => Ok(Box::new(MemoryTabularStore::new())),
            _ => Err(Error::config("Invalid config for memory store")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package_row(seq: &str, package: &str) -> Vec<String> {
        let mut cells = vec![String::new(); 8];
        cells[0] = seq.to_string();
        cells[7] = package.to_string();
        cells
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryTabularStore::with_rows(vec![package_row("1", "com.a")]);

        let rows = store.read_rows().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cell(7), "com.a");

        store
            .apply_cell_mutations(&[CellMutation::new(2, 3, "ready")])
            .await
            .unwrap();
        assert_eq!(store.cell("D2").await.as_deref(), Some("ready"));

        store
            .apply_style_mutations(&[StyleMutation {
                row: 2,
                column: 0,
                indicator: Indicator::Available,
            }])
            .await
            .unwrap();
        assert_eq!(store.style("A2").await, Some(Indicator::Available));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryTabularStore::new();
        let clone = store.clone();
        clone
            .set_cell(&CellAddress::parse("J2").unwrap(), "3")
            .await
            .unwrap();
        assert_eq!(store.cell("J2").await.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_factory_rejects_other_configs() {
        let factory = MemoryTabularStoreFactory;
        assert!(factory.create(&StoreConfig::Memory).await.is_ok());
        assert!(
            factory
                .create(&StoreConfig::File { path: "x".into() })
                .await
                .is_err()
        );
    }
}
