// # File Tabular Store
//
// JSON-file implementation of TabularStore with crash recovery.
//
// ## Purpose
//
// Keeps the tracked worksheet on local disk, for offline operation and
// dry runs against a copy of the real sheet.
//
// The file is operator-edited input: every read and every write batch
// starts from what is on disk, so rows added between runs are probed on
// the next run and survive its writes.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "workbook": {
//     "rows": [["#", "Name", "", "Status", "", "Release", "Not found", "Package"]],
//     "styles": { "A2": "available" },
//     "log": null
//   }
// }
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::address::CellAddress;
use crate::config::StoreConfig;
use crate::store::workbook::Workbook;
use crate::traits::tabular_store::{
    CellMutation, LogRow, SheetRow, StyleMutation, TabularStore, TabularStoreFactory,
};

/// Worksheet file format version
const WORKBOOK_FILE_VERSION: &str = "1.0";

/// File-backed tabular store with crash recovery
///
/// Every write batch is applied to a fresh load of the file and
/// persisted before the call returns.
///
/// # Example
///
/// ```rust,no_run
/// use storewatch_core::store::FileTabularStore;
/// use storewatch_core::traits::TabularStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileTabularStore::new("/var/lib/storewatch/sheet.json").await?;
///     let rows = store.read_rows().await?;
///     println!("{} row(s)", rows.len());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileTabularStore {
    path: PathBuf,
    workbook: Arc<RwLock<Workbook>>,
}

/// Serializable worksheet file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct WorkbookFileFormat {
    version: String,
    workbook: Workbook,
}

impl FileTabularStore {
    /// Create or load a file store
    ///
    /// This will:
    /// 1. Try to load the existing worksheet file
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, start with an empty worksheet
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let workbook = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            workbook: Arc::new(RwLock::new(workbook)),
        })
    }

    /// Create a file store seeded with a workbook, written immediately
    pub async fn create<P: AsRef<Path>>(path: P, workbook: Workbook) -> Result<Self, Error> {
        let store = Self::new(path).await?;
        store.persist(&workbook).await?;
        *store.workbook.write().await = workbook;
        Ok(store)
    }

    /// Copy of the workbook as of the last read or write
    pub async fn workbook(&self) -> Workbook {
        self.workbook.read().await.clone()
    }

    /// Reload from disk, apply `change` and persist
    ///
    /// The write lock is held across the whole cycle so concurrent batches
    /// from this process never overwrite each other.
    async fn update<F>(&self, change: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Workbook),
    {
        let mut workbook = self.workbook.write().await;
        *workbook = Self::load_with_recovery(&self.path).await?;
        change(&mut workbook);
        self.persist(&workbook).await
    }

    /// Load the workbook with automatic recovery
    async fn load_with_recovery(path: &Path) -> Result<Workbook, Error> {
        match Self::load(path).await {
            Ok(workbook) => {
                tracing::debug!("Loaded worksheet file: {} row(s)", workbook.rows.len());
                Ok(workbook)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Worksheet file appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with an empty worksheet.");
                    return Ok(Workbook::default());
                }

                match Self::load(&backup_path).await {
                    Ok(workbook) => {
                        tracing::info!(
                            "Recovered worksheet from backup: {} row(s)",
                            workbook.rows.len()
                        );
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore worksheet file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(workbook)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also corrupted: {}. Starting with an empty worksheet.",
                            backup_err
                        );
                        Ok(Workbook::default())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load the workbook from a file
    async fn load(path: &Path) -> Result<Workbook, Error> {
        if !path.exists() {
            tracing::debug!("Worksheet file does not exist: {}", path.display());
            return Ok(Workbook::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::tabular_store(format!(
                "Failed to read worksheet file {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: WorkbookFileFormat = serde_json::from_str(&content)?;

        if file.version != WORKBOOK_FILE_VERSION {
            tracing::warn!(
                "Worksheet file version mismatch: expected {}, got {}. Attempting to load anyway.",
                WORKBOOK_FILE_VERSION,
                file.version
            );
        }

        Ok(file.workbook)
    }

    /// Write the workbook to disk atomically
    async fn persist(&self, workbook: &Workbook) -> Result<(), Error> {
        let file = WorkbookFileFormat {
            version: WORKBOOK_FILE_VERSION.to_string(),
            workbook: workbook.clone(),
        };

        let json = serde_json::to_string_pretty(&file)?;

        let temp_path = self.temp_path();
        {
            let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::tabular_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            temp.write_all(json.as_bytes()).await.map_err(|e| {
                Error::tabular_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            temp.flush().await.map_err(|e| {
                Error::tabular_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::tabular_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Worksheet written to file: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl TabularStore for FileTabularStore {
    async fn read_rows(&self) -> Result<Vec<SheetRow>, Error> {
        let mut workbook = self.workbook.write().await;
        *workbook = Self::load_with_recovery(&self.path).await?;
        Ok(workbook.data_rows())
    }

    async fn apply_cell_mutations(&self, cells: &[CellMutation]) -> Result<(), Error> {
        self.update(|workbook| workbook.apply_cells(cells)).await
    }

    async fn apply_style_mutations(&self, styles: &[StyleMutation]) -> Result<(), Error> {
        self.update(|workbook| workbook.apply_styles(styles)).await
    }

    async fn append_log_rows(&self, rows: &[LogRow]) -> Result<(), Error> {
        self.update(|workbook| workbook.append_log(rows)).await
    }

    async fn set_cell(&self, address: &CellAddress, value: &str) -> Result<(), Error> {
        self.update(|workbook| workbook.set_cell(address, value)).await
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}

/// Factory for file stores
pub struct FileTabularStoreFactory;

#[async_trait]
impl TabularStoreFactory for FileTabularStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn TabularStore>, Error> {
        match config {
            StoreConfig::File { path } => Ok(Box::new(FileTabularStore::new(path).await?)),
            _ => Err(Error::config("Invalid config for file store")),
        }
    }
}
