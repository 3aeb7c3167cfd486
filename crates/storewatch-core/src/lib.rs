// # storewatch-core
//
// Core library for the storewatch app availability monitor.
//
// ## Architecture Overview
//
// This library reconciles a spreadsheet of tracked app packages against a
// public app store:
// - **StoreProbe**: Trait for looking up one package in an app store
// - **TabularStore**: Trait for reading tracked rows and applying batched writes
// - **MonitorEngine**: Core engine that orchestrates snapshot → probe → write
// - **ChangeLogBuffer**: Collects change events and flushes them once per run
// - **ComponentRegistry**: Plugin-based registry for probes and stores
//
// ## Design Principles
//
// 1. **Single Snapshot**: The sheet is read once per run and never re-read
// 2. **Bounded Concurrency**: At most `workers` probes are in flight
// 3. **Batched Writes**: One call per write category, failures isolated
// 4. **Library-First**: All core functionality can be used as a library

pub mod address;
pub mod changelog;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod model;
pub mod registry;
pub mod store;
pub mod timestamp;
pub mod traits;

// Re-export core types for convenience
pub use address::CellAddress;
pub use changelog::ChangeLogBuffer;
pub use config::{EngineConfig, MonitorConfig, ProbeConfig, SheetLayout, StoreConfig};
pub use credentials::Credentials;
pub use engine::{EngineEvent, MonitorEngine, RunReport, WriteCategory, WriteFailure};
pub use error::{Error, Result};
pub use model::{ChangeEvent, ChangeType, PriorStatus, ProbeResult, Status, TrackedRow};
pub use registry::ComponentRegistry;
pub use store::{FileTabularStore, MemoryTabularStore, Workbook};
pub use traits::{AppMetadata, DateValue, StoreProbe, TabularStore};
