//! Collaborator traits for storewatch
//!
//! The reconciliation engine talks to the outside world only through
//! these interfaces.
//!
//! - [`StoreProbe`]: Look up a single package in an app store
//! - [`TabularStore`]: Read the tracked rows and apply batched writes

pub mod store_probe;
pub mod tabular_store;

pub use store_probe::{AppMetadata, DateValue, StoreProbe, StoreProbeFactory};
pub use tabular_store::{
    CellMutation, Indicator, LOG_HEADER, LogRow, SheetRow, StyleMutation, TabularStore,
    TabularStoreFactory,
};
