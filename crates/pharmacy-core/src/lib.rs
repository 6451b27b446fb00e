//! Pharmacy Inventory Core Library
//!
//! Data layer for a single-user pharmacy inventory: products, branches,
//! per-branch stock and the history of stock movements, persisted as flat
//! semicolon-delimited text files.
//!
//! # Architecture
//!
//! ```text
//!   medicines  analogues  pharmacies  stock  inventory_operations   (*.txt)
//!       │          │          │         │             │
//!       └──────────┴──────────┴────┬────┴─────────────┘
//!                                  │
//!                 TextStore (load_all / save_all / append_operation)
//!                                  │
//!                           PharmacyManager
//!            ┌─────────────────────┼─────────────────────┐
//!            │                     │                     │
//!     ProductCatalog     OrderedIndex<Pharmacy>     operation log
//!   (+ expiry archive)     each with a Storage     Supply/Return/WriteOff
//! ```
//!
//! # Core Principle
//!
//! **Operations record history; ledgers record quantity.** Processing an
//! operation never changes a stock ledger, and a ledger never holds a
//! zero-quantity entry.
//!
//! # Modules
//!
//! - [`models`]: Domain types (Product, Pharmacy, Storage, InventoryOperation, etc.)
//! - [`index`]: Unbalanced binary search tree with cursor navigation
//! - [`manager`]: Catalog, branch index and operation log
//! - [`store`]: Record codec and flat-file loading/saving
//! - [`config`]: Data directory and file names
//! - [`export`]: Stock report export
//! - [`logging`]: `tracing` subscriber setup

pub mod config;
pub mod export;
pub mod index;
pub mod logging;
pub mod manager;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use config::StoreConfig;
pub use export::StockReport;
pub use index::{Cursor, IndexError, OrderedIndex};
pub use manager::{Availability, PharmacyManager};
pub use models::{
    DateValue, DomainError, InventoryOperation, OperationKind, OperationStatus, Pharmacy,
    Product, ProductKind, ProductRef, Storage,
};
pub use store::{LoadSummary, StoreError, TextStore};

use tracing::info;

// =========================================================================
// Error Type
// =========================================================================

#[derive(Debug, thiserror::Error)]
pub enum PharmacyError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type PharmacyResult<T> = Result<T, PharmacyError>;

// =========================================================================
// Session
// =========================================================================

/// An open inventory: the in-memory state plus the store it came from.
///
/// Not `Send`; products are shared through `Rc`.
pub struct PharmacySession {
    store: TextStore,
    manager: PharmacyManager,
    summary: LoadSummary,
}

impl PharmacySession {
    /// Load everything from the files named by `config`.
    ///
    /// Missing files mean empty state; malformed lines are skipped.
    pub fn open(config: StoreConfig) -> PharmacyResult<Self> {
        config.validate()?;
        let store = TextStore::new(config);
        let mut manager = PharmacyManager::new();
        let summary = store.load_all(&mut manager)?;

        info!(
            dir = %store.config().data_dir.display(),
            products = manager.catalog().len(),
            pharmacies = manager.pharmacy_count(),
            operations = manager.operations().len(),
            "inventory opened"
        );

        Ok(Self {
            store,
            manager,
            summary,
        })
    }

    /// Open with configuration from the environment.
    pub fn open_from_env() -> PharmacyResult<Self> {
        Self::open(StoreConfig::from_env())
    }

    pub fn store(&self) -> &TextStore {
        &self.store
    }

    pub fn manager(&self) -> &PharmacyManager {
        &self.manager
    }

    /// Mutable state. Changes reach disk on [`PharmacySession::save`].
    pub fn manager_mut(&mut self) -> &mut PharmacyManager {
        &mut self.manager
    }

    /// What the initial load found.
    pub fn load_summary(&self) -> &LoadSummary {
        &self.summary
    }

    /// Add an operation and append it to the operations file.
    pub fn record_operation(&mut self, operation: InventoryOperation) -> PharmacyResult<()> {
        self.manager.add_operation(operation.clone())?;
        self.store.append_operation(&operation)?;
        Ok(())
    }

    /// Write off expired products and append the new write-offs.
    ///
    /// Stock cleared from branches reaches disk on the next save.
    pub fn write_off_expired(&mut self) -> PharmacyResult<Vec<String>> {
        let created = self.manager.write_off_expired()?;
        for id in &created {
            let operation = self.manager.get_operation(id)?;
            self.store.append_operation(operation)?;
        }
        Ok(created)
    }

    /// Rewrite all files from the in-memory state.
    pub fn save(&self) -> PharmacyResult<()> {
        self.store.save_all(&self.manager)?;
        Ok(())
    }

    pub fn stock_report(&self) -> StockReport {
        StockReport::from_manager(&self.manager)
    }

    /// Stock report as pretty JSON.
    pub fn stock_report_json(&self) -> PharmacyResult<String> {
        Ok(self.stock_report().to_json()?)
    }
}
