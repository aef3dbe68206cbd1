//! # Procurement Ledger
//!
//! Procurement accounting for construction contractors: a hierarchical chart
//! of accounts, purchase documents with an approval workflow, and the
//! journal vouchers and stock receipts produced when a purchase completes.
//!
//! ## Features
//!
//! - **Chart of accounts**: Tree-shaped registry with cycle-safe re-parenting and cascading deletes
//! - **Purchase workflow**: `draft -> submitted -> approved -> completed` with permission checks on every edge
//! - **Ledger posting**: Balanced journal vouchers, at most one per source document
//! - **Inventory**: Stock receipts per item and warehouse, applied all-or-nothing
//! - **Storage abstraction**: Database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use procurement_ledger::{Actor, Ledger, MemoryStorage, StaticPermissionGate};
//!
//! # async fn run() -> procurement_ledger::LedgerResult<()> {
//! let gate = StaticPermissionGate::new().grant("controller", "*");
//! let mut ledger = Ledger::new(MemoryStorage::new(), gate);
//! let controller = Actor::new("controller");
//!
//! ledger.setup_standard_chart_of_accounts(&controller).await?;
//! let report = ledger.validate_integrity(&controller).await?;
//! assert!(report.is_valid);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod inventory;
pub mod ledger;
pub mod procurement;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use auth::{authorize, Action, Actor, Capabilities, Module, PermissionGate, StaticPermissionGate};
pub use config::{PostingConfig, DEFAULT_MINOR_UNIT_SCALE};
pub use inventory::{InventoryAdjuster, ReceiptLine};
pub use ledger::{
    AccountRegistry, AccountTree, IntegrityReport, Ledger, LedgerPoster, PostingEvent, PostingLine,
    SelectOption, VoucherBuilder,
};
pub use procurement::{DocumentInput, DocumentLine, DocumentStatus, PurchaseDocument, PurchaseWorkflow};
pub use traits::*;
pub use types::*;
pub use utils::{init_tracing, MemoryStorage};
