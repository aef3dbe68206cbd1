//! Traits for storage abstraction and extensibility

use async_trait::async_trait;

use crate::procurement::PurchaseDocument;
use crate::types::*;

/// Writes that must become visible together or not at all.
///
/// Produced by the completing transition: the document with its new status and
/// ledger reference, the voucher that reference points at, and the stock
/// increments for the received lines.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitOfWork {
    /// Document as it should be stored; its `version` is the expected stored version
    pub document: PurchaseDocument,
    /// Voucher to insert, `None` when linking a voucher that already exists
    pub voucher: Option<JournalVoucher>,
    pub stock: Vec<StockDelta>,
}

/// Storage abstraction for the procurement ledger
///
/// This trait allows the core to work with any storage backend by implementing
/// these methods. Implementations must honour two guarantees: `apply_stock_deltas`
/// and `delete_accounts` are all-or-nothing, and `commit` applies a whole
/// [`UnitOfWork`] atomically. The core never retries a failed call.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Insert a new account; fails with `Conflict` if the id or code is taken
    async fn save_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Get an account by ID
    async fn get_account(&self, account_id: &str) -> LedgerResult<Option<Account>>;

    /// Get an account by its code
    async fn get_account_by_code(&self, code: &str) -> LedgerResult<Option<Account>>;

    /// List all accounts, optionally filtered by type
    async fn list_accounts(&self, account_type: Option<AccountType>) -> LedgerResult<Vec<Account>>;

    /// Replace an existing account
    async fn update_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Remove every listed account in one step; unknown ids are ignored
    async fn delete_accounts(&mut self, account_ids: &[String]) -> LedgerResult<()>;

    /// Insert a new purchase document
    async fn save_document(&mut self, document: &PurchaseDocument) -> LedgerResult<()>;

    /// Get a purchase document by ID
    async fn get_document(&self, document_id: &str) -> LedgerResult<Option<PurchaseDocument>>;

    /// List all purchase documents
    async fn list_documents(&self) -> LedgerResult<Vec<PurchaseDocument>>;

    /// Replace a document if the stored version equals `document.version`.
    /// Returns the stored copy with its version incremented.
    async fn update_document(&mut self, document: &PurchaseDocument)
        -> LedgerResult<PurchaseDocument>;

    /// Remove a document if the stored version equals `expected_version`
    async fn delete_document(&mut self, document_id: &str, expected_version: u64)
        -> LedgerResult<()>;

    /// Insert a voucher; fails with `Conflict` if its source document already has one
    async fn save_voucher(&mut self, voucher: &JournalVoucher) -> LedgerResult<()>;

    /// Get a voucher by ID
    async fn get_voucher(&self, voucher_id: &str) -> LedgerResult<Option<JournalVoucher>>;

    /// Find the voucher posted for a source document
    async fn find_voucher_by_source(
        &self,
        source_document_id: &str,
    ) -> LedgerResult<Option<JournalVoucher>>;

    /// List all vouchers
    async fn list_vouchers(&self) -> LedgerResult<Vec<JournalVoucher>>;

    /// Insert or replace a stock row
    async fn save_inventory_item(&mut self, item: &InventoryItem) -> LedgerResult<()>;

    /// Get a stock row
    async fn get_inventory_item(
        &self,
        item_id: &str,
        warehouse_id: &str,
    ) -> LedgerResult<Option<InventoryItem>>;

    /// List every stock row
    async fn list_inventory(&self) -> LedgerResult<Vec<InventoryItem>>;

    /// Add every delta, or none if any row is missing. Returns the updated rows.
    async fn apply_stock_deltas(&mut self, deltas: &[StockDelta])
        -> LedgerResult<Vec<InventoryItem>>;

    /// Apply a unit of work atomically. Returns the stored document.
    async fn commit(&mut self, unit: UnitOfWork) -> LedgerResult<PurchaseDocument>;
}

/// Trait for implementing custom account validation rules
pub trait AccountValidator: Send + Sync {
    /// Validate an account before saving
    fn validate_account(&self, account: &Account) -> LedgerResult<()>;
}

/// Default account validator with basic rules
pub struct DefaultAccountValidator;

impl AccountValidator for DefaultAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        if account.code.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account code cannot be empty".to_string(),
            ));
        }

        if account.name.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
