//! Core types and data structures for the procurement ledger

use bigdecimal::{BigDecimal, Zero};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::auth::{Action, Module};
use crate::procurement::DocumentStatus;

/// Account types following standard accounting principles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Assets - what the business owns (Cash, Materials Inventory, Plant, etc.)
    Asset,
    /// Liabilities - what the business owes (Accounts Payable, Retentions, etc.)
    Liability,
    /// Equity - owner's interest in the business
    Equity,
    /// Revenue - contract billings and other income
    Revenue,
    /// Expenses - job costs and overheads
    Expense,
}

impl AccountType {
    /// Returns the normal balance type for this account type
    /// Assets and Expenses normally have debit balances
    /// Liabilities, Equity, and Revenue normally have credit balances
    pub fn normal_balance(&self) -> EntryType {
        match self {
            AccountType::Asset | AccountType::Expense => EntryType::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                EntryType::Credit
            }
        }
    }
}

/// Side of a voucher line in double-entry bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    Debit,
    Credit,
}

/// Node of the chart of accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for the account
    pub id: String,
    /// Unique, sortable account code (e.g. "1300"); immutable after creation
    pub code: String,
    /// Human-readable account name
    pub name: String,
    /// Type of account (Asset, Liability, etc.)
    pub account_type: AccountType,
    /// Optional parent account for hierarchical chart of accounts
    pub parent_id: Option<String>,
    /// When the account was created
    pub created_at: NaiveDateTime,
    /// When the account was last updated
    pub updated_at: NaiveDateTime,
}

impl Account {
    /// Create a new account with a freshly generated id
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
        parent_id: Option<String>,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code: code.into(),
            name: name.into(),
            account_type,
            parent_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for creating an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub parent_id: Option<String>,
}

impl NewAccount {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
        parent_id: Option<String>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            account_type,
            parent_id,
        }
    }
}

/// Mutable fields of an account. The code is deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub name: String,
    pub account_type: AccountType,
    pub parent_id: Option<String>,
}

/// One line of a journal voucher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherLine {
    /// Account being affected
    pub account_id: String,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
}

impl VoucherLine {
    /// Create a debit line
    pub fn debit(account_id: impl Into<String>, amount: BigDecimal) -> Self {
        Self {
            account_id: account_id.into(),
            debit: amount,
            credit: BigDecimal::zero(),
        }
    }

    /// Create a credit line
    pub fn credit(account_id: impl Into<String>, amount: BigDecimal) -> Self {
        Self {
            account_id: account_id.into(),
            debit: BigDecimal::zero(),
            credit: amount,
        }
    }

    /// The side carrying the non-zero amount, if exactly one does
    pub fn side(&self) -> Option<EntryType> {
        match (self.debit.is_zero(), self.credit.is_zero()) {
            (false, true) => Some(EntryType::Debit),
            (true, false) => Some(EntryType::Credit),
            _ => None,
        }
    }
}

/// Balanced double-entry record created by the ledger poster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalVoucher {
    /// Unique identifier for the voucher
    pub id: String,
    /// Document that caused the posting; doubles as the idempotency key
    pub source_document_id: Option<String>,
    /// Accounting date of the posting
    pub date: NaiveDate,
    pub description: String,
    pub lines: Vec<VoucherLine>,
    pub created_at: NaiveDateTime,
}

impl JournalVoucher {
    /// Calculate total debits
    pub fn total_debits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.debit).sum()
    }

    /// Calculate total credits
    pub fn total_credits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.credit).sum()
    }

    /// Check if the voucher is balanced (debits = credits)
    pub fn is_balanced(&self) -> bool {
        self.total_debits() == self.total_credits()
    }
}

/// Stock row of the inventory catalog, keyed by item and warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub item_id: String,
    pub warehouse_id: String,
    pub name: String,
    pub on_hand: BigDecimal,
}

impl InventoryItem {
    pub fn new(
        item_id: impl Into<String>,
        warehouse_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            warehouse_id: warehouse_id.into(),
            name: name.into(),
            on_hand: BigDecimal::zero(),
        }
    }
}

/// Positive quantity to add to one stock row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockDelta {
    pub item_id: String,
    pub warehouse_id: String,
    pub quantity: BigDecimal,
}

/// Errors that can occur in the procurement ledger
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },
    #[error("Permission denied: {module}.{action}")]
    PermissionDenied { module: Module, action: Action },
    #[error("Unbalanced posting: debits = {debits}, credits = {credits}")]
    UnbalancedPosting {
        debits: BigDecimal,
        credits: BigDecimal,
    },
    #[error("Unknown account: {0}")]
    UnknownAccount(String),
    #[error("Unknown inventory item '{item_id}' in warehouse '{warehouse_id}'")]
    UnknownItem {
        item_id: String,
        warehouse_id: String,
    },
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Rejections the caller can correct and retry without touching stored data
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LedgerError::Validation(_)
                | LedgerError::InvalidTransition { .. }
                | LedgerError::PermissionDenied { .. }
                | LedgerError::Conflict(_)
        )
    }

    /// Failures that point at inconsistent reference data
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            LedgerError::UnbalancedPosting { .. }
                | LedgerError::UnknownAccount(_)
                | LedgerError::UnknownItem { .. }
        )
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
