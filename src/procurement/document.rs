//! Purchase document model and transition table

use std::fmt;

use bigdecimal::{BigDecimal, RoundingMode, Zero};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::auth::{Action, Module};
use crate::config::DEFAULT_MINOR_UNIT_SCALE;
use crate::types::{LedgerError, LedgerResult};

/// Purchase document status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    Submitted,
    Approved,
    Completed,
    Cancelled,
}

static EDIT: [(Module, Action); 1] = [(Module::PurchaseOrders, Action::Edit)];
static COMPLETE: [(Module, Action); 3] = [
    (Module::PurchaseOrders, Action::Edit),
    (Module::Inventory, Action::Edit),
    (Module::JournalVouchers, Action::Create),
];

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 5] = [
        DocumentStatus::Draft,
        DocumentStatus::Submitted,
        DocumentStatus::Approved,
        DocumentStatus::Completed,
        DocumentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Submitted => "submitted",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Cancelled)
    }

    /// Permissions needed to move from `self` to `to`, or `None` if the edge is not in the table.
    pub fn required_permissions(&self, to: DocumentStatus) -> Option<&'static [(Module, Action)]> {
        use DocumentStatus::*;
        match (self, to) {
            (Draft, Submitted) | (Submitted, Approved) => Some(&EDIT[..]),
            (Approved, Completed) => Some(&COMPLETE[..]),
            (Draft | Submitted | Approved, Cancelled) => Some(&EDIT[..]),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, to: DocumentStatus) -> bool {
        self.required_permissions(to).is_some()
    }

    /// Every status reachable in one legal step
    pub fn next_states(&self) -> impl Iterator<Item = DocumentStatus> + '_ {
        Self::ALL
            .into_iter()
            .filter(move |to| self.can_transition_to(*to))
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purchase document line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLine {
    pub description: String,
    /// Stock item received into the document's warehouse on completion
    pub item_id: Option<String>,
    /// Explicit debit account; overrides the inventory/expense default
    pub account_code: Option<String>,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
}

impl DocumentLine {
    /// Non-stock line (services, subcontract labour, hire)
    pub fn new(description: impl Into<String>, quantity: BigDecimal, unit_price: BigDecimal) -> Self {
        Self {
            description: description.into(),
            item_id: None,
            account_code: None,
            quantity,
            unit_price,
        }
    }

    pub fn with_item(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn with_account(mut self, account_code: impl Into<String>) -> Self {
        self.account_code = Some(account_code.into());
        self
    }

    /// `quantity × unit_price`, rounded half-even to `scale` decimal places
    pub fn amount(&self, scale: i64) -> BigDecimal {
        (&self.quantity * &self.unit_price).with_scale_round(scale, RoundingMode::HalfEven)
    }
}

/// Caller-supplied content of a draft document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInput {
    pub counterparty_name: String,
    pub project_name: String,
    pub warehouse_id: String,
    pub date: NaiveDate,
    pub lines: Vec<DocumentLine>,
}

/// Purchase order moving through the procurement lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseDocument {
    pub id: String,
    /// Supplier the goods or services are bought from
    pub counterparty_name: String,
    pub project_name: String,
    /// Warehouse stocked lines are received into
    pub warehouse_id: String,
    pub date: NaiveDate,
    pub status: DocumentStatus,
    pub lines: Vec<DocumentLine>,
    /// Voucher created on completion; set iff `status == Completed`
    pub ledger_reference: Option<String>,
    /// Stored version, incremented on every write
    pub version: u64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl PurchaseDocument {
    /// New draft with a generated id
    pub fn new(input: DocumentInput) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            counterparty_name: input.counterparty_name,
            project_name: input.project_name,
            warehouse_id: input.warehouse_id,
            date: input.date,
            status: DocumentStatus::Draft,
            lines: input.lines,
            ledger_reference: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the editable content of a draft
    pub fn apply_input(&mut self, input: DocumentInput) {
        self.counterparty_name = input.counterparty_name;
        self.project_name = input.project_name;
        self.warehouse_id = input.warehouse_id;
        self.date = input.date;
        self.lines = input.lines;
        self.updated_at = chrono::Utc::now().naive_utc();
    }

    /// Sum of line amounts rounded at [`DEFAULT_MINOR_UNIT_SCALE`].
    ///
    /// Postings round at `PostingConfig::minor_unit_scale`; use
    /// [`total_with_scale`](Self::total_with_scale) when that differs from the default.
    pub fn total(&self) -> BigDecimal {
        self.total_with_scale(DEFAULT_MINOR_UNIT_SCALE)
    }

    pub fn total_with_scale(&self, scale: i64) -> BigDecimal {
        self.lines.iter().map(|l| l.amount(scale)).sum()
    }

    /// Reject anything outside the transition table
    pub fn ensure_transition(&self, to: DocumentStatus) -> LedgerResult<()> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(LedgerError::InvalidTransition {
                from: self.status,
                to,
            })
        }
    }

    /// Checks applied when leaving draft. Drafts themselves may be incomplete.
    ///
    /// The total at `scale` must be positive, since a zero posting cannot complete.
    pub fn validate_for_submission(&self, scale: i64) -> LedgerResult<()> {
        if self.lines.is_empty() {
            return Err(LedgerError::validation(
                "purchase document must have at least one line",
            ));
        }

        for (idx, line) in self.lines.iter().enumerate() {
            if line.quantity <= BigDecimal::zero() {
                return Err(LedgerError::validation(format!(
                    "line {}: quantity must be positive",
                    idx + 1
                )));
            }
            if line.unit_price < BigDecimal::zero() {
                return Err(LedgerError::validation(format!(
                    "line {}: unit price cannot be negative",
                    idx + 1
                )));
            }
        }

        if self.total_with_scale(scale).is_zero() {
            return Err(LedgerError::validation(format!(
                "document total must be positive at {} decimal places",
                scale
            )));
        }

        Ok(())
    }

    /// Move to `to`, stamping the update time. Does not check the table.
    pub(crate) fn set_status(&mut self, to: DocumentStatus, ledger_reference: Option<String>) {
        self.status = to;
        self.ledger_reference = ledger_reference;
        self.updated_at = chrono::Utc::now().naive_utc();
    }
}
