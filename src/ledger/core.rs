//! Main ledger orchestrator that coordinates accounts, postings, stock and documents

use std::collections::{HashMap, HashSet};

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::auth::{authorize, Action, Actor, Module, PermissionGate};
use crate::config::PostingConfig;
use crate::inventory::{InventoryAdjuster, ReceiptLine};
use crate::ledger::tree::{AccountTree, SelectOption};
use crate::ledger::voucher::{LedgerPoster, PostingEvent};
use crate::ledger::AccountRegistry;
use crate::procurement::{DocumentStatus, PurchaseWorkflow};
use crate::traits::*;
use crate::types::*;

/// Permission-gated entry point over every component.
///
/// Each method names the acting [`Actor`] and consults the permission gate
/// before delegating. Purchase document operations live on [`PurchaseWorkflow`],
/// reachable through [`Ledger::documents`].
pub struct Ledger<S: LedgerStorage, G: PermissionGate> {
    accounts: AccountRegistry<S>,
    poster: LedgerPoster<S>,
    inventory: InventoryAdjuster<S>,
    workflow: PurchaseWorkflow<S, G>,
}

impl<S: LedgerStorage + Clone, G: PermissionGate> Ledger<S, G> {
    /// Create a new ledger with the given storage backend and permission gate
    pub fn new(storage: S, gate: G) -> Self {
        Self::with_config(storage, gate, PostingConfig::default())
    }

    /// Create a new ledger with a custom posting configuration
    pub fn with_config(storage: S, gate: G, config: PostingConfig) -> Self {
        Self {
            accounts: AccountRegistry::new(storage.clone()),
            poster: LedgerPoster::new(storage.clone()),
            inventory: InventoryAdjuster::new(storage.clone()),
            workflow: PurchaseWorkflow::with_config(storage, gate, config),
        }
    }

    /// Create a new ledger with a custom account validator
    pub fn with_account_validator(
        storage: S,
        gate: G,
        account_validator: Box<dyn AccountValidator>,
    ) -> Self {
        let mut ledger = Self::new(storage.clone(), gate);
        ledger.accounts = AccountRegistry::with_validator(storage, account_validator);
        ledger
    }
}

impl<S: LedgerStorage, G: PermissionGate> Ledger<S, G> {
    async fn authorize(&self, actor: &Actor, module: Module, action: Action) -> LedgerResult<()> {
        authorize(self.workflow.gate(), actor, module, action).await
    }

    /// Purchase document lifecycle
    pub fn documents(&mut self) -> &mut PurchaseWorkflow<S, G> {
        &mut self.workflow
    }

    // Account operations
    /// Create a new account
    pub async fn create_account(&mut self, actor: &Actor, account: NewAccount) -> LedgerResult<Account> {
        self.authorize(actor, Module::Accounts, Action::Create).await?;
        self.accounts.create(account).await
    }

    /// Update an account's name, type or parent
    pub async fn update_account(
        &mut self,
        actor: &Actor,
        account_id: &str,
        update: AccountUpdate,
    ) -> LedgerResult<Account> {
        self.authorize(actor, Module::Accounts, Action::Edit).await?;
        self.accounts.update(account_id, update).await
    }

    /// Delete an account together with its descendants
    pub async fn delete_account(&mut self, actor: &Actor, account_id: &str) -> LedgerResult<Vec<String>> {
        self.authorize(actor, Module::Accounts, Action::Delete).await?;
        self.accounts.delete(account_id).await
    }

    /// Get an account by ID
    pub async fn get_account(&self, actor: &Actor, account_id: &str) -> LedgerResult<Option<Account>> {
        self.authorize(actor, Module::Accounts, Action::View).await?;
        self.accounts.get(account_id).await
    }

    /// List all accounts
    pub async fn list_accounts(&self, actor: &Actor) -> LedgerResult<Vec<Account>> {
        self.authorize(actor, Module::Accounts, Action::View).await?;
        self.accounts.list().await
    }

    /// Chart of accounts as a forest, optionally filtered
    pub async fn account_tree(&self, actor: &Actor, query: &str) -> LedgerResult<AccountTree> {
        self.authorize(actor, Module::Accounts, Action::View).await?;
        Ok(self.accounts.tree().await?.filter(query))
    }

    /// Indented entries for parent and posting-target pickers
    pub async fn account_options(&self, actor: &Actor, query: &str) -> LedgerResult<Vec<SelectOption>> {
        self.authorize(actor, Module::Accounts, Action::View).await?;
        self.accounts.select_options(query).await
    }

    /// Setup the default construction chart of accounts
    pub async fn setup_standard_chart_of_accounts(
        &mut self,
        actor: &Actor,
    ) -> LedgerResult<HashMap<String, Account>> {
        self.authorize(actor, Module::Accounts, Action::Create).await?;
        crate::ledger::account::utils::seed_standard_chart(&mut self.accounts).await
    }

    // Posting operations
    /// Post a caller-supplied mapping as a journal voucher
    pub async fn post_voucher(&mut self, actor: &Actor, event: PostingEvent) -> LedgerResult<JournalVoucher> {
        self.authorize(actor, Module::JournalVouchers, Action::Create).await?;
        self.poster.post(event).await
    }

    /// Get a voucher by ID
    pub async fn get_voucher(&self, actor: &Actor, voucher_id: &str) -> LedgerResult<Option<JournalVoucher>> {
        self.authorize(actor, Module::JournalVouchers, Action::View).await?;
        self.poster.get(voucher_id).await
    }

    /// List every voucher
    pub async fn list_vouchers(&self, actor: &Actor) -> LedgerResult<Vec<JournalVoucher>> {
        self.authorize(actor, Module::JournalVouchers, Action::View).await?;
        self.poster.list().await
    }

    // Inventory operations
    /// Add a stock row to the catalog
    pub async fn register_inventory_item(
        &mut self,
        actor: &Actor,
        item: InventoryItem,
    ) -> LedgerResult<InventoryItem> {
        self.authorize(actor, Module::Inventory, Action::Create).await?;
        self.inventory.register_item(item).await
    }

    /// Receive stock outside of a purchase document
    pub async fn receive_stock(
        &mut self,
        actor: &Actor,
        warehouse_id: &str,
        lines: &[ReceiptLine],
    ) -> LedgerResult<Vec<InventoryItem>> {
        self.authorize(actor, Module::Inventory, Action::Edit).await?;
        self.inventory.receive(warehouse_id, lines).await
    }

    /// List every stock row
    pub async fn list_inventory(&self, actor: &Actor) -> LedgerResult<Vec<InventoryItem>> {
        self.authorize(actor, Module::Inventory, Action::View).await?;
        self.inventory.list().await
    }

    /// Validate the integrity of the ledger
    pub async fn validate_integrity(&self, actor: &Actor) -> LedgerResult<IntegrityReport> {
        self.authorize(actor, Module::JournalVouchers, Action::View).await?;

        let accounts = self.accounts.list().await?;
        let vouchers = self.poster.list().await?;
        let documents = self.accounts.storage.list_documents().await?;
        let scale = self.workflow.config().minor_unit_scale;

        let account_ids: HashSet<&str> = accounts.iter().map(|a| a.id.as_str()).collect();
        let by_id: HashMap<&str, &JournalVoucher> =
            vouchers.iter().map(|v| (v.id.as_str(), v)).collect();

        let mut issues = Vec::new();

        for account in &accounts {
            if let Some(parent) = &account.parent_id {
                if !account_ids.contains(parent.as_str()) {
                    issues.push(format!(
                        "Account {} references missing parent '{}'",
                        account.code, parent
                    ));
                }
            }
        }

        let mut total_debits = BigDecimal::from(0);
        let mut total_credits = BigDecimal::from(0);
        for voucher in &vouchers {
            let debits = voucher.total_debits();
            let credits = voucher.total_credits();
            if debits != credits {
                issues.push(format!(
                    "Voucher {} is not balanced: debits = {}, credits = {}",
                    voucher.id, debits, credits
                ));
            }
            for line in &voucher.lines {
                if !account_ids.contains(line.account_id.as_str()) {
                    issues.push(format!(
                        "Voucher {} references missing account '{}'",
                        voucher.id, line.account_id
                    ));
                }
                if line.side().is_none() {
                    issues.push(format!(
                        "Voucher {} has a line that is not strictly debit or credit",
                        voucher.id
                    ));
                }
            }
            total_debits += debits;
            total_credits += credits;
        }

        for document in &documents {
            let completed = document.status == DocumentStatus::Completed;
            match (&document.ledger_reference, completed) {
                (Some(reference), true) => match by_id.get(reference.as_str()) {
                    Some(voucher) => {
                        let total = document.total_with_scale(scale);
                        if voucher.total_debits() != total {
                            issues.push(format!(
                                "Document {} total {} does not match voucher {} debits {}",
                                document.id,
                                total,
                                voucher.id,
                                voucher.total_debits()
                            ));
                        }
                    }
                    None => issues.push(format!(
                        "Document {} references missing voucher '{}'",
                        document.id, reference
                    )),
                },
                (None, true) => issues.push(format!(
                    "Completed document {} has no ledger reference",
                    document.id
                )),
                (Some(_), false) => issues.push(format!(
                    "Document {} is {} but carries a ledger reference",
                    document.id, document.status
                )),
                (None, false) => {}
            }
        }

        Ok(IntegrityReport {
            is_valid: issues.is_empty(),
            issues,
            account_count: accounts.len(),
            voucher_count: vouchers.len(),
            total_debits,
            total_credits,
        })
    }
}

/// Report on ledger integrity and validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub account_count: usize,
    pub voucher_count: usize,
    pub total_debits: BigDecimal,
    pub total_credits: BigDecimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticPermissionGate;
    use crate::ledger::voucher::VoucherBuilder;
    use crate::procurement::{DocumentInput, DocumentLine};
    use crate::utils::memory_storage::MemoryStorage;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_ledger_basic_operations() {
        let storage = MemoryStorage::new();
        let gate = StaticPermissionGate::new()
            .grant("controller", "*")
            .grant("clerk", "accounts.view");
        let mut ledger = Ledger::new(storage, gate);
        let controller = Actor::new("controller");
        let clerk = Actor::new("clerk");

        ledger.setup_standard_chart_of_accounts(&controller).await.unwrap();

        // Clerk can browse but not change the chart
        let options = ledger.account_options(&clerk, "materials").await.unwrap();
        assert_eq!(options.len(), 4);
        let denied = ledger
            .create_account(&clerk, NewAccount::new("1400", "Prepayments", AccountType::Asset, None))
            .await;
        assert!(matches!(denied, Err(LedgerError::PermissionDenied { .. })));

        let voucher = ledger
            .post_voucher(
                &controller,
                VoucherBuilder::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), "Capital")
                    .debit("1100", BigDecimal::from(1000))
                    .credit("3100", BigDecimal::from(1000))
                    .build(),
            )
            .await
            .unwrap();
        assert!(voucher.is_balanced());

        ledger
            .register_inventory_item(&controller, InventoryItem::new("rebar", "yard", "Rebar"))
            .await
            .unwrap();
        let doc = ledger
            .documents()
            .create(
                &controller,
                DocumentInput {
                    counterparty_name: "Steelco".to_string(),
                    project_name: "Bridge".to_string(),
                    warehouse_id: "yard".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                    lines: vec![DocumentLine::new("Rebar", BigDecimal::from(4), BigDecimal::from(25))
                        .with_item("rebar")],
                },
            )
            .await
            .unwrap();
        for to in [DocumentStatus::Submitted, DocumentStatus::Approved, DocumentStatus::Completed] {
            ledger.documents().transition(&controller, &doc.id, to).await.unwrap();
        }

        let report = ledger.validate_integrity(&controller).await.unwrap();
        assert!(report.is_valid, "{:?}", report.issues);
        assert_eq!(report.voucher_count, 2);
        assert_eq!(report.total_debits, BigDecimal::from(1100));
        assert_eq!(report.total_debits, report.total_credits);
    }

    #[tokio::test]
    async fn integrity_flags_dangling_parent() {
        let mut storage = MemoryStorage::new();
        let gate = StaticPermissionGate::new().grant("auditor", "*");
        let ledger = Ledger::new(storage.clone(), gate);

        let orphan = Account::new("9000", "Suspense", AccountType::Asset, Some("gone".to_string()));
        storage.save_account(&orphan).await.unwrap();

        let report = ledger.validate_integrity(&Actor::new("auditor")).await.unwrap();
        assert!(!report.is_valid);
        assert!(report.issues[0].contains("missing parent"));
    }
}
