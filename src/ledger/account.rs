//! Account registry: chart of accounts operations

use std::collections::{HashMap, HashSet};

use crate::ledger::tree::{AccountTree, SelectOption};
use crate::traits::*;
use crate::types::*;

/// Account registry for handling chart of accounts operations
pub struct AccountRegistry<S: LedgerStorage> {
    pub(crate) storage: S,
    validator: Box<dyn AccountValidator>,
}

impl<S: LedgerStorage> AccountRegistry<S> {
    /// Create a new account registry
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultAccountValidator),
        }
    }

    /// Create a new account registry with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn AccountValidator>) -> Self {
        Self { storage, validator }
    }

    /// Create a new account
    pub async fn create(&mut self, new_account: NewAccount) -> LedgerResult<Account> {
        let account = Account::new(
            new_account.code,
            new_account.name,
            new_account.account_type,
            new_account.parent_id,
        );

        self.validator.validate_account(&account)?;

        if self.storage.get_account_by_code(&account.code).await?.is_some() {
            return Err(LedgerError::Validation(format!(
                "Account with code '{}' already exists",
                account.code
            )));
        }

        // A brand new id cannot be anyone's ancestor, so resolving the parent is enough.
        if let Some(ref parent_id) = account.parent_id {
            if self.storage.get_account(parent_id).await?.is_none() {
                return Err(LedgerError::Validation(format!(
                    "Parent account '{}' does not exist",
                    parent_id
                )));
            }
        }

        self.storage.save_account(&account).await?;
        tracing::info!(account_id = %account.id, code = %account.code, "account created");

        Ok(account)
    }

    /// Change name, type or parent. The code never changes.
    pub async fn update(&mut self, account_id: &str, update: AccountUpdate) -> LedgerResult<Account> {
        let mut account = self.get_required(account_id).await?;
        account.name = update.name;
        account.account_type = update.account_type;
        account.parent_id = update.parent_id;

        self.validator.validate_account(&account)?;

        if let Some(ref parent_id) = account.parent_id {
            let accounts = self.storage.list_accounts(None).await?;
            let by_id: HashMap<&str, &Account> =
                accounts.iter().map(|a| (a.id.as_str(), a)).collect();
            ensure_acyclic_parent(&by_id, &account.id, parent_id)?;
        }

        account.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_account(&account).await?;

        Ok(account)
    }

    /// Delete an account and every descendant.
    ///
    /// Returns the removed ids in pre-order. Deleting an unknown id is a no-op.
    pub async fn delete(&mut self, account_id: &str) -> LedgerResult<Vec<String>> {
        let tree = self.tree().await?;
        let doomed = tree.subtree_ids(account_id);
        if doomed.is_empty() {
            return Ok(doomed);
        }

        self.storage.delete_accounts(&doomed).await?;
        tracing::info!(
            account_id = %account_id,
            removed = doomed.len(),
            "account subtree deleted"
        );

        Ok(doomed)
    }

    /// Get an account by ID
    pub async fn get(&self, account_id: &str) -> LedgerResult<Option<Account>> {
        self.storage.get_account(account_id).await
    }

    /// Get an account by ID, returning an error if not found
    pub async fn get_required(&self, account_id: &str) -> LedgerResult<Account> {
        self.storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Account", account_id))
    }

    /// Get an account by code
    pub async fn get_by_code(&self, code: &str) -> LedgerResult<Option<Account>> {
        self.storage.get_account_by_code(code).await
    }

    /// List all accounts
    pub async fn list(&self) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts(None).await
    }

    /// List accounts by type
    pub async fn list_by_type(&self, account_type: AccountType) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts(Some(account_type)).await
    }

    /// Whole chart as a forest
    pub async fn tree(&self) -> LedgerResult<AccountTree> {
        Ok(AccountTree::build(self.list().await?))
    }

    /// Indented picker entries, optionally narrowed by a search query
    pub async fn select_options(&self, query: &str) -> LedgerResult<Vec<SelectOption>> {
        Ok(self.tree().await?.filter(query).flatten_for_select())
    }

    /// Root-to-account chain (for breadcrumb display)
    pub async fn path_to(&self, account_id: &str) -> LedgerResult<Vec<Account>> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current_account_id = Some(account_id.to_string());

        while let Some(id) = current_account_id {
            if !seen.insert(id.clone()) {
                return Err(LedgerError::Validation(format!(
                    "Account hierarchy contains a cycle at '{}'",
                    id
                )));
            }
            match self.storage.get_account(&id).await? {
                Some(account) => {
                    current_account_id = account.parent_id.clone();
                    path.insert(0, account);
                }
                None if path.is_empty() => {
                    return Err(LedgerError::not_found("Account", id));
                }
                // Orphaned parent reference: treat the last found account as the root.
                None => break,
            }
        }

        Ok(path)
    }
}

/// Reject `parent_id` for `account_id` if it is the account itself, does not exist,
/// or has `account_id` among its ancestors.
fn ensure_acyclic_parent(
    by_id: &HashMap<&str, &Account>,
    account_id: &str,
    parent_id: &str,
) -> LedgerResult<()> {
    if parent_id == account_id {
        return Err(LedgerError::validation("An account cannot be its own parent"));
    }
    if !by_id.contains_key(parent_id) {
        return Err(LedgerError::Validation(format!(
            "Parent account '{}' does not exist",
            parent_id
        )));
    }

    let mut visited = HashSet::new();
    let mut cursor = Some(parent_id);
    while let Some(id) = cursor {
        if id == account_id {
            return Err(LedgerError::Validation(format!(
                "Parent '{}' is a descendant of account '{}'",
                parent_id, account_id
            )));
        }
        if !visited.insert(id) {
            return Err(LedgerError::Validation(format!(
                "Account hierarchy already contains a cycle at '{}'",
                id
            )));
        }
        cursor = by_id.get(id).and_then(|a| a.parent_id.as_deref());
    }

    Ok(())
}

/// Utility functions for working with accounts
pub mod utils {
    use super::*;

    /// Seed a chart of accounts for a construction contractor.
    ///
    /// Includes the codes the default posting configuration points at
    /// (1300 inventory, 2100 payables, 5100 job materials). Keys of the returned
    /// map are account codes.
    pub async fn seed_standard_chart<S: LedgerStorage>(
        registry: &mut AccountRegistry<S>,
    ) -> LedgerResult<HashMap<String, Account>> {
        // (code, name, type, parent code)
        const CHART: &[(&str, &str, AccountType, Option<&str>)] = &[
            ("1000", "Assets", AccountType::Asset, None),
            ("1100", "Cash at Bank", AccountType::Asset, Some("1000")),
            ("1200", "Contract Receivables", AccountType::Asset, Some("1000")),
            ("1300", "Materials Inventory", AccountType::Asset, Some("1000")),
            ("1500", "Plant and Equipment", AccountType::Asset, Some("1000")),
            ("2000", "Liabilities", AccountType::Liability, None),
            ("2100", "Trade Payables", AccountType::Liability, Some("2000")),
            ("2200", "Retentions Payable", AccountType::Liability, Some("2000")),
            ("3000", "Equity", AccountType::Equity, None),
            ("3100", "Owner's Capital", AccountType::Equity, Some("3000")),
            ("4000", "Revenue", AccountType::Revenue, None),
            ("4100", "Contract Revenue", AccountType::Revenue, Some("4000")),
            ("5000", "Job Costs", AccountType::Expense, None),
            ("5100", "Job Materials", AccountType::Expense, Some("5000")),
            ("5200", "Subcontractors", AccountType::Expense, Some("5000")),
            ("5300", "Equipment Hire", AccountType::Expense, Some("5000")),
        ];

        let mut accounts: HashMap<String, Account> = HashMap::new();
        for &(code, name, account_type, parent_code) in CHART {
            let parent_id = parent_code.and_then(|c| accounts.get(c)).map(|a| a.id.clone());
            let account = registry
                .create(NewAccount::new(code, name, account_type, parent_id))
                .await?;
            accounts.insert(code.to_string(), account);
        }

        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;
    use proptest::prelude::*;

    async fn registry_with(codes: &[(&str, Option<&str>)]) -> (AccountRegistry<MemoryStorage>, HashMap<String, String>) {
        let mut registry = AccountRegistry::new(MemoryStorage::new());
        let mut ids: HashMap<String, String> = HashMap::new();
        for &(code, parent) in codes {
            let parent_id = parent.map(|p| ids[p].clone());
            let account = registry
                .create(NewAccount::new(code, format!("Account {code}"), AccountType::Asset, parent_id))
                .await
                .unwrap();
            ids.insert(code.to_string(), account.id);
        }
        (registry, ids)
    }

    #[tokio::test]
    async fn create_rejects_empty_code_duplicate_code_and_missing_parent() {
        let (mut registry, _) = registry_with(&[("1000", None)]).await;

        let empty = registry
            .create(NewAccount::new("  ", "Blank", AccountType::Asset, None))
            .await;
        assert!(matches!(empty, Err(LedgerError::Validation(_))));

        let duplicate = registry
            .create(NewAccount::new("1000", "Again", AccountType::Asset, None))
            .await;
        assert!(matches!(duplicate, Err(LedgerError::Validation(_))));

        let orphan = registry
            .create(NewAccount::new(
                "1100",
                "Cash",
                AccountType::Asset,
                Some("no-such-id".to_string()),
            ))
            .await;
        assert!(matches!(orphan, Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn update_rejects_self_parent_and_cycles() {
        let (mut registry, ids) =
            registry_with(&[("1000", None), ("1300", Some("1000")), ("1310", Some("1300"))]).await;

        let self_parent = registry
            .update(
                &ids["1000"],
                AccountUpdate {
                    name: "Assets".to_string(),
                    account_type: AccountType::Asset,
                    parent_id: Some(ids["1000"].clone()),
                },
            )
            .await;
        assert!(matches!(self_parent, Err(LedgerError::Validation(_))));

        let cycle = registry
            .update(
                &ids["1000"],
                AccountUpdate {
                    name: "Assets".to_string(),
                    account_type: AccountType::Asset,
                    parent_id: Some(ids["1310"].clone()),
                },
            )
            .await;
        assert!(matches!(cycle, Err(LedgerError::Validation(_))));

        let moved = registry
            .update(
                &ids["1310"],
                AccountUpdate {
                    name: "Materials on Site".to_string(),
                    account_type: AccountType::Asset,
                    parent_id: Some(ids["1000"].clone()),
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.code, "1310");
        assert_eq!(moved.parent_id.as_deref(), Some(ids["1000"].as_str()));
    }

    #[tokio::test]
    async fn update_detects_cycle_already_in_storage() {
        let (mut registry, ids) = registry_with(&[("1", None), ("2", None), ("3", None)]).await;

        // Corrupt storage directly: 1 -> 2 -> 1
        let mut a = registry.get_required(&ids["1"]).await.unwrap();
        a.parent_id = Some(ids["2"].clone());
        registry.storage.update_account(&a).await.unwrap();
        let mut b = registry.get_required(&ids["2"]).await.unwrap();
        b.parent_id = Some(ids["1"].clone());
        registry.storage.update_account(&b).await.unwrap();

        let result = registry
            .update(
                &ids["3"],
                AccountUpdate {
                    name: "Three".to_string(),
                    account_type: AccountType::Asset,
                    parent_id: Some(ids["1"].clone()),
                },
            )
            .await;
        assert!(matches!(result, Err(LedgerError::Validation(msg)) if msg.contains("cycle")));
    }

    #[tokio::test]
    async fn update_unknown_account_is_not_found() {
        let (mut registry, _) = registry_with(&[]).await;
        let result = registry
            .update(
                "ghost",
                AccountUpdate {
                    name: "Ghost".to_string(),
                    account_type: AccountType::Expense,
                    parent_id: None,
                },
            )
            .await;
        assert!(matches!(result, Err(LedgerError::NotFound { .. })));
    }

    #[tokio::test]
    async fn delete_cascades_and_is_idempotent() {
        let (mut registry, ids) = registry_with(&[
            ("1000", None),
            ("1300", Some("1000")),
            ("1310", Some("1300")),
            ("2000", None),
        ])
        .await;

        let removed = registry.delete(&ids["1300"]).await.unwrap();
        assert_eq!(removed, vec![ids["1300"].clone(), ids["1310"].clone()]);

        let remaining = registry.list().await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining
            .iter()
            .all(|a| a.parent_id.as_ref().is_none_or(|p| remaining.iter().any(|r| &r.id == p))));

        assert!(registry.delete(&ids["1300"]).await.unwrap().is_empty());
        assert!(registry.delete("never-existed").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn path_to_walks_up_to_root() {
        let (registry, ids) =
            registry_with(&[("1000", None), ("1300", Some("1000")), ("1310", Some("1300"))]).await;
        let path = registry.path_to(&ids["1310"]).await.unwrap();
        let codes: Vec<_> = path.iter().map(|a| a.code.as_str()).collect();
        assert_eq!(codes, vec!["1000", "1300", "1310"]);
    }

    #[tokio::test]
    async fn standard_chart_is_hierarchical() {
        let mut registry = AccountRegistry::new(MemoryStorage::new());
        let chart = utils::seed_standard_chart(&mut registry).await.unwrap();

        assert_eq!(chart["1300"].parent_id.as_deref(), Some(chart["1000"].id.as_str()));
        let tree = registry.tree().await.unwrap();
        assert_eq!(tree.roots().count(), 5);
        assert_eq!(tree.len(), chart.len());
    }

    proptest! {
        #[test]
        fn cascade_removes_exactly_the_subtree(parents in prop::collection::vec(0usize..100, 1..25), victim in 0usize..100) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let mut registry = AccountRegistry::new(MemoryStorage::new());
                let mut ids: Vec<String> = Vec::new();
                for (i, p) in parents.iter().enumerate() {
                    // Every third slot is a root; others hang off an earlier account.
                    let parent_id = if i == 0 || p % 3 == 0 { None } else { Some(ids[p % i].clone()) };
                    let account = registry
                        .create(NewAccount::new(format!("{i:03}"), format!("A{i}"), AccountType::Expense, parent_id))
                        .await
                        .unwrap();
                    ids.push(account.id);
                }

                let target = &ids[victim % ids.len()];
                let before = registry.list().await.unwrap().len();
                let subtree = registry.tree().await.unwrap().subtree_ids(target).len();
                registry.delete(target).await.unwrap();
                let after = registry.list().await.unwrap();

                assert_eq!(after.len(), before - subtree);
                assert!(after
                    .iter()
                    .all(|a| a.parent_id.as_ref().is_none_or(|p| after.iter().any(|r| &r.id == p))));
            });
        }
    }
}
