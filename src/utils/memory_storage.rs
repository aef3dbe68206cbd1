//! In-memory storage implementation for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::procurement::PurchaseDocument;
use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    documents: HashMap<String, PurchaseDocument>,
    vouchers: HashMap<String, JournalVoucher>,
    /// source document id -> voucher id
    vouchers_by_source: HashMap<String, String>,
    inventory: HashMap<(String, String), InventoryItem>,
}

impl State {
    fn check_version(&self, document_id: &str, expected: u64) -> LedgerResult<()> {
        let stored = self
            .documents
            .get(document_id)
            .ok_or_else(|| LedgerError::not_found("Purchase document", document_id))?;
        if stored.version != expected {
            return Err(LedgerError::Conflict(format!(
                "Purchase document '{}' is at version {}, write expected {}",
                document_id, stored.version, expected
            )));
        }
        Ok(())
    }

    fn check_voucher_insert(&self, voucher: &JournalVoucher) -> LedgerResult<()> {
        if self.vouchers.contains_key(&voucher.id) {
            return Err(LedgerError::Conflict(format!(
                "Voucher '{}' already exists",
                voucher.id
            )));
        }
        if let Some(source) = &voucher.source_document_id {
            if let Some(existing) = self.vouchers_by_source.get(source) {
                return Err(LedgerError::Conflict(format!(
                    "Document '{}' already posted as voucher '{}'",
                    source, existing
                )));
            }
        }
        Ok(())
    }

    fn check_stock(&self, deltas: &[StockDelta]) -> LedgerResult<()> {
        for delta in deltas {
            let key = (delta.item_id.clone(), delta.warehouse_id.clone());
            if !self.inventory.contains_key(&key) {
                return Err(LedgerError::UnknownItem {
                    item_id: delta.item_id.clone(),
                    warehouse_id: delta.warehouse_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Callers must run `check_stock` first
    fn add_stock(&mut self, deltas: &[StockDelta]) -> Vec<InventoryItem> {
        let mut updated = Vec::with_capacity(deltas.len());
        for delta in deltas {
            let key = (delta.item_id.clone(), delta.warehouse_id.clone());
            if let Some(item) = self.inventory.get_mut(&key) {
                item.on_hand += &delta.quantity;
                updated.push(item.clone());
            }
        }
        updated
    }

    fn insert_voucher(&mut self, voucher: JournalVoucher) {
        if let Some(source) = &voucher.source_document_id {
            self.vouchers_by_source
                .insert(source.clone(), voucher.id.clone());
        }
        self.vouchers.insert(voucher.id.clone(), voucher);
    }

    fn store_document(&mut self, mut document: PurchaseDocument) -> PurchaseDocument {
        document.version += 1;
        self.documents
            .insert(document.id.clone(), document.clone());
        document
    }
}

/// In-memory storage implementation for testing and development.
///
/// Clones share the same data. All state sits behind one lock, so a
/// [`UnitOfWork`] is validated and applied while no other writer can interleave.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    state: Arc<RwLock<State>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> LedgerResult<()> {
        *self.write()? = State::default();
        Ok(())
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".to_string()))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn save_account(&mut self, account: &Account) -> LedgerResult<()> {
        let mut state = self.write()?;
        if state.accounts.contains_key(&account.id) {
            return Err(LedgerError::Conflict(format!(
                "Account '{}' already exists",
                account.id
            )));
        }
        if state.accounts.values().any(|a| a.code == account.code) {
            return Err(LedgerError::Conflict(format!(
                "Account code '{}' already in use",
                account.code
            )));
        }
        state.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn get_account(&self, account_id: &str) -> LedgerResult<Option<Account>> {
        Ok(self.read()?.accounts.get(account_id).cloned())
    }

    async fn get_account_by_code(&self, code: &str) -> LedgerResult<Option<Account>> {
        Ok(self
            .read()?
            .accounts
            .values()
            .find(|a| a.code == code)
            .cloned())
    }

    async fn list_accounts(&self, account_type: Option<AccountType>) -> LedgerResult<Vec<Account>> {
        let state = self.read()?;
        let mut filtered: Vec<Account> = state
            .accounts
            .values()
            .filter(|account| account_type.is_none_or(|t| account.account_type == t))
            .cloned()
            .collect();
        filtered.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(filtered)
    }

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        let mut state = self.write()?;
        match state.accounts.get_mut(&account.id) {
            Some(stored) => {
                *stored = account.clone();
                Ok(())
            }
            None => Err(LedgerError::not_found("Account", account.id.clone())),
        }
    }

    async fn delete_accounts(&mut self, account_ids: &[String]) -> LedgerResult<()> {
        let mut state = self.write()?;
        for id in account_ids {
            state.accounts.remove(id);
        }
        Ok(())
    }

    async fn save_document(&mut self, document: &PurchaseDocument) -> LedgerResult<()> {
        let mut state = self.write()?;
        if state.documents.contains_key(&document.id) {
            return Err(LedgerError::Conflict(format!(
                "Purchase document '{}' already exists",
                document.id
            )));
        }
        state
            .documents
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn get_document(&self, document_id: &str) -> LedgerResult<Option<PurchaseDocument>> {
        Ok(self.read()?.documents.get(document_id).cloned())
    }

    async fn list_documents(&self) -> LedgerResult<Vec<PurchaseDocument>> {
        let mut documents: Vec<PurchaseDocument> =
            self.read()?.documents.values().cloned().collect();
        documents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(documents)
    }

    async fn update_document(
        &mut self,
        document: &PurchaseDocument,
    ) -> LedgerResult<PurchaseDocument> {
        let mut state = self.write()?;
        state.check_version(&document.id, document.version)?;
        Ok(state.store_document(document.clone()))
    }

    async fn delete_document(
        &mut self,
        document_id: &str,
        expected_version: u64,
    ) -> LedgerResult<()> {
        let mut state = self.write()?;
        state.check_version(document_id, expected_version)?;
        state.documents.remove(document_id);
        Ok(())
    }

    async fn save_voucher(&mut self, voucher: &JournalVoucher) -> LedgerResult<()> {
        let mut state = self.write()?;
        state.check_voucher_insert(voucher)?;
        state.insert_voucher(voucher.clone());
        Ok(())
    }

    async fn get_voucher(&self, voucher_id: &str) -> LedgerResult<Option<JournalVoucher>> {
        Ok(self.read()?.vouchers.get(voucher_id).cloned())
    }

    async fn find_voucher_by_source(
        &self,
        source_document_id: &str,
    ) -> LedgerResult<Option<JournalVoucher>> {
        let state = self.read()?;
        Ok(state
            .vouchers_by_source
            .get(source_document_id)
            .and_then(|id| state.vouchers.get(id))
            .cloned())
    }

    async fn list_vouchers(&self) -> LedgerResult<Vec<JournalVoucher>> {
        let mut vouchers: Vec<JournalVoucher> = self.read()?.vouchers.values().cloned().collect();
        vouchers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(vouchers)
    }

    async fn save_inventory_item(&mut self, item: &InventoryItem) -> LedgerResult<()> {
        self.write()?.inventory.insert(
            (item.item_id.clone(), item.warehouse_id.clone()),
            item.clone(),
        );
        Ok(())
    }

    async fn get_inventory_item(
        &self,
        item_id: &str,
        warehouse_id: &str,
    ) -> LedgerResult<Option<InventoryItem>> {
        Ok(self
            .read()?
            .inventory
            .get(&(item_id.to_string(), warehouse_id.to_string()))
            .cloned())
    }

    async fn list_inventory(&self) -> LedgerResult<Vec<InventoryItem>> {
        let mut items: Vec<InventoryItem> = self.read()?.inventory.values().cloned().collect();
        items.sort_by(|a, b| {
            (&a.warehouse_id, &a.item_id).cmp(&(&b.warehouse_id, &b.item_id))
        });
        Ok(items)
    }

    async fn apply_stock_deltas(
        &mut self,
        deltas: &[StockDelta],
    ) -> LedgerResult<Vec<InventoryItem>> {
        let mut state = self.write()?;
        state.check_stock(deltas)?;
        Ok(state.add_stock(deltas))
    }

    async fn commit(&mut self, unit: UnitOfWork) -> LedgerResult<PurchaseDocument> {
        let mut state = self.write()?;

        // Validate everything before the first mutation.
        state.check_version(&unit.document.id, unit.document.version)?;
        if let Some(voucher) = &unit.voucher {
            state.check_voucher_insert(voucher)?;
        }
        state.check_stock(&unit.stock)?;

        state.add_stock(&unit.stock);
        if let Some(voucher) = unit.voucher {
            state.insert_voucher(voucher);
        }
        Ok(state.store_document(unit.document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procurement::{DocumentInput, DocumentStatus};
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn document() -> PurchaseDocument {
        PurchaseDocument::new(DocumentInput {
            counterparty_name: "Supplier".to_string(),
            project_name: "Project".to_string(),
            warehouse_id: "w1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            lines: Vec::new(),
        })
    }

    fn voucher(source: &str) -> JournalVoucher {
        JournalVoucher {
            id: uuid::Uuid::new_v4().to_string(),
            source_document_id: Some(source.to_string()),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            description: "test".to_string(),
            lines: vec![
                VoucherLine::debit("a", BigDecimal::from(1)),
                VoucherLine::credit("b", BigDecimal::from(1)),
            ],
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    #[tokio::test]
    async fn stale_document_write_conflicts() {
        let mut storage = MemoryStorage::new();
        let doc = document();
        storage.save_document(&doc).await.unwrap();

        let first = storage.update_document(&doc).await.unwrap();
        assert_eq!(first.version, 1);

        // Second writer still holds version 0.
        let stale = storage.update_document(&doc).await;
        assert!(matches!(stale, Err(LedgerError::Conflict(_))));
    }

    #[tokio::test]
    async fn commit_is_all_or_nothing() {
        let mut storage = MemoryStorage::new();
        storage
            .save_inventory_item(&InventoryItem::new("i1", "w1", "Item"))
            .await
            .unwrap();
        let mut doc = document();
        storage.save_document(&doc).await.unwrap();
        doc.set_status(DocumentStatus::Completed, Some("v".to_string()));

        let result = storage
            .commit(UnitOfWork {
                document: doc.clone(),
                voucher: Some(voucher(&doc.id)),
                stock: vec![
                    StockDelta {
                        item_id: "i1".to_string(),
                        warehouse_id: "w1".to_string(),
                        quantity: BigDecimal::from(4),
                    },
                    StockDelta {
                        item_id: "missing".to_string(),
                        warehouse_id: "w1".to_string(),
                        quantity: BigDecimal::from(1),
                    },
                ],
            })
            .await;
        assert!(matches!(result, Err(LedgerError::UnknownItem { .. })));

        assert!(storage.list_vouchers().await.unwrap().is_empty());
        let item = storage.get_inventory_item("i1", "w1").await.unwrap().unwrap();
        assert_eq!(item.on_hand, BigDecimal::from(0));
        let stored = storage.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Draft);
    }

    #[tokio::test]
    async fn concurrent_completions_only_one_wins() {
        let mut a = MemoryStorage::new();
        let mut b = a.clone();
        let mut doc = document();
        a.save_document(&doc).await.unwrap();
        doc.set_status(DocumentStatus::Completed, Some("v".to_string()));

        let first = a
            .commit(UnitOfWork {
                document: doc.clone(),
                voucher: Some(voucher(&doc.id)),
                stock: Vec::new(),
            })
            .await;
        let second = b
            .commit(UnitOfWork {
                document: doc.clone(),
                voucher: Some(voucher(&doc.id)),
                stock: Vec::new(),
            })
            .await;

        assert!(first.is_ok());
        assert!(matches!(second, Err(LedgerError::Conflict(_))));
        assert_eq!(b.list_vouchers().await.unwrap().len(), 1);
    }
}
