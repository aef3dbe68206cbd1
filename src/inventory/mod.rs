//! Inventory adjuster: additive stock receipts
//!
//! The inventory catalog is owned elsewhere; this module only raises on-hand
//! quantities for rows that already exist, and never lowers them.

use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};

use crate::procurement::PurchaseDocument;
use crate::traits::*;
use crate::types::*;

/// Quantity of one item to receive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub item_id: String,
    pub quantity: BigDecimal,
}

impl ReceiptLine {
    pub fn new(item_id: impl Into<String>, quantity: BigDecimal) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
        }
    }

    /// Receipt lines for the stocked lines of a purchase document
    pub fn from_document(document: &PurchaseDocument) -> Vec<ReceiptLine> {
        document
            .lines
            .iter()
            .filter_map(|line| {
                line.item_id
                    .as_ref()
                    .map(|item_id| ReceiptLine::new(item_id.clone(), line.quantity.clone()))
            })
            .collect()
    }
}

pub struct InventoryAdjuster<S: LedgerStorage> {
    storage: S,
}

impl<S: LedgerStorage> InventoryAdjuster<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Turn receipt lines into validated stock deltas without writing anything.
    ///
    /// Quantities for the same item are summed. Fails on the first non-positive
    /// quantity or the first item missing from `warehouse_id`.
    pub async fn plan(
        &self,
        warehouse_id: &str,
        lines: &[ReceiptLine],
    ) -> LedgerResult<Vec<StockDelta>> {
        let mut deltas: Vec<StockDelta> = Vec::new();

        for line in lines {
            if line.quantity <= BigDecimal::zero() {
                return Err(LedgerError::Validation(format!(
                    "Receipt quantity for '{}' must be positive",
                    line.item_id
                )));
            }
            match deltas.iter_mut().find(|d| d.item_id == line.item_id) {
                Some(delta) => delta.quantity += &line.quantity,
                None => deltas.push(StockDelta {
                    item_id: line.item_id.clone(),
                    warehouse_id: warehouse_id.to_string(),
                    quantity: line.quantity.clone(),
                }),
            }
        }

        for delta in &deltas {
            if self
                .storage
                .get_inventory_item(&delta.item_id, warehouse_id)
                .await?
                .is_none()
            {
                return Err(LedgerError::UnknownItem {
                    item_id: delta.item_id.clone(),
                    warehouse_id: warehouse_id.to_string(),
                });
            }
        }

        tracing::debug!(warehouse = %warehouse_id, rows = deltas.len(), "stock receipt planned");
        Ok(deltas)
    }

    /// Increase on-hand quantities for every line, or for none of them.
    /// Returns the updated rows.
    pub async fn receive(
        &mut self,
        warehouse_id: &str,
        lines: &[ReceiptLine],
    ) -> LedgerResult<Vec<InventoryItem>> {
        let deltas = self.plan(warehouse_id, lines).await?;
        let updated = self.storage.apply_stock_deltas(&deltas).await?;

        tracing::info!(warehouse = %warehouse_id, rows = updated.len(), "stock received");
        Ok(updated)
    }

    /// Add a catalog row with zero stock
    pub async fn register_item(&mut self, item: InventoryItem) -> LedgerResult<InventoryItem> {
        if item.item_id.trim().is_empty() || item.warehouse_id.trim().is_empty() {
            return Err(LedgerError::validation(
                "Inventory item and warehouse ids cannot be empty",
            ));
        }
        if self
            .storage
            .get_inventory_item(&item.item_id, &item.warehouse_id)
            .await?
            .is_some()
        {
            return Err(LedgerError::Validation(format!(
                "Item '{}' already exists in warehouse '{}'",
                item.item_id, item.warehouse_id
            )));
        }

        self.storage.save_inventory_item(&item).await?;
        Ok(item)
    }

    pub async fn get(&self, item_id: &str, warehouse_id: &str) -> LedgerResult<Option<InventoryItem>> {
        self.storage.get_inventory_item(item_id, warehouse_id).await
    }

    pub async fn list(&self) -> LedgerResult<Vec<InventoryItem>> {
        self.storage.list_inventory().await
    }
}
