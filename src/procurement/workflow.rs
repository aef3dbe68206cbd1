//! Purchase document state machine
//!
//! Every operation takes the acting [`Actor`] and checks the permission gate
//! before touching storage. The `approved -> completed` transition is the only
//! one with side effects; it is assembled into a single [`UnitOfWork`] so the
//! stock receipt, the voucher and the status change land together.

use std::collections::BTreeSet;

use crate::auth::{authorize, Action, Actor, Capabilities, Module, PermissionGate};
use crate::config::PostingConfig;
use crate::inventory::{InventoryAdjuster, ReceiptLine};
use crate::ledger::voucher::{LedgerPoster, PostingEvent};
use crate::procurement::document::{DocumentInput, DocumentStatus, PurchaseDocument};
use crate::traits::*;
use crate::types::*;

pub struct PurchaseWorkflow<S: LedgerStorage, G: PermissionGate> {
    storage: S,
    gate: G,
    poster: LedgerPoster<S>,
    inventory: InventoryAdjuster<S>,
    config: PostingConfig,
}

impl<S: LedgerStorage + Clone, G: PermissionGate> PurchaseWorkflow<S, G> {
    pub fn new(storage: S, gate: G) -> Self {
        Self::with_config(storage, gate, PostingConfig::default())
    }

    pub fn with_config(storage: S, gate: G, config: PostingConfig) -> Self {
        Self {
            poster: LedgerPoster::new(storage.clone()),
            inventory: InventoryAdjuster::new(storage.clone()),
            storage,
            gate,
            config,
        }
    }
}

impl<S: LedgerStorage, G: PermissionGate> PurchaseWorkflow<S, G> {
    pub fn gate(&self) -> &G {
        &self.gate
    }

    pub fn config(&self) -> &PostingConfig {
        &self.config
    }

    /// Create a draft document
    pub async fn create(
        &mut self,
        actor: &Actor,
        input: DocumentInput,
    ) -> LedgerResult<PurchaseDocument> {
        authorize(&self.gate, actor, Module::PurchaseOrders, Action::Create).await?;

        let document = PurchaseDocument::new(input);
        self.storage.save_document(&document).await?;
        tracing::info!(document_id = %document.id, actor = %actor.id, "purchase document created");

        Ok(document)
    }

    pub async fn get(&self, actor: &Actor, document_id: &str) -> LedgerResult<PurchaseDocument> {
        authorize(&self.gate, actor, Module::PurchaseOrders, Action::View).await?;
        self.load(document_id).await
    }

    pub async fn list(&self, actor: &Actor) -> LedgerResult<Vec<PurchaseDocument>> {
        authorize(&self.gate, actor, Module::PurchaseOrders, Action::View).await?;
        self.storage.list_documents().await
    }

    /// Replace the content of a draft
    pub async fn update_draft(
        &mut self,
        actor: &Actor,
        document_id: &str,
        input: DocumentInput,
    ) -> LedgerResult<PurchaseDocument> {
        authorize(&self.gate, actor, Module::PurchaseOrders, Action::Edit).await?;

        let mut document = self.load(document_id).await?;
        if document.status != DocumentStatus::Draft {
            return Err(LedgerError::Validation(format!(
                "Only draft documents can be edited; '{}' is {}",
                document.id, document.status
            )));
        }

        document.apply_input(input);
        self.storage.update_document(&document).await
    }

    /// Remove a draft. Documents that left draft are never physically deleted.
    pub async fn delete(&mut self, actor: &Actor, document_id: &str) -> LedgerResult<()> {
        authorize(&self.gate, actor, Module::PurchaseOrders, Action::Delete).await?;

        let document = self.load(document_id).await?;
        if document.status != DocumentStatus::Draft {
            return Err(LedgerError::Validation(format!(
                "Only draft documents can be deleted; '{}' is {}",
                document.id, document.status
            )));
        }

        self.storage
            .delete_document(&document.id, document.version)
            .await?;
        tracing::info!(document_id = %document.id, actor = %actor.id, "draft purchase document deleted");

        Ok(())
    }

    pub async fn submit(&mut self, actor: &Actor, document_id: &str) -> LedgerResult<PurchaseDocument> {
        self.transition(actor, document_id, DocumentStatus::Submitted).await
    }

    pub async fn approve(&mut self, actor: &Actor, document_id: &str) -> LedgerResult<PurchaseDocument> {
        self.transition(actor, document_id, DocumentStatus::Approved).await
    }

    pub async fn complete(&mut self, actor: &Actor, document_id: &str) -> LedgerResult<PurchaseDocument> {
        self.transition(actor, document_id, DocumentStatus::Completed).await
    }

    pub async fn cancel(&mut self, actor: &Actor, document_id: &str) -> LedgerResult<PurchaseDocument> {
        self.transition(actor, document_id, DocumentStatus::Cancelled).await
    }

    /// Move a document along one edge of the transition table.
    ///
    /// Illegal edges fail with `InvalidTransition` before any permission lookup;
    /// missing permissions fail with `PermissionDenied`. Either way nothing is written.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn transition(
        &mut self,
        actor: &Actor,
        document_id: &str,
        to: DocumentStatus,
    ) -> LedgerResult<PurchaseDocument> {
        let mut document = self.load(document_id).await?;
        let from = document.status;

        let Some(required) = from.required_permissions(to) else {
            tracing::warn!(%from, %to, "rejected transition");
            return Err(LedgerError::InvalidTransition { from, to });
        };
        for &(module, action) in required {
            authorize(&self.gate, actor, module, action).await?;
        }

        let stored = match to {
            DocumentStatus::Completed => self.complete_approved(document).await?,
            DocumentStatus::Submitted => {
                document.validate_for_submission(self.config.minor_unit_scale)?;
                document.set_status(to, None);
                self.storage.update_document(&document).await?
            }
            _ => {
                document.set_status(to, None);
                self.storage.update_document(&document).await?
            }
        };

        tracing::info!(%from, %to, version = stored.version, "purchase document transitioned");
        Ok(stored)
    }

    /// Statuses the actor may move the document to next
    pub async fn available_transitions(
        &self,
        document: &PurchaseDocument,
        actor: &Actor,
    ) -> BTreeSet<DocumentStatus> {
        let caps = Capabilities::resolve(&self.gate, actor).await;
        document
            .status
            .next_states()
            .filter(|to| {
                document
                    .status
                    .required_permissions(*to)
                    .is_some_and(|req| req.iter().all(|&(m, a)| caps.allows(m, a)))
            })
            .collect()
    }

    async fn load(&self, document_id: &str) -> LedgerResult<PurchaseDocument> {
        self.storage
            .get_document(document_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Purchase document", document_id))
    }

    /// Build and commit the completion unit of work for an approved document
    async fn complete_approved(
        &mut self,
        mut document: PurchaseDocument,
    ) -> LedgerResult<PurchaseDocument> {
        let event = PostingEvent::for_purchase_document(&document, &self.config);

        // A voucher with this document as its source means an earlier completion
        // got as far as posting. Link it instead of posting and receiving twice,
        // but only if it is the voucher this document maps to.
        if let Some(existing) = self.poster.find_by_source(&document.id).await? {
            let expected = self.poster.draft(&event).await?;
            if existing.lines != expected.lines {
                tracing::error!(
                    document_id = %document.id,
                    voucher_id = %existing.id,
                    "voucher on file does not match the purchase mapping"
                );
                return Err(LedgerError::Conflict(format!(
                    "Voucher '{}' recorded for document '{}' does not match its lines",
                    existing.id, document.id
                )));
            }
            tracing::warn!(
                document_id = %document.id,
                voucher_id = %existing.id,
                "voucher already posted for approved document; linking it"
            );
            document.set_status(DocumentStatus::Completed, Some(existing.id));
            return self
                .storage
                .commit(UnitOfWork {
                    document,
                    voucher: None,
                    stock: Vec::new(),
                })
                .await;
        }

        let receipt = ReceiptLine::from_document(&document);
        let stock = if receipt.is_empty() {
            Vec::new()
        } else {
            self.inventory.plan(&document.warehouse_id, &receipt).await?
        };

        let voucher = self.poster.draft(&event).await?;

        document.set_status(DocumentStatus::Completed, Some(voucher.id.clone()));
        let voucher_id = voucher.id.clone();
        let stored = self
            .storage
            .commit(UnitOfWork {
                document,
                voucher: Some(voucher),
                stock,
            })
            .await?;

        tracing::info!(
            document_id = %stored.id,
            voucher_id = %voucher_id,
            total = %stored.total_with_scale(self.config.minor_unit_scale),
            "purchase document completed"
        );
        Ok(stored)
    }
}
