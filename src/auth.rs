//! Permission gate interface and actor context.
//!
//! Permission storage lives outside this crate; the core only asks the gate
//! "may this actor perform this action on this module". Every gated call goes
//! through [`authorize`] so the check is implemented exactly once.

use std::collections::{HashMap, HashSet};
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{LedgerError, LedgerResult};

/// Subsystem a permission applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    PurchaseOrders,
    Accounts,
    Inventory,
    JournalVouchers,
}

impl Module {
    pub fn as_str(&self) -> &'static str {
        match self {
            Module::PurchaseOrders => "purchase_orders",
            Module::Accounts => "accounts",
            Module::Inventory => "inventory",
            Module::JournalVouchers => "journal_vouchers",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CRUD verb checked against a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller on whose behalf an operation runs.
///
/// Passed explicitly into every gated operation; there is no ambient session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// External permission lookup.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn has_permission(&self, actor: &Actor, module: Module, action: Action) -> bool;
}

/// Single capability check consulted before every gated operation.
pub async fn authorize<G: PermissionGate + ?Sized>(
    gate: &G,
    actor: &Actor,
    module: Module,
    action: Action,
) -> LedgerResult<()> {
    if gate.has_permission(actor, module, action).await {
        Ok(())
    } else {
        tracing::warn!(
            actor = %actor.id,
            module = %module,
            action = %action,
            "permission denied"
        );
        Err(LedgerError::PermissionDenied { module, action })
    }
}

/// Snapshot of the permissions relevant to the document lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub document_edit: bool,
    pub document_delete: bool,
    pub inventory_edit: bool,
    pub ledger_create: bool,
}

impl Capabilities {
    /// Ask the gate once for each lifecycle permission.
    pub async fn resolve<G: PermissionGate + ?Sized>(gate: &G, actor: &Actor) -> Self {
        Self {
            document_edit: gate
                .has_permission(actor, Module::PurchaseOrders, Action::Edit)
                .await,
            document_delete: gate
                .has_permission(actor, Module::PurchaseOrders, Action::Delete)
                .await,
            inventory_edit: gate
                .has_permission(actor, Module::Inventory, Action::Edit)
                .await,
            ledger_create: gate
                .has_permission(actor, Module::JournalVouchers, Action::Create)
                .await,
        }
    }

    /// Whether a single `(module, action)` pair is covered by this snapshot.
    pub fn allows(&self, module: Module, action: Action) -> bool {
        match (module, action) {
            (Module::PurchaseOrders, Action::Edit) => self.document_edit,
            (Module::PurchaseOrders, Action::Delete) => self.document_delete,
            (Module::Inventory, Action::Edit) => self.inventory_edit,
            (Module::JournalVouchers, Action::Create) => self.ledger_create,
            _ => false,
        }
    }
}

/// In-memory grant table.
///
/// Grants are strings of the form `"module.action"`. `"*"` allows everything and
/// `"module.*"` allows every action on one module.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionGate {
    grants: HashMap<String, HashSet<String>>,
}

impl StaticPermissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a permission string to an actor
    pub fn grant(mut self, actor_id: impl Into<String>, permission: impl Into<String>) -> Self {
        self.grants
            .entry(actor_id.into())
            .or_default()
            .insert(permission.into());
        self
    }

    /// Grant a typed `(module, action)` pair to an actor
    pub fn allow(self, actor_id: impl Into<String>, module: Module, action: Action) -> Self {
        self.grant(actor_id, format!("{}.{}", module, action))
    }

    fn permits(&self, actor: &Actor, module: Module, action: Action) -> bool {
        let Some(perms) = self.grants.get(&actor.id) else {
            return false;
        };
        perms.contains("*")
            || perms.contains(&format!("{}.*", module))
            || perms.contains(&format!("{}.{}", module, action))
    }
}

#[async_trait]
impl PermissionGate for StaticPermissionGate {
    async fn has_permission(&self, actor: &Actor, module: Module, action: Action) -> bool {
        self.permits(actor, module, action)
    }
}
