//! # Ledger Interfaces
//!
//! One trait per kind of entity the settlement engine mutates.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Every ledger operation is:                         │
//! │                                                                         │
//! │  • Entity-scoped   one product, one customer, one check...              │
//! │  • Atomic          applied completely or not at all                     │
//! │  • Durable         committed before the future resolves                 │
//! │  • Serialized      concurrent deltas on the same entity never lose      │
//! │                    an update (no read-then-overwrite)                   │
//! │                                                                         │
//! │  Nothing spans two entities. Multi-entity consistency is the            │
//! │  settlement engine's job, reported as partial completion.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Implementations: `cartera-db` (SQLite). Handles are bundled into a
//! [`LedgerSet`] so an engine can be cloned into spawned tasks.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LedgerResult;
use crate::money::Money;
use crate::types::{Check, CheckStatus, Customer, NewCheck, Product, Purchase, PurchaseStatus, Sale, Supplier};

// =============================================================================
// Stock & Balances
// =============================================================================

#[async_trait]
pub trait ProductLedger: Send + Sync {
    async fn get(&self, id: &str) -> LedgerResult<Product>;

    /// Adds `delta` (negative to decrement) and returns the new stock.
    ///
    /// There is no floor. A negative result is committed like any other.
    async fn adjust_stock(&self, id: &str, delta: i64) -> LedgerResult<i64>;

    /// Overwrites stock after a physical recount. Returns the new stock.
    async fn set_stock(&self, id: &str, value: i64) -> LedgerResult<i64>;

    /// Re-bases the unit cost after a purchase.
    async fn set_cost_price(&self, id: &str, cost: Money) -> LedgerResult<()>;
}

#[async_trait]
pub trait CustomerLedger: Send + Sync {
    async fn get(&self, id: &str) -> LedgerResult<Customer>;

    /// Positive delta increases what the customer owes. Returns the new balance.
    async fn adjust_balance(&self, id: &str, delta: Money) -> LedgerResult<Money>;
}

#[async_trait]
pub trait SupplierLedger: Send + Sync {
    async fn get(&self, id: &str) -> LedgerResult<Supplier>;

    /// Positive delta increases what the store owes. Returns the new balance.
    async fn adjust_balance(&self, id: &str, delta: Money) -> LedgerResult<Money>;
}

// =============================================================================
// Checks
// =============================================================================

#[async_trait]
pub trait CheckLedger: Send + Sync {
    /// Registers a check in the portfolio (`InPortfolio`).
    async fn create(&self, check: NewCheck) -> LedgerResult<Check>;

    async fn get(&self, id: &str) -> LedgerResult<Check>;

    /// Operator-chosen status change.
    ///
    /// Fails with `InvalidTransition` when the check is terminal and the
    /// target differs. Moving to the current status is a no-op.
    async fn transition(&self, id: &str, target: CheckStatus) -> LedgerResult<Check>;

    /// Hands the check to a supplier: `InPortfolio → Delivered` as a single
    /// compare-and-set. Fails with `CheckUnavailable` if the check is in any
    /// other status at the moment of the write.
    async fn deliver(&self, id: &str, supplier_id: &str) -> LedgerResult<Check>;
}

// =============================================================================
// Documents
// =============================================================================

#[async_trait]
pub trait SaleLedger: Send + Sync {
    /// Persists the sale with all its lines in one write.
    async fn record(&self, sale: &Sale) -> LedgerResult<()>;

    async fn get(&self, id: &str) -> LedgerResult<Sale>;
}

#[async_trait]
pub trait PurchaseLedger: Send + Sync {
    /// Persists the purchase with all its lines in one write.
    async fn record(&self, purchase: &Purchase) -> LedgerResult<()>;

    async fn get(&self, id: &str) -> LedgerResult<Purchase>;

    async fn set_status(&self, id: &str, status: PurchaseStatus) -> LedgerResult<Purchase>;
}

// =============================================================================
// Ledger Set
// =============================================================================

/// Shared handles to every ledger. Cheap to clone.
#[derive(Clone)]
pub struct LedgerSet {
    pub products: Arc<dyn ProductLedger>,
    pub customers: Arc<dyn CustomerLedger>,
    pub suppliers: Arc<dyn SupplierLedger>,
    pub checks: Arc<dyn CheckLedger>,
    pub sales: Arc<dyn SaleLedger>,
    pub purchases: Arc<dyn PurchaseLedger>,
}

impl std::fmt::Debug for LedgerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerSet").finish_non_exhaustive()
    }
}
