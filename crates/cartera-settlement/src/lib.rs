//! # cartera-settlement: Settlement Workflow Engine for Cartera
//!
//! Applies business events (sales, purchases, customer payments, supplier
//! payments) to the entity ledgers as short sagas of independently
//! committing writes.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Settlement Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 SettlementEngine (one per store)                 │  │
//! │  │                                                                  │  │
//! │  │  finalize_sale  register_purchase  receive_customer_payment     │  │
//! │  │  pay_supplier   recount_stock      register_check  move_check   │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  Validation &  │  │   StepRunner   │  │  Outcome               │    │
//! │  │  Pricing       │  │                │  │                        │    │
//! │  │                │  │ Retries storage│  │ Receipts, warnings and │    │
//! │  │ cartera-core   │  │ errors with    │  │ PartialCompletion      │    │
//! │  │ rules          │  │ backoff under  │  │ reports                │    │
//! │  │                │  │ a deadline     │  │                        │    │
//! │  └────────────────┘  └───────┬────────┘  └────────────────────────┘    │
//! │                              ▼                                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │        LedgerSet (products, customers, suppliers, checks,       │   │
//! │  │        sales, purchases) - cartera-db or any implementation     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Engine deadlines, retries, store defaults, card plans
//! - [`engine`] - The event flows
//! - [`error`] - Settlement and configuration errors
//! - [`outcome`] - Steps, stages, receipts and partial completion reports
//! - [`retry`] - Per-step retry with backoff and the event deadline
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cartera_db::{Database, DbConfig};
//! use cartera_settlement::{Checkout, SettlementConfig, SettlementEngine};
//!
//! let db = Database::new(DbConfig::new("./cartera.db")).await?;
//! let engine = SettlementEngine::new(db.ledgers(), SettlementConfig::load_or_default(None));
//!
//! match engine.finalize_sale(&mut cart, Checkout::new(PaymentMethod::Cash)).await {
//!     Ok(receipt) => println!("Sale {} total {}", receipt.sale.id, receipt.sale.total),
//!     Err(SettlementError::Partial(report)) => reconcile(*report),
//!     Err(err) => println!("Nothing applied: {err}"),
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod outcome;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{EngineSettings, SettlementConfig, StoreSettings};
pub use engine::{Checkout, CustomerPaymentRequest, PurchaseRequest, SettlementEngine, SupplierPaymentRequest};
pub use error::{ConfigError, ConfigResult, SettlementError, SettlementResult};
pub use outcome::{
    CompletedStep, CustomerPaymentReceipt, EventKind, FailedStep, PartialCompletion, PurchaseReceipt, SaleReceipt,
    Stage, Step, StepError, StepOutcome, StockLevel, SupplierPaymentReceipt, Warning,
};
pub use retry::{RetryPolicy, StepRunner};
