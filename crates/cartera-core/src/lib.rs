//! # cartera-core: Pure Business Logic for Cartera
//!
//! Everything the settlement engine needs to *decide* what to do, with none
//! of the machinery that actually does it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cartera Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Forms / point of sale (external)                │   │
//! │  │     Cart ──► Checkout ──► Purchase form ──► Payment forms       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  cartera-settlement (engine)                    │   │
//! │  │   finalize_sale, register_purchase, receive_customer_payment,   │   │
//! │  │   pay_supplier                                                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ cartera-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐  │   │
//! │  │   │  money  │ │ pricing │ │  cart   │ │  types   │ │ ledger │  │   │
//! │  │   │ Money   │ │ totals  │ │ CartItem│ │ Product  │ │ traits │  │   │
//! │  │   │ Rate    │ │ change  │ │ limits  │ │ Check    │ │        │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │ implemented by                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  cartera-db (SQLite ledgers)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - `Money` and `Rate` over exact decimals
//! - [`pricing`] - Sale totals, price tiers, change and due amounts
//! - [`types`] - Domain entities (Product, Customer, Supplier, Check, Sale, Purchase)
//! - [`cart`] - Transient cart with frozen prices
//! - [`ledger`] - Async ledger interfaces and the [`LedgerSet`] bundle
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use cartera_core::money::{Money, Rate};
//! use cartera_core::pricing::{compute_sale_totals, PricedLine};
//!
//! let lines = [PricedLine::new(Money::from_major(100), 1)];
//! let totals = compute_sale_totals(&lines, Rate::from_bps(2100), Money::zero(), None);
//!
//! assert_eq!(totals.total, Money::from_major(121));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod ledger;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartItem};
pub use error::{CoreError, LedgerError, ValidationError};
pub use ledger::LedgerSet;
pub use money::{Money, Rate};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Customer id of the walk-in "final consumer" placeholder.
///
/// Sales to this id are treated as anonymous: no balance is ever carried and
/// customer payments against it are rejected. Deployments that keep a
/// different placeholder row override it through the store configuration.
pub const FINAL_CONSUMER_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Invoice number recorded when a purchase is registered without one.
pub const DEFAULT_INVOICE_NUMBER: &str = "N/A";

/// Maximum distinct lines allowed in a single cart
///
/// ## Business Reason
/// Prevents runaway carts and keeps a sale to a sane number of ledger writes.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line in a cart
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest amount, in whole currency units, a single typed-in value may carry
///
/// ## Business Reason
/// Keeps every running balance far inside the exact decimal range, so ledger
/// arithmetic cannot overflow
pub const MAX_AMOUNT: i64 = 1_000_000_000;

/// Largest rate (tax or card surcharge) accepted, in basis points (100%)
pub const MAX_RATE_BPS: u32 = 10_000;
