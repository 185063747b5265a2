//! # Repository Module
//!
//! SQLite implementations of the cartera-core ledger traits.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    How a ledger write reaches SQLite                    │
//! │                                                                         │
//! │  Settlement engine                                                     │
//! │       │                                                                 │
//! │       │  ledgers.products.adjust_stock("p-1", -3)                      │
//! │       ▼                                                                 │
//! │  dyn ProductLedger ──► ProductRepository                               │
//! │                        ├── inherent methods return DbResult            │
//! │                        └── trait impl maps DbError → LedgerError       │
//! │       │                                                                 │
//! │       │  UPDATE products SET stock = stock + ?1 ... RETURNING stock    │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Concurrency discipline per entity:                                    │
//! │  • stock      atomic delta in one statement                            │
//! │  • balances   compare-and-swap on a version column                     │
//! │  • checks     UPDATE ... WHERE status = <expected>                     │
//! │  • documents  header + lines in one transaction                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Stock and cost
//! - [`CustomerRepository`] / [`SupplierRepository`] - Account balances
//! - [`CheckRepository`] - Check portfolio custody
//! - [`SaleRepository`] / [`PurchaseRepository`] - Settlement documents

use std::str::FromStr;

use cartera_core::Money;
use rust_decimal::Decimal;

use crate::error::{DbError, DbResult};

mod account;
pub mod check;
pub mod customer;
pub mod product;
pub mod purchase;
pub mod sale;
pub mod supplier;

pub use check::CheckRepository;
pub use customer::CustomerRepository;
pub use product::ProductRepository;
pub use purchase::PurchaseRepository;
pub use sale::SaleRepository;
pub use supplier::SupplierRepository;

/// Money is stored as decimal text; REAL would reintroduce float drift.
pub(crate) fn money_to_db(money: Money) -> String {
    money.amount().to_string()
}

pub(crate) fn money_from_db(column: &str, value: &str) -> DbResult<Money> {
    Decimal::from_str(value)
        .map(Money::new)
        .map_err(|e| DbError::decode(column, e))
}

pub(crate) fn opt_money_from_db(column: &str, value: Option<&str>) -> DbResult<Option<Money>> {
    value.map(|v| money_from_db(column, v)).transpose()
}
