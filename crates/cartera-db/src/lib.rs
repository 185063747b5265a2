//! # cartera-db: SQLite Ledgers for Cartera
//!
//! This crate provides the durable implementations of the ledger traits
//! defined in `cartera-core`. It uses SQLite through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cartera Data Flow                                │
//! │                                                                         │
//! │  SettlementEngine (cartera-settlement)                                 │
//! │       │  LedgerSet { products, customers, suppliers, checks, ... }     │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     cartera-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ CustomerRepo   │    │ 001_initial  │  │   │
//! │  │   │ Connection    │    │ CheckRepo      │    │ _schema.sql  │  │   │
//! │  │   │ Management    │    │ SaleRepo ...   │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (WAL mode, foreign keys on)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per ledger
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cartera_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/cartera.db")).await?;
//!
//! // Hand the ledgers to the settlement engine
//! let ledgers = db.ledgers();
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{
    CheckRepository, CustomerRepository, ProductRepository, PurchaseRepository, SaleRepository,
    SupplierRepository,
};
