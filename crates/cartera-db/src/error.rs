//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LedgerError (cartera-core) ← What the settlement engine reasons about │
//! │       │                                                                 │
//! │       ├── NotFound / Duplicate → final, reported as-is                 │
//! │       ├── Rejected             → constraint or overflow, final         │
//! │       └── Storage              → retried by the engine                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use cartera_core::error::{EntityKind, LedgerError};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU
    /// - Recording the same sale or purchase id twice
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK or NOT NULL constraint violation.
    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    /// A balance update would leave the representable range.
    #[error("Balance overflow on {entity} {id}")]
    Overflow { entity: EntityKind, id: String },

    /// Optimistic update kept losing to concurrent writers.
    #[error("Concurrent update conflict on {entity} {id} after {attempts} attempts")]
    Conflict {
        entity: EntityKind,
        id: String,
        attempts: u32,
    },

    /// A stored value could not be read back (e.g., malformed money text).
    #[error("Decode failed for {column}: {reason}")]
    Decode { column: String, reason: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn decode(column: &str, reason: impl ToString) -> Self {
        DbError::Decode {
            column: column.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type,
///                               QueryFailed otherwise (busy, locked)
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: EntityKind::Product,
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") || msg.contains("NOT NULL constraint failed") {
                    DbError::ConstraintViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Maps database failures onto the ledger taxonomy.
///
/// ```text
/// NotFound            → LedgerError::NotFound
/// UniqueViolation     → LedgerError::Duplicate   (entity inferred from table)
/// ForeignKeyViolation ┐
/// ConstraintViolation ├→ LedgerError::Rejected   (same write fails again)
/// Overflow / Decode   ┘
/// everything else     → LedgerError::Storage     (retryable)
/// ```
impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            DbError::UniqueViolation { field, value } => LedgerError::Duplicate {
                entity: entity_for_column(&field),
                id: value,
            },
            err @ (DbError::ForeignKeyViolation { .. }
            | DbError::ConstraintViolation { .. }
            | DbError::Overflow { .. }
            | DbError::Decode { .. }) => LedgerError::rejected(err.to_string()),
            other => LedgerError::storage(other.to_string()),
        }
    }
}

fn entity_for_column(column: &str) -> EntityKind {
    let table = column.split('.').next().unwrap_or_default();
    match table {
        "customers" => EntityKind::Customer,
        "suppliers" => EntityKind::Supplier,
        "checks" => EntityKind::Check,
        "sales" | "sale_items" => EntityKind::Sale,
        "purchases" | "purchase_items" => EntityKind::Purchase,
        _ => EntityKind::Product,
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_ledger_error() {
        let err: LedgerError = DbError::not_found(EntityKind::Check, "c-1").into();
        assert_eq!(err, LedgerError::not_found(EntityKind::Check, "c-1"));

        let err: LedgerError = DbError::UniqueViolation {
            field: "sales.id".to_string(),
            value: "s-1".to_string(),
        }
        .into();
        assert!(matches!(err, LedgerError::Duplicate { entity: EntityKind::Sale, .. }));

        let err: LedgerError = DbError::PoolExhausted.into();
        assert!(err.is_retryable());

        let err: LedgerError = DbError::QueryFailed("database is locked".to_string()).into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_constraint_failures_are_not_retryable() {
        let err: LedgerError = DbError::ConstraintViolation {
            message: "CHECK constraint failed: amount > 0".to_string(),
        }
        .into();
        assert!(matches!(err, LedgerError::Rejected { .. }));
        assert!(!err.is_retryable());

        let err: LedgerError = DbError::ForeignKeyViolation {
            message: "FOREIGN KEY constraint failed".to_string(),
        }
        .into();
        assert!(!err.is_retryable());

        let err: LedgerError = DbError::Overflow {
            entity: EntityKind::Customer,
            id: "c-1".to_string(),
        }
        .into();
        assert_eq!(err, LedgerError::rejected("Balance overflow on customer c-1"));
    }
}
