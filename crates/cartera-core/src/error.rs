//! # Error Types
//!
//! Domain-specific error types for cartera-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cartera-core errors (this file)                                       │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  ├── CoreError        - Cart rules (wraps ValidationError)             │
//! │  └── LedgerError      - What a ledger write can fail with              │
//! │                                                                         │
//! │  cartera-db errors (separate crate)                                    │
//! │  └── DbError          - SQLite failures, mapped into LedgerError       │
//! │                                                                         │
//! │  cartera-settlement errors                                             │
//! │  └── SettlementError  - What the caller of a business event sees       │
//! │                                                                         │
//! │  Flow: DbError → LedgerError → StepError → SettlementError             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, ID, etc.)
//! 3. Errors are enum variants, never String
//! 4. `LedgerError` is serializable because it ends up in reconciliation reports

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::CheckStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// The product is not in the cart.
    #[error("Product {0} not in cart")]
    NotInCart(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Always raised before any ledger write, so a validation failure never
/// leaves anything half applied.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or more.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Value is well-formed but breaks a business rule.
    #[error("{field} is invalid: {reason}")]
    Invalid { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// The same value was given twice (e.g., a check selected twice).
    #[error("{field} '{value}' given more than once")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Ledger Error
// =============================================================================

/// Kinds of entity a ledger owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Customer,
    Supplier,
    Check,
    Sale,
    Purchase,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Product => "product",
            EntityKind::Customer => "customer",
            EntityKind::Supplier => "supplier",
            EntityKind::Check => "check",
            EntityKind::Sale => "sale",
            EntityKind::Purchase => "purchase",
        };
        f.write_str(name)
    }
}

/// Errors returned by ledger operations.
///
/// ## Retry Classification
/// Only [`LedgerError::Storage`] is transient. Everything else describes the
/// state of the entity and will fail the same way if repeated.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerError {
    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    /// A check selected for a supplier payment is no longer in the portfolio.
    ///
    /// ## When This Occurs
    /// ```text
    /// Payment A selects check #123 ──┐
    /// Payment B selects check #123 ──┤
    ///                                ▼
    ///        A: InPortfolio → Delivered   ✅
    ///        B: status is Delivered       → CheckUnavailable
    /// ```
    #[error("Check {check_id} is {status}, not available")]
    CheckUnavailable { check_id: String, status: CheckStatus },

    /// The check is in a terminal status and cannot move.
    #[error("Check {check_id} cannot move from {from} to {to}")]
    InvalidTransition {
        check_id: String,
        from: CheckStatus,
        to: CheckStatus,
    },

    /// An entity with this id already exists.
    #[error("{entity} already exists: {id}")]
    Duplicate { entity: EntityKind, id: String },

    /// The store refused the write itself (constraint, overflow). Repeating
    /// it changes nothing.
    #[error("Write rejected: {message}")]
    Rejected { message: String },

    /// The backing store failed. Safe to retry.
    #[error("Storage failure: {message}")]
    Storage { message: String },
}

impl LedgerError {
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        LedgerError::Rejected {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::Storage {
            message: message.into(),
        }
    }

    /// Whether re-issuing the same write may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Storage { .. })
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result of a ledger operation.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("supplier").to_string(), "supplier is required");
        assert_eq!(
            ValidationError::MustBePositive {
                field: "amount".to_string()
            }
            .to_string(),
            "amount must be positive"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("sku").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }

    #[test]
    fn test_ledger_error_messages() {
        let err = LedgerError::CheckUnavailable {
            check_id: "chk-1".to_string(),
            status: CheckStatus::Delivered,
        };
        assert_eq!(err.to_string(), "Check chk-1 is delivered, not available");

        let err = LedgerError::not_found(EntityKind::Product, "p-9");
        assert_eq!(err.to_string(), "product not found: p-9");
    }

    #[test]
    fn test_only_storage_is_retryable() {
        assert!(LedgerError::storage("disk I/O error").is_retryable());
        assert!(!LedgerError::not_found(EntityKind::Customer, "c").is_retryable());
        assert!(!LedgerError::InvalidTransition {
            check_id: "c".to_string(),
            from: CheckStatus::Collected,
            to: CheckStatus::Deposited,
        }
        .is_retryable());
        assert!(!LedgerError::rejected("CHECK constraint failed: cost_price >= 0").is_retryable());
    }

    #[test]
    fn test_ledger_error_serializes_with_kind_tag() {
        let json = serde_json::to_value(LedgerError::storage("locked")).unwrap();
        assert_eq!(json["kind"], "storage");
        assert_eq!(json["message"], "locked");
    }
}
