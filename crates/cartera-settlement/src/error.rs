//! # Settlement Error Types
//!
//! Error types for settlement events and configuration.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Settlement Error Categories                         │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Before writes  │  │  Ledger state   │  │  After writes began     │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  NotFound       │  │  Partial(report)        │ │
//! │  │                 │  │  CheckUnavail.  │  │                         │ │
//! │  │                 │  │  InvalidTrans.  │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │   Transient     │  │    Internal     │                              │
//! │  │                 │  │                 │                              │
//! │  │  Storage        │  │  Internal       │                              │
//! │  │  Timeout        │  │                 │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A plain (non-`Partial`) error always means nothing was written.

use cartera_core::error::EntityKind;
use cartera_core::{CheckStatus, LedgerError, ValidationError};
use thiserror::Error;

use crate::outcome::{PartialCompletion, StepError};

/// Result type alias for settlement events.
pub type SettlementResult<T> = Result<T, SettlementError>;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settlement error type covering every way an event can end unsuccessfully.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettlementError {
    // =========================================================================
    // Rejected before any write
    // =========================================================================
    /// The request is malformed or breaks a business rule.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Ledger state
    // =========================================================================
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("Check {check_id} is {status}, not available")]
    CheckUnavailable { check_id: String, status: CheckStatus },

    #[error("Check {check_id} cannot move from {from} to {to}")]
    InvalidTransition {
        check_id: String,
        from: CheckStatus,
        to: CheckStatus,
    },

    #[error("{entity} already exists: {id}")]
    Duplicate { entity: EntityKind, id: String },

    /// The store refused the write outright.
    #[error("Write rejected: {0}")]
    Rejected(String),

    // =========================================================================
    // Transient
    // =========================================================================
    /// Storage kept failing after the configured retries.
    #[error("Storage failure: {0}")]
    Storage(String),

    /// The event deadline elapsed.
    #[error("Settlement deadline exceeded")]
    Timeout,

    // =========================================================================
    // Partial
    // =========================================================================
    /// Some ledger writes were applied and some were not.
    #[error("{0}")]
    Partial(Box<PartialCompletion>),

    // =========================================================================
    // Internal
    // =========================================================================
    /// The engine itself failed (e.g., the write task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<LedgerError> for SettlementError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound { entity, id } => SettlementError::NotFound { entity, id },
            LedgerError::CheckUnavailable { check_id, status } => {
                SettlementError::CheckUnavailable { check_id, status }
            }
            LedgerError::InvalidTransition { check_id, from, to } => {
                SettlementError::InvalidTransition { check_id, from, to }
            }
            LedgerError::Duplicate { entity, id } => SettlementError::Duplicate { entity, id },
            LedgerError::Rejected { message } => SettlementError::Rejected(message),
            LedgerError::Storage { message } => SettlementError::Storage(message),
        }
    }
}

impl From<StepError> for SettlementError {
    fn from(err: StepError) -> Self {
        match err {
            StepError::Ledger(err) => err.into(),
            StepError::Timeout => SettlementError::Timeout,
            StepError::Panicked(message) => SettlementError::Internal(message),
        }
    }
}

impl From<PartialCompletion> for SettlementError {
    fn from(report: PartialCompletion) -> Self {
        SettlementError::Partial(Box::new(report))
    }
}

impl From<tokio::task::JoinError> for SettlementError {
    fn from(err: tokio::task::JoinError) -> Self {
        SettlementError::Internal(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SettlementError {
    /// Returns true when at least one ledger write was applied.
    pub fn is_partial(&self) -> bool {
        matches!(self, SettlementError::Partial(_))
    }

    /// The reconciliation report, if writes were applied.
    pub fn partial(&self) -> Option<&PartialCompletion> {
        match self {
            SettlementError::Partial(report) => Some(report),
            _ => None,
        }
    }

    /// Returns true if re-submitting the same event may succeed.
    ///
    /// Never true for `Partial`: re-submitting would apply the completed
    /// steps a second time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SettlementError::Storage(_) | SettlementError::Timeout)
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Failures loading or saving [`crate::config::SettlementConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid settlement configuration: {0}")]
    Invalid(String),

    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    #[error("Failed to save config: {0}")]
    SaveFailed(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_map_one_to_one() {
        let err: SettlementError = LedgerError::CheckUnavailable {
            check_id: "c-1".into(),
            status: CheckStatus::Delivered,
        }
        .into();
        assert_eq!(
            err,
            SettlementError::CheckUnavailable {
                check_id: "c-1".into(),
                status: CheckStatus::Delivered,
            }
        );

        let err: SettlementError = LedgerError::storage("disk I/O error").into();
        assert!(err.is_retryable());
        assert!(!err.is_partial());
        let err: SettlementError = LedgerError::rejected("CHECK constraint failed: amount > 0").into();
        assert_eq!(err, SettlementError::Rejected("CHECK constraint failed: amount > 0".into()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_timeout_step_error() {
        let err: SettlementError = StepError::Timeout.into();
        assert_eq!(err, SettlementError::Timeout);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_validation_display() {
        let err: SettlementError = ValidationError::required("supplier").into();
        assert_eq!(err.to_string(), "Validation failed: supplier is required");
    }
}
