//! # Settlement Outcomes
//!
//! What an event reports back: a receipt when every write landed, or a
//! [`PartialCompletion`] when only some did.
//!
//! ## Reading a Partial Completion
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sale s-42 (3 lines)                                                   │
//! │                                                                         │
//! │  completed:  record_sale        → recorded                             │
//! │              adjust_stock p-1   → stock 7                              │
//! │              adjust_stock p-3   → stock -2   (warning: negative stock) │
//! │  failed:     adjust_stock p-2   → storage failure                      │
//! │  stage:      recorded           (last stage every step got through)    │
//! │                                                                         │
//! │  Nothing above is rolled back. An operator reconciles p-2 by hand.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use cartera_core::{Check, CheckStatus, LedgerError, Money, PaymentMethod, Purchase, PurchaseStatus, Sale};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Events & Stages
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SaleFinalization,
    PurchaseRegistration,
    CustomerPayment,
    SupplierPayment,
    StockRecount,
    CheckRegistration,
    CheckMove,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::SaleFinalization => "sale finalization",
            EventKind::PurchaseRegistration => "purchase registration",
            EventKind::CustomerPayment => "customer payment",
            EventKind::SupplierPayment => "supplier payment",
            EventKind::StockRecount => "stock recount",
            EventKind::CheckRegistration => "check registration",
            EventKind::CheckMove => "check move",
        };
        f.write_str(name)
    }
}

/// Progress markers of the event state machines.
///
/// ```text
/// Sale:              Priced → Recorded → StockApplied → BalanceApplied → Complete
/// Purchase:          Priced → Recorded → StockApplied → SupplierDebited → Complete
/// Customer payment:  Validated → CheckRegistered? → BalanceReduced → Complete
/// Supplier payment:  Validated → ChecksDelivered → SupplierCredited → PurchaseClosed? → Complete
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validated,
    Priced,
    Recorded,
    CheckRegistered,
    StockApplied,
    BalanceApplied,
    BalanceReduced,
    SupplierDebited,
    ChecksDelivered,
    SupplierCredited,
    PurchaseClosed,
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validated => "validated",
            Stage::Priced => "priced",
            Stage::Recorded => "recorded",
            Stage::CheckRegistered => "check_registered",
            Stage::StockApplied => "stock_applied",
            Stage::BalanceApplied => "balance_applied",
            Stage::BalanceReduced => "balance_reduced",
            Stage::SupplierDebited => "supplier_debited",
            Stage::ChecksDelivered => "checks_delivered",
            Stage::SupplierCredited => "supplier_credited",
            Stage::PurchaseClosed => "purchase_closed",
            Stage::Complete => "complete",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Steps
// =============================================================================

/// One ledger write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    RecordSale { sale_id: String },
    RecordPurchase { purchase_id: String },
    AdjustStock { product_id: String, delta: i64 },
    SetStock { product_id: String, value: i64 },
    SetCostPrice { product_id: String, cost: Money },
    AdjustCustomerBalance { customer_id: String, delta: Money },
    AdjustSupplierBalance { supplier_id: String, delta: Money },
    RegisterCheck { number: String, amount: Money },
    DeliverCheck { check_id: String, supplier_id: String },
    MoveCheck { check_id: String, status: CheckStatus },
    ClosePurchase { purchase_id: String },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::RecordSale { sale_id } => write!(f, "record sale {sale_id}"),
            Step::RecordPurchase { purchase_id } => write!(f, "record purchase {purchase_id}"),
            Step::AdjustStock { product_id, delta } => write!(f, "adjust stock of {product_id} by {delta}"),
            Step::SetStock { product_id, value } => write!(f, "set stock of {product_id} to {value}"),
            Step::SetCostPrice { product_id, cost } => write!(f, "set cost of {product_id} to {cost}"),
            Step::AdjustCustomerBalance { customer_id, delta } => {
                write!(f, "adjust balance of customer {customer_id} by {delta}")
            }
            Step::AdjustSupplierBalance { supplier_id, delta } => {
                write!(f, "adjust balance of supplier {supplier_id} by {delta}")
            }
            Step::RegisterCheck { number, amount } => write!(f, "register check {number} for {amount}"),
            Step::DeliverCheck { check_id, supplier_id } => {
                write!(f, "deliver check {check_id} to supplier {supplier_id}")
            }
            Step::MoveCheck { check_id, status } => write!(f, "move check {check_id} to {status}"),
            Step::ClosePurchase { purchase_id } => write!(f, "close purchase {purchase_id}"),
        }
    }
}

/// What a completed step left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepOutcome {
    Recorded,
    Stock { stock: i64 },
    CostPrice { cost: Money },
    Balance { balance: Money },
    Check { check_id: String, status: CheckStatus },
    Purchase { status: PurchaseStatus },
}

/// Why a step failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "error", rename_all = "snake_case")]
pub enum StepError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The event deadline passed while the step was pending. Whether the
    /// write landed is unknown.
    #[error("deadline elapsed before the step completed")]
    Timeout,

    /// The ledger call panicked. Whether the write landed is unknown.
    #[error("step aborted: {0}")]
    Panicked(String),
}

impl StepError {
    /// True when the write may or may not have landed.
    pub fn is_fate_unknown(&self) -> bool {
        matches!(self, StepError::Timeout | StepError::Panicked(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedStep {
    pub step: Step,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedStep {
    pub step: Step,
    pub error: StepError,
}

// =============================================================================
// Warnings
// =============================================================================

/// Non-fatal anomalies. They never fail an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Stock went below zero.
    NegativeStock { product_id: String, stock: i64 },

    /// A supplier was paid more than the balance owed.
    SupplierOverpayment {
        supplier_id: String,
        balance_before: Money,
        amount: Money,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NegativeStock { product_id, stock } => {
                write!(f, "stock of {product_id} is negative ({stock})")
            }
            Warning::SupplierOverpayment {
                supplier_id,
                balance_before,
                amount,
            } => write!(f, "supplier {supplier_id} paid {amount} against a balance of {balance_before}"),
        }
    }
}

// =============================================================================
// Partial Completion
// =============================================================================

/// Reconciliation report for an event whose writes only partly landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialCompletion {
    pub event: EventKind,
    /// Id of the sale or purchase, or the entity the event was about.
    pub reference: String,
    /// Last stage every step up to it got through.
    pub stage: Stage,
    pub completed: Vec<CompletedStep>,
    /// In step order; the first entry is the first failure.
    pub failed: Vec<FailedStep>,
    pub warnings: Vec<Warning>,
}

impl PartialCompletion {
    pub fn first_failure(&self) -> Option<&FailedStep> {
        self.failed.first()
    }

    pub fn is_completed(&self, step: &Step) -> bool {
        self.completed.iter().any(|c| &c.step == step)
    }

    pub fn is_failed(&self, step: &Step) -> bool {
        self.failed.iter().any(|f| &f.step == step)
    }

    /// Outcome of a completed step, if it completed.
    pub fn outcome_of(&self, step: &Step) -> Option<&StepOutcome> {
        self.completed.iter().find(|c| &c.step == step).map(|c| &c.outcome)
    }
}

impl fmt::Display for PartialCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} partially applied at stage {}: {} step(s) completed, {} failed",
            self.event,
            self.reference,
            self.stage,
            self.completed.len(),
            self.failed.len()
        )?;
        if let Some(first) = self.first_failure() {
            write!(f, "; first failure: {}: {}", first.step, first.error)?;
        }
        Ok(())
    }
}

// =============================================================================
// Receipts
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: String,
    pub stock: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub sale: Sale,
    pub stock_levels: Vec<StockLevel>,
    /// Customer balance after the sale, when it was touched.
    pub customer_balance: Option<Money>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub purchase: Purchase,
    pub stock_levels: Vec<StockLevel>,
    /// Supplier balance after the purchase, when it was touched.
    pub supplier_balance: Option<Money>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerPaymentReceipt {
    pub customer_id: String,
    pub amount: Money,
    pub method: PaymentMethod,
    /// The check that entered the portfolio, for check payments.
    pub check: Option<Check>,
    pub balance: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierPaymentReceipt {
    pub supplier_id: String,
    pub cash: Money,
    pub delivered_checks: Vec<Check>,
    /// Cash plus the amounts of the delivered checks.
    pub credited: Money,
    pub balance: Money,
    /// The referenced purchase, now paid.
    pub purchase: Option<Purchase>,
    pub warnings: Vec<Warning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> PartialCompletion {
        PartialCompletion {
            event: EventKind::SaleFinalization,
            reference: "s-1".into(),
            stage: Stage::Recorded,
            completed: vec![CompletedStep {
                step: Step::RecordSale { sale_id: "s-1".into() },
                outcome: StepOutcome::Recorded,
            }],
            failed: vec![FailedStep {
                step: Step::AdjustStock {
                    product_id: "p-2".into(),
                    delta: -1,
                },
                error: StepError::Ledger(LedgerError::storage("disk full")),
            }],
            warnings: vec![],
        }
    }

    #[test]
    fn test_display_names_first_failure() {
        let text = report().to_string();
        assert!(text.starts_with("sale finalization s-1 partially applied at stage recorded"));
        assert!(text.contains("adjust stock of p-2 by -1"));
        assert!(text.contains("disk full"));
    }

    #[test]
    fn test_report_serializes_for_reconciliation() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["event"], "sale_finalization");
        assert_eq!(json["stage"], "recorded");
        assert_eq!(json["completed"][0]["step"]["step"], "record_sale");
        assert_eq!(json["failed"][0]["error"]["type"], "ledger");
        assert_eq!(json["failed"][0]["error"]["error"]["kind"], "storage");

        let timeout = serde_json::to_value(StepError::Timeout).unwrap();
        assert_eq!(timeout["type"], "timeout");

        let panicked = serde_json::to_value(StepError::Panicked("attempt to add with overflow".into())).unwrap();
        assert_eq!(panicked["type"], "panicked");
        assert_eq!(panicked["error"], "attempt to add with overflow");
    }

    #[test]
    fn test_lookup_helpers() {
        let report = report();
        let sale = Step::RecordSale { sale_id: "s-1".into() };
        assert!(report.is_completed(&sale));
        assert_eq!(report.outcome_of(&sale), Some(&StepOutcome::Recorded));
        assert!(report.is_failed(&Step::AdjustStock {
            product_id: "p-2".into(),
            delta: -1
        }));
    }
}
