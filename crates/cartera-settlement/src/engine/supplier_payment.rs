//! # Supplier Payment
//!
//! Pays a supplier with cash and/or checks from the portfolio, optionally
//! settling one purchase.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Validated ──deliver × N──► ChecksDelivered ──credit──► SupplierCredited│
//! │              (concurrent,                                    │          │
//! │               compare-and-set)                               ▼          │
//! │                                              PurchaseClosed? ──► Complete
//! │                                                                         │
//! │  A check another payment already claimed fails alone with              │
//! │  CheckUnavailable. The supplier is credited with the cash plus the     │
//! │  checks that were actually delivered, and the purchase is closed       │
//! │  whenever that credit landed.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use cartera_core::error::EntityKind;
use cartera_core::validation::{require_id, validate_non_negative_amount, validate_positive_amount};
use cartera_core::{Check, CheckStatus, LedgerSet, Money, Purchase, PurchaseStatus, ValidationError};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{lookup, Progress, SettlementEngine};
use crate::error::SettlementResult;
use crate::outcome::{EventKind, Stage, Step, StepOutcome, SupplierPaymentReceipt, Warning};
use crate::retry::StepRunner;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplierPaymentRequest {
    pub supplier_id: Option<String>,
    pub cash: Money,
    /// Portfolio checks handed over.
    pub check_ids: Vec<String>,
    /// Purchase this payment settles.
    pub purchase_id: Option<String>,
}

/// Everything the write phase needs, resolved during validation.
struct SupplierPaymentPlan {
    supplier_id: String,
    balance_before: Money,
    cash: Money,
    checks: Vec<Check>,
    purchase_id: Option<String>,
}

impl SettlementEngine {
    /// Pays a supplier.
    pub async fn pay_supplier(&self, request: SupplierPaymentRequest) -> SettlementResult<SupplierPaymentReceipt> {
        let runner = self.runner();

        let supplier_id = require_id("supplier", request.supplier_id.as_deref())?;
        validate_non_negative_amount("cash", request.cash)?;

        let mut seen = HashSet::new();
        for id in &request.check_ids {
            if !seen.insert(id.as_str()) {
                return Err(ValidationError::Duplicate {
                    field: "check".to_string(),
                    value: id.clone(),
                }
                .into());
            }
        }

        let supplier = self.load_supplier(&runner, supplier_id).await?;
        let checks = self.load_checks(&runner, &request.check_ids).await?;

        let purchase_id = match request.purchase_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Some(self.load_open_purchase(&runner, id, &supplier.id).await?.id),
            _ => None,
        };

        let offered = request.cash + checks.iter().map(|c| c.amount).sum::<Money>();
        validate_positive_amount("payment", offered)?;

        info!(
            supplier_id = %supplier.id,
            cash = %request.cash,
            checks = checks.len(),
            total = %offered,
            "Supplier payment validated, applying"
        );

        let plan = SupplierPaymentPlan {
            supplier_id: supplier.id,
            balance_before: supplier.balance,
            cash: request.cash,
            checks,
            purchase_id,
        };
        self.spawn_writes(apply_supplier_payment(self.ledgers.clone(), runner, plan))
            .await
    }

    /// Reads every selected check. Status is not checked here: delivery
    /// re-validates it in the same write that changes it.
    async fn load_checks(&self, runner: &StepRunner, ids: &[String]) -> SettlementResult<Vec<Check>> {
        let checks = &self.ledgers.checks;
        let reads = ids.iter().map(|id| async move {
            runner
                .run(&lookup(EntityKind::Check, id), || checks.get(id))
                .await
        });

        let mut loaded = Vec::with_capacity(ids.len());
        for result in join_all(reads).await {
            loaded.push(result?);
        }
        Ok(loaded)
    }

    async fn load_open_purchase(
        &self,
        runner: &StepRunner,
        id: &str,
        supplier_id: &str,
    ) -> SettlementResult<Purchase> {
        let purchases = &self.ledgers.purchases;
        let purchase = runner
            .run(&lookup(EntityKind::Purchase, id), || purchases.get(id))
            .await?;

        if purchase.supplier_id != supplier_id {
            return Err(ValidationError::invalid("purchase", "belongs to another supplier").into());
        }
        if purchase.status == PurchaseStatus::Paid {
            return Err(ValidationError::invalid("purchase", "is already paid").into());
        }
        Ok(purchase)
    }
}

async fn apply_supplier_payment(
    ledgers: LedgerSet,
    runner: StepRunner,
    plan: SupplierPaymentPlan,
) -> SettlementResult<SupplierPaymentReceipt> {
    let mut progress = Progress::new(EventKind::SupplierPayment, &plan.supplier_id, Stage::Validated);

    let checks = &ledgers.checks;
    let runner_ref = &runner;
    let supplier_id = plan.supplier_id.as_str();
    let deliveries = join_all(plan.checks.iter().map(|check| async move {
        let step = Step::DeliverCheck {
            check_id: check.id.clone(),
            supplier_id: supplier_id.to_string(),
        };
        let result = runner_ref.run(&step, || checks.deliver(&check.id, supplier_id)).await;
        (step, result)
    }))
    .await;

    let mut delivered_checks = Vec::with_capacity(deliveries.len());
    for (step, result) in deliveries {
        let delivered = progress.track(step, result, |c: &Check| StepOutcome::Check {
            check_id: c.id.clone(),
            status: CheckStatus::Delivered,
        });
        delivered_checks.extend(delivered);
    }
    progress.reach(Stage::ChecksDelivered);

    let credit = plan.cash + delivered_checks.iter().map(|c| c.amount).sum::<Money>();
    let mut balance = None;
    if credit.is_positive() {
        let delta = -credit;
        let step = Step::AdjustSupplierBalance {
            supplier_id: plan.supplier_id.clone(),
            delta,
        };
        let result = runner
            .run(&step, || ledgers.suppliers.adjust_balance(supplier_id, delta))
            .await;
        balance = progress.track(step, result, |b| StepOutcome::Balance { balance: *b });

        if balance.is_some() && credit > plan.balance_before {
            progress.warn(Warning::SupplierOverpayment {
                supplier_id: plan.supplier_id.clone(),
                balance_before: plan.balance_before,
                amount: credit,
            });
        }
    }
    progress.reach(Stage::SupplierCredited);

    let mut purchase = None;
    if let (Some(purchase_id), Some(_)) = (plan.purchase_id.as_deref(), balance) {
        let step = Step::ClosePurchase {
            purchase_id: purchase_id.to_string(),
        };
        let result = runner
            .run(&step, || ledgers.purchases.set_status(purchase_id, PurchaseStatus::Paid))
            .await;
        purchase = progress.track(step, result, |p: &Purchase| StepOutcome::Purchase { status: p.status });
        progress.reach(Stage::PurchaseClosed);
    }

    let warnings = progress.finish()?;
    Ok(SupplierPaymentReceipt {
        supplier_id: plan.supplier_id,
        cash: plan.cash,
        delivered_checks,
        credited: credit,
        balance: balance.unwrap_or(plan.balance_before),
        purchase,
        warnings,
    })
}
