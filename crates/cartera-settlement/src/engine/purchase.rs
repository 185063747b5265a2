//! # Purchase Registration
//!
//! Records merchandise bought from a supplier, adds it to stock and debits
//! the supplier account.
//!
//! ```text
//! Priced ──record──► Recorded ──(stock + cost) × N──► StockApplied ──supplier +total──► SupplierDebited ──► Complete
//! ```
//!
//! Lines naming the same product are merged: quantities add up and the
//! last unit cost wins.

use cartera_core::pricing::compute_purchase_total;
use cartera_core::validation::{require_id, validate_non_negative_amount, validate_quantity};
use cartera_core::{
    LedgerSet, Purchase, PurchaseItem, PurchaseStatus, ValidationError, DEFAULT_INVOICE_NUMBER,
};
use chrono::Utc;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{Progress, SettlementEngine};
use crate::error::SettlementResult;
use crate::outcome::{EventKind, PurchaseReceipt, Stage, Step, StepOutcome, StockLevel};
use crate::retry::StepRunner;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub supplier_id: Option<String>,
    /// Supplier invoice number; `"N/A"` when blank.
    pub invoice_number: Option<String>,
    pub items: Vec<PurchaseItem>,
    /// Re-base each product's cost price to the purchase unit cost.
    pub update_cost_prices: bool,
}

impl SettlementEngine {
    /// Registers a purchase as `PendingPayment`.
    pub async fn register_purchase(&self, request: PurchaseRequest) -> SettlementResult<PurchaseReceipt> {
        let runner = self.runner();

        let supplier_id = require_id("supplier", request.supplier_id.as_deref())?;
        let items = merge_lines(&request.items)?;

        let supplier = self.load_supplier(&runner, supplier_id).await?;
        let product_ids: Vec<String> = items.iter().map(|item| item.product_id.clone()).collect();
        self.load_products(&runner, &product_ids).await?;

        let invoice_number = match request.invoice_number.as_deref().map(str::trim) {
            Some(number) if !number.is_empty() => number.to_string(),
            _ => DEFAULT_INVOICE_NUMBER.to_string(),
        };

        let now = Utc::now();
        let purchase = Purchase {
            id: Uuid::new_v4().to_string(),
            supplier_id: supplier.id,
            invoice_number,
            total: compute_purchase_total(&items),
            items,
            status: PurchaseStatus::PendingPayment,
            created_at: now,
            updated_at: now,
        };

        info!(
            purchase_id = %purchase.id,
            supplier_id = %purchase.supplier_id,
            total = %purchase.total,
            "Purchase priced, applying"
        );

        self.spawn_writes(apply_purchase(
            self.ledgers.clone(),
            runner,
            purchase,
            request.update_cost_prices,
        ))
        .await
    }
}

/// Validates the lines and merges repeated products.
fn merge_lines(lines: &[PurchaseItem]) -> SettlementResult<Vec<PurchaseItem>> {
    if lines.is_empty() {
        return Err(ValidationError::invalid("items", "add at least one product").into());
    }

    let mut merged: Vec<PurchaseItem> = Vec::with_capacity(lines.len());
    for line in lines {
        let product_id = require_id("product", Some(line.product_id.as_str()))?;
        validate_quantity(line.quantity)?;
        validate_non_negative_amount("unit_cost", line.unit_cost)?;

        match merged.iter_mut().find(|m| m.product_id == product_id) {
            Some(existing) => {
                let quantity = existing.quantity + line.quantity;
                validate_quantity(quantity)?;
                existing.quantity = quantity;
                existing.unit_cost = line.unit_cost;
            }
            None => merged.push(PurchaseItem {
                product_id: product_id.to_string(),
                quantity: line.quantity,
                unit_cost: line.unit_cost,
            }),
        }
    }
    Ok(merged)
}

async fn apply_purchase(
    ledgers: LedgerSet,
    runner: StepRunner,
    purchase: Purchase,
    update_cost_prices: bool,
) -> SettlementResult<PurchaseReceipt> {
    let mut progress = Progress::new(EventKind::PurchaseRegistration, &purchase.id, Stage::Priced);

    let step = Step::RecordPurchase {
        purchase_id: purchase.id.clone(),
    };
    let result = runner.run(&step, || ledgers.purchases.record(&purchase)).await;
    if progress.track(step, result, |_| StepOutcome::Recorded).is_none() {
        return Err(progress.into_error());
    }
    progress.reach(Stage::Recorded);

    // Per product: stock first, then the cost re-base. Products run concurrently.
    let products = &ledgers.products;
    let runner_ref = &runner;
    let lines = join_all(purchase.items.iter().map(|item| async move {
        let stock_step = Step::AdjustStock {
            product_id: item.product_id.clone(),
            delta: item.quantity,
        };
        let stock = runner_ref
            .run(&stock_step, || products.adjust_stock(&item.product_id, item.quantity))
            .await;

        let cost = if update_cost_prices {
            let cost_step = Step::SetCostPrice {
                product_id: item.product_id.clone(),
                cost: item.unit_cost,
            };
            let result = runner_ref
                .run(&cost_step, || products.set_cost_price(&item.product_id, item.unit_cost))
                .await;
            Some((cost_step, result))
        } else {
            None
        };

        (item, stock_step, stock, cost)
    }))
    .await;

    let mut stock_levels = Vec::with_capacity(lines.len());
    for (item, stock_step, stock, cost) in lines {
        if let Some(stock) = progress.track(stock_step, stock, |s| StepOutcome::Stock { stock: *s }) {
            stock_levels.push(StockLevel {
                product_id: item.product_id.clone(),
                stock,
            });
        }
        if let Some((cost_step, result)) = cost {
            let unit_cost = item.unit_cost;
            progress.track(cost_step, result, |_| StepOutcome::CostPrice { cost: unit_cost });
        }
    }
    progress.reach(Stage::StockApplied);

    let mut supplier_balance = None;
    if !purchase.total.is_zero() {
        let step = Step::AdjustSupplierBalance {
            supplier_id: purchase.supplier_id.clone(),
            delta: purchase.total,
        };
        let result = runner
            .run(&step, || ledgers.suppliers.adjust_balance(&purchase.supplier_id, purchase.total))
            .await;
        supplier_balance = progress.track(step, result, |b| StepOutcome::Balance { balance: *b });
    }
    progress.reach(Stage::SupplierDebited);

    let warnings = progress.finish()?;
    Ok(PurchaseReceipt {
        purchase,
        stock_levels,
        supplier_balance,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fast_config, fixture, seed_product, seed_supplier, FailingSuppliers};
    use crate::SettlementError;
    use cartera_core::Money;

    fn line(product_id: &str, quantity: i64, cost: i64) -> PurchaseItem {
        PurchaseItem {
            product_id: product_id.to_string(),
            quantity,
            unit_cost: Money::from_major(cost),
        }
    }

    #[tokio::test]
    async fn test_purchase_adds_stock_and_debits_supplier() {
        let fx = fixture().await;
        let supplier = seed_supplier(&fx.db, "Distribuidora Norte", Money::from_major(100)).await;
        let yerba = seed_product(&fx.db, "YER-1KG", Money::from_major(100), 2).await;
        let mate = seed_product(&fx.db, "MATE-01", Money::from_major(50), 0).await;

        let request = PurchaseRequest {
            supplier_id: Some(supplier.id.clone()),
            invoice_number: Some("  ".into()),
            items: vec![line(&yerba.id, 5, 60), line(&mate.id, 2, 20), line(&yerba.id, 1, 65)],
            update_cost_prices: true,
        };
        let receipt = fx.engine.register_purchase(request).await.unwrap();

        assert_eq!(receipt.purchase.invoice_number, "N/A");
        assert_eq!(receipt.purchase.status, PurchaseStatus::PendingPayment);
        assert_eq!(receipt.purchase.items.len(), 2);
        // 6 × 65 + 2 × 20
        assert_eq!(receipt.purchase.total, Money::from_major(430));
        assert_eq!(receipt.supplier_balance, Some(Money::from_major(530)));

        let ledgers = fx.db.ledgers();
        let yerba = ledgers.products.get(&yerba.id).await.unwrap();
        assert_eq!(yerba.stock, 8);
        assert_eq!(yerba.cost_price, Money::from_major(65));
        assert_eq!(ledgers.products.get(&mate.id).await.unwrap().stock, 2);
        assert!(ledgers.purchases.get(&receipt.purchase.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_cost_prices_untouched_unless_requested() {
        let fx = fixture().await;
        let supplier = seed_supplier(&fx.db, "Distribuidora Norte", Money::zero()).await;
        let yerba = seed_product(&fx.db, "YER-1KG", Money::from_major(100), 0).await;

        let request = PurchaseRequest {
            supplier_id: Some(supplier.id.clone()),
            items: vec![line(&yerba.id, 1, 70)],
            ..Default::default()
        };
        fx.engine.register_purchase(request).await.unwrap();

        let product = fx.db.ledgers().products.get(&yerba.id).await.unwrap();
        assert_eq!(product.cost_price, yerba.cost_price);
    }

    #[tokio::test]
    async fn test_purchase_validation() {
        let fx = fixture().await;
        let supplier = seed_supplier(&fx.db, "Distribuidora Norte", Money::zero()).await;
        let yerba = seed_product(&fx.db, "YER-1KG", Money::from_major(100), 0).await;

        let err = fx
            .engine
            .register_purchase(PurchaseRequest {
                items: vec![line(&yerba.id, 1, 10)],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err, SettlementError::Validation(ValidationError::required("supplier")));

        let err = fx
            .engine
            .register_purchase(PurchaseRequest {
                supplier_id: Some(supplier.id.clone()),
                items: vec![line(&yerba.id, 0, 10)],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::Validation(ValidationError::MustBePositive { .. })));

        let err = fx
            .engine
            .register_purchase(PurchaseRequest {
                supplier_id: Some(supplier.id.clone()),
                items: vec![line("missing", 1, 10)],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_merged_quantity_is_bounded() {
        let fx = fixture().await;
        let supplier = seed_supplier(&fx.db, "Distribuidora Norte", Money::zero()).await;
        let yerba = seed_product(&fx.db, "YER-1KG", Money::from_major(100), 0).await;

        let err = fx
            .engine
            .register_purchase(PurchaseRequest {
                supplier_id: Some(supplier.id.clone()),
                items: vec![line(&yerba.id, 600, 10), line(&yerba.id, 500, 10)],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SettlementError::Validation(ValidationError::OutOfRange { max: 999, .. })
        ));

        assert_eq!(fx.db.ledgers().products.get(&yerba.id).await.unwrap().stock, 0);
        let stored = fx.db.suppliers().get_by_id(&supplier.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, Money::zero());
    }

    #[tokio::test]
    async fn test_supplier_failure_leaves_stock_applied() {
        let fx = fixture().await;
        let supplier = seed_supplier(&fx.db, "Distribuidora Norte", Money::zero()).await;
        let yerba = seed_product(&fx.db, "YER-1KG", Money::from_major(100), 0).await;
        let engine = SettlementEngine::new(FailingSuppliers::wrap(fx.db.ledgers()), fast_config());

        let err = engine
            .register_purchase(PurchaseRequest {
                supplier_id: Some(supplier.id.clone()),
                items: vec![line(&yerba.id, 3, 10)],
                ..Default::default()
            })
            .await
            .unwrap_err();

        let report = err.partial().expect("partial completion");
        assert_eq!(report.stage, Stage::StockApplied);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(fx.db.ledgers().products.get(&yerba.id).await.unwrap().stock, 3);
    }
}
