//! # Sale Finalization
//!
//! Turns a cart into a recorded sale and applies its stock and account
//! movements.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Priced ──record──► Recorded ──stock × N──► StockApplied               │
//! │    │                                 (concurrent)   │                   │
//! │    │ record failed                                  ▼                   │
//! │    ▼                                          BalanceApplied ──► Complete
//! │  Failed (nothing applied)                                               │
//! │                                                                         │
//! │  After Recorded every step is attempted; failures become a             │
//! │  PartialCompletion. The cart is cleared only on Complete.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Amounts
//! | Case                                   | Ledger due        | Change     |
//! |----------------------------------------|-------------------|------------|
//! | paid < total (identified customer)     | total − paid      | 0          |
//! | paid > total                           | 0                 | paid − total |
//! | paid > total, keep_change_as_credit    | total − paid (< 0)| 0          |
//! | on account, nothing paid               | total             | 0          |
//!
//! A walk-in sale (no customer, or the final-consumer placeholder) must be
//! paid in full.

use cartera_core::pricing::{compute_change, compute_due_amount, compute_sale_totals};
use cartera_core::types::CardPlan;
use cartera_core::validation::{validate_installments, validate_non_negative_amount, validate_rate};
use cartera_core::{Cart, LedgerSet, Money, PaymentMethod, Rate, Sale, ValidationError};
use chrono::Utc;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::{Progress, SettlementEngine};
use crate::error::SettlementResult;
use crate::outcome::{EventKind, SaleReceipt, Stage, Step, StepOutcome, StockLevel, Warning};
use crate::retry::StepRunner;

/// Checkout form submitted with a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkout {
    /// `None` or the final-consumer id for a walk-in sale.
    pub customer_id: Option<String>,
    pub payment_method: PaymentMethod,
    /// Falls back to the store's default tax rate.
    pub tax_rate: Option<Rate>,
    pub freight: Money,
    /// Installment plan name, credit card only.
    pub card_plan: Option<String>,
    /// Defaults to the total (zero for on-account sales).
    pub paid_amount: Option<Money>,
    /// Credit an overpayment to the customer's account instead of handing
    /// back change. Ignored for walk-in sales.
    pub keep_change_as_credit: bool,
}

impl Checkout {
    pub fn new(payment_method: PaymentMethod) -> Self {
        Checkout {
            customer_id: None,
            payment_method,
            tax_rate: None,
            freight: Money::zero(),
            card_plan: None,
            paid_amount: None,
            keep_change_as_credit: false,
        }
    }

    pub fn for_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_tax_rate(mut self, rate: Rate) -> Self {
        self.tax_rate = Some(rate);
        self
    }

    pub fn with_freight(mut self, freight: Money) -> Self {
        self.freight = freight;
        self
    }

    pub fn with_card_plan(mut self, plan: impl Into<String>) -> Self {
        self.card_plan = Some(plan.into());
        self
    }

    pub fn with_paid_amount(mut self, paid: Money) -> Self {
        self.paid_amount = Some(paid);
        self
    }

    pub fn keep_change_as_credit(mut self) -> Self {
        self.keep_change_as_credit = true;
        self
    }
}

impl SettlementEngine {
    /// Finalizes a sale.
    ///
    /// On success the cart is cleared. On any error it is left untouched so
    /// the operator can inspect it; check [`crate::SettlementError::is_partial`]
    /// before re-submitting.
    pub async fn finalize_sale(&self, cart: &mut Cart, checkout: Checkout) -> SettlementResult<SaleReceipt> {
        let runner = self.runner();

        // Validate
        if cart.is_empty() {
            return Err(ValidationError::invalid("cart", "add at least one product").into());
        }
        let plan = self.validate_checkout(&checkout)?;

        let customer_id = match checkout.customer_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() && !self.config.is_final_consumer(id) => {
                Some(self.load_customer(&runner, id).await?.id)
            }
            _ => None,
        };

        let quantities = cart.quantities_by_product();
        let product_ids: Vec<String> = quantities.iter().map(|(id, _)| id.clone()).collect();
        self.load_products(&runner, &product_ids).await?;

        // Price
        let tax_rate = checkout.tax_rate.unwrap_or(self.config.store.default_tax_rate);
        let totals = compute_sale_totals(&cart.priced_lines(), tax_rate, checkout.freight, plan.as_ref());

        let paid = match checkout.paid_amount {
            Some(paid) => paid,
            None if checkout.payment_method == PaymentMethod::OnAccount => Money::zero(),
            None => totals.total,
        };
        validate_non_negative_amount("paid_amount", paid)?;

        let due = compute_due_amount(totals.total, paid);
        let keep_credit = checkout.keep_change_as_credit && customer_id.is_some();
        let (ledger_due, change) = if due.is_negative() && !keep_credit {
            (Money::zero(), compute_change(paid, totals.total))
        } else {
            (due, Money::zero())
        };

        if customer_id.is_none() && ledger_due.is_positive() {
            return Err(ValidationError::invalid("paid_amount", "a walk-in sale must be paid in full").into());
        }

        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            customer_id,
            items: cart.items.iter().map(|item| item.to_sale_item()).collect(),
            subtotal: totals.subtotal,
            tax: totals.tax,
            freight: totals.freight,
            surcharge: totals.surcharge,
            total: totals.total,
            installments: totals.installments,
            installment_amount: totals.installment_amount,
            payment_method: checkout.payment_method,
            paid_amount: paid,
            due_amount: ledger_due,
            change,
            created_at: Utc::now(),
        };

        info!(
            sale_id = %sale.id,
            total = %sale.total,
            due = %sale.due_amount,
            lines = sale.items.len(),
            "Sale priced, applying"
        );

        let receipt = self
            .spawn_writes(apply_sale(self.ledgers.clone(), runner, sale, quantities))
            .await?;

        cart.clear();
        Ok(receipt)
    }

    /// Payment method and installment plan coherence.
    fn validate_checkout(&self, checkout: &Checkout) -> SettlementResult<Option<CardPlan>> {
        if checkout.payment_method == PaymentMethod::Check {
            return Err(ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: [
                    PaymentMethod::Cash,
                    PaymentMethod::Transfer,
                    PaymentMethod::DebitCard,
                    PaymentMethod::CreditCard,
                    PaymentMethod::OnAccount,
                ]
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
            }
            .into());
        }

        if let Some(rate) = checkout.tax_rate {
            validate_rate("tax_rate", rate)?;
        }
        validate_non_negative_amount("freight", checkout.freight)?;

        let Some(name) = checkout.card_plan.as_deref() else {
            return Ok(None);
        };
        if checkout.payment_method != PaymentMethod::CreditCard {
            return Err(ValidationError::invalid("card_plan", "installment plans require a credit card").into());
        }

        let plan = self.config.card_plan(name).ok_or_else(|| ValidationError::NotAllowed {
            field: "card_plan".to_string(),
            allowed: self.config.card_plans.iter().map(|p| p.name.clone()).collect(),
        })?;
        validate_installments(plan.installments)?;
        validate_rate("interest_rate", plan.interest_rate)?;

        Ok(Some(plan.clone()))
    }
}

/// Write phase of a sale. Runs on its own task.
async fn apply_sale(
    ledgers: LedgerSet,
    runner: StepRunner,
    sale: Sale,
    quantities: Vec<(String, i64)>,
) -> SettlementResult<SaleReceipt> {
    let mut progress = Progress::new(EventKind::SaleFinalization, &sale.id, Stage::Priced);

    let step = Step::RecordSale { sale_id: sale.id.clone() };
    let result = runner.run(&step, || ledgers.sales.record(&sale)).await;
    if progress.track(step, result, |_| StepOutcome::Recorded).is_none() {
        return Err(progress.into_error());
    }
    progress.reach(Stage::Recorded);

    let products = &ledgers.products;
    let runner_ref = &runner;
    let adjustments = join_all(quantities.iter().map(|(product_id, quantity)| async move {
        let delta = -*quantity;
        let step = Step::AdjustStock {
            product_id: product_id.clone(),
            delta,
        };
        let result = runner_ref.run(&step, || products.adjust_stock(product_id, delta)).await;
        (product_id.clone(), step, result)
    }))
    .await;

    let mut stock_levels = Vec::with_capacity(adjustments.len());
    for (product_id, step, result) in adjustments {
        if let Some(stock) = progress.track(step, result, |s| StepOutcome::Stock { stock: *s }) {
            if stock < 0 {
                progress.warn(Warning::NegativeStock {
                    product_id: product_id.clone(),
                    stock,
                });
            }
            stock_levels.push(StockLevel { product_id, stock });
        }
    }
    progress.reach(Stage::StockApplied);

    let mut customer_balance = None;
    if let Some(customer_id) = sale.customer_id.as_deref() {
        if !sale.due_amount.is_zero() {
            let delta = sale.due_amount;
            let step = Step::AdjustCustomerBalance {
                customer_id: customer_id.to_string(),
                delta,
            };
            let result = runner
                .run(&step, || ledgers.customers.adjust_balance(customer_id, delta))
                .await;
            customer_balance = progress.track(step, result, |b| StepOutcome::Balance { balance: *b });
        } else {
            debug!(sale_id = %sale.id, "Sale settled at the counter, no account movement");
        }
    }
    progress.reach(Stage::BalanceApplied);

    let warnings = progress.finish()?;
    Ok(SaleReceipt {
        sale,
        stock_levels,
        customer_balance,
        warnings,
    })
}
