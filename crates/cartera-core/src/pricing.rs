//! # Pricing Module
//!
//! The money calculator: every figure the settlement engine writes to a ledger
//! comes out of these functions.
//!
//! ## Sale Totals Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  lines ──► subtotal = Σ(unit_price × qty)                               │
//! │                 │                                                       │
//! │                 ├──► tax = subtotal × tax_rate                          │
//! │                 ▼                                                       │
//! │            base = subtotal + tax + freight                              │
//! │                 │                                                       │
//! │      card plan? ├── no ──► total = base                                 │
//! │                 │                                                       │
//! │                 └── yes ─► surcharge   = base × interest                │
//! │                            total       = base + surcharge               │
//! │                            installment = total / installments           │
//! │                                                                         │
//! │  Nothing in this pipeline rounds. Rounding happens when money is shown. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::money::{Money, Rate};
use crate::types::{CardPlan, PriceTier, Product, PurchaseItem};

// =============================================================================
// Inputs & Outputs
// =============================================================================

/// A line as far as pricing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricedLine {
    pub unit_price: Money,
    pub quantity: i64,
}

impl PricedLine {
    pub fn new(unit_price: Money, quantity: i64) -> Self {
        PricedLine {
            unit_price,
            quantity,
        }
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// Canonical totals of a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub freight: Money,
    /// Card-plan interest, zero without a plan.
    pub surcharge: Money,
    pub total: Money,
    /// 1 without a plan.
    pub installments: u32,
    /// Present only with a card plan.
    pub installment_amount: Option<Money>,
}

impl SaleTotals {
    /// Subtotal + tax + freight, before any card surcharge.
    pub fn base(&self) -> Money {
        self.subtotal + self.tax + self.freight
    }
}

// =============================================================================
// Calculator
// =============================================================================

/// Computes the totals of a sale.
///
/// ## Example
/// ```rust
/// use cartera_core::money::{Money, Rate};
/// use cartera_core::pricing::{compute_sale_totals, PricedLine};
/// use cartera_core::types::CardPlan;
///
/// let plan = CardPlan {
///     name: "3 cuotas".to_string(),
///     installments: 3,
///     interest_rate: Rate::from_bps(1500),
/// };
/// let lines = [PricedLine::new(Money::from_major(100), 1)];
/// let totals = compute_sale_totals(&lines, Rate::from_bps(2100), Money::zero(), Some(&plan));
///
/// assert_eq!(totals.surcharge, Money::from_cents(1815));
/// assert_eq!(totals.total, Money::from_cents(13915));
/// ```
pub fn compute_sale_totals(
    lines: &[PricedLine],
    tax_rate: Rate,
    freight: Money,
    plan: Option<&CardPlan>,
) -> SaleTotals {
    let subtotal: Money = lines.iter().map(PricedLine::line_total).sum();
    let tax = subtotal.apply_rate(tax_rate);
    let base = subtotal + tax + freight;

    match plan {
        Some(plan) => {
            let surcharge = base.apply_rate(plan.interest_rate);
            let total = base + surcharge;
            SaleTotals {
                subtotal,
                tax,
                freight,
                surcharge,
                total,
                installments: plan.installments,
                installment_amount: Some(total.divide(plan.installments)),
            }
        }
        None => SaleTotals {
            subtotal,
            tax,
            freight,
            surcharge: Money::zero(),
            total: base,
            installments: 1,
            installment_amount: None,
        },
    }
}

/// Picks the unit price for a product under a price tier.
///
/// Wholesale falls back to retail when the product has no usable wholesale
/// price (unset, zero or negative). This is a business rule, not a guard:
/// a product without a bulk price is simply sold at counter price.
pub fn select_unit_price(product: &Product, tier: PriceTier) -> Money {
    match (tier, product.wholesale_price) {
        (PriceTier::Wholesale, Some(price)) if price.is_positive() => price,
        _ => product.retail_price,
    }
}

/// Cash handed back: `max(0, paid − total)`.
pub fn compute_change(paid: Money, total: Money) -> Money {
    let over = paid - total;
    if over.is_positive() {
        over
    } else {
        Money::zero()
    }
}

/// Amount still owed: `total − paid`. Negative when overpaid.
#[inline]
pub fn compute_due_amount(total: Money, paid: Money) -> Money {
    total - paid
}

/// Total of a purchase: `Σ(unit_cost × qty)`.
pub fn compute_purchase_total(items: &[PurchaseItem]) -> Money {
    items.iter().map(|i| i.unit_cost * i.quantity).sum()
}

// =============================================================================
// Unit Tests
// =============================================================================
