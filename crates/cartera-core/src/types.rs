//! # Domain Types
//!
//! Core domain types used throughout Cartera.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Customer     │   │    Supplier     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  tax_id         │   │  tax_id         │       │
//! │  │  stock          │   │  balance (+owes)│   │  balance (+owed)│       │
//! │  │  cost / retail  │   └─────────────────┘   └─────────────────┘       │
//! │  │  / wholesale    │                                                    │
//! │  └─────────────────┘   ┌─────────────────┐   ┌─────────────────┐       │
//! │                        │      Sale       │   │    Purchase     │       │
//! │  ┌─────────────────┐   │  ─────────────  │   │  ─────────────  │       │
//! │  │     Check       │   │  immutable      │   │  invoice "N/A"  │       │
//! │  │  ─────────────  │   │  price + cost   │   │  PendingPayment │       │
//! │  │  number, bank   │   │  snapshots      │   │  → Paid         │       │
//! │  │  InPortfolio ─► │   └─────────────────┘   └─────────────────┘       │
//! │  │  Delivered ...  │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for relations and ledger calls
//! - Business ID: (sku, check number, invoice number) - human-readable

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::{Money, Rate};

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Product
// =============================================================================

/// A product kept in stock.
///
/// `stock` is signed. Sales are never blocked on availability, so it can go
/// below zero; the engine reports that as a warning instead of refusing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name, frozen into sale lines.
    pub name: String,

    /// Units on hand.
    pub stock: i64,

    /// Last known unit cost (re-based by purchases).
    pub cost_price: Money,

    /// Counter price.
    pub retail_price: Money,

    /// Bulk price. Unset or non-positive means "use retail".
    pub wholesale_price: Option<Money>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a product with a fresh id and zero stock.
    pub fn new(sku: impl Into<String>, name: impl Into<String>, cost_price: Money, retail_price: Money) -> Self {
        let now = Utc::now();
        Product {
            id: new_id(),
            sku: sku.into(),
            name: name.into(),
            stock: 0,
            cost_price,
            retail_price,
            wholesale_price: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_wholesale_price(mut self, price: Money) -> Self {
        self.wholesale_price = Some(price);
        self
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = stock;
        self
    }
}

// =============================================================================
// Customer & Supplier
// =============================================================================

/// A customer with a running account.
///
/// Positive balance: the customer owes the store. Negative: store credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub tax_id: Option<String>,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Customer {
            id: new_id(),
            name: name.into(),
            tax_id: None,
            balance: Money::zero(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_balance(mut self, balance: Money) -> Self {
        self.balance = balance;
        self
    }
}

/// A supplier the store buys from.
///
/// Positive balance: the store owes the supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub tax_id: Option<String>,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Supplier {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Supplier {
            id: new_id(),
            name: name.into(),
            tax_id: None,
            balance: Money::zero(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_balance(mut self, balance: Money) -> Self {
        self.balance = balance;
        self
    }
}

// =============================================================================
// Check Status
// =============================================================================

/// Custody state of a third-party check.
///
/// ```text
///                  ┌──────────► Deposited ──► Collected (terminal)
///                  │                │
///  InPortfolio ────┼────────────────┴──────► Rejected
///                  │
///                  └──────────► Delivered (terminal, handed to a supplier)
/// ```
///
/// Operators may move a non-terminal check to any status. Only
/// `InPortfolio` checks can fund a supplier payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Held by the store, available to deposit or hand over.
    InPortfolio,
    /// Deposited at the bank, not yet cleared.
    Deposited,
    /// Cleared.
    Collected,
    /// Bounced.
    Rejected,
    /// Handed to a supplier as payment.
    Delivered,
}

impl CheckStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::InPortfolio => "in_portfolio",
            CheckStatus::Deposited => "deposited",
            CheckStatus::Collected => "collected",
            CheckStatus::Rejected => "rejected",
            CheckStatus::Delivered => "delivered",
        }
    }

    /// Collected and delivered checks have left the store's hands for good.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, CheckStatus::Collected | CheckStatus::Delivered)
    }
}

impl Default for CheckStatus {
    fn default() -> Self {
        CheckStatus::InPortfolio
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Check
// =============================================================================

/// A third-party check in (or once in) the store's portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: String,
    pub number: String,
    pub bank: String,
    /// Who signed the check.
    pub drawer: String,
    pub drawer_tax_id: Option<String>,
    pub amount: Money,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: CheckStatus,
    /// Customer that handed the check in, if it came from a payment.
    pub received_from: Option<String>,
    /// Supplier the check was delivered to.
    pub delivered_to: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated data for a check entering the portfolio.
///
/// Built by [`crate::validation::validate_check_details`] or directly by
/// callers that already hold complete data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCheck {
    pub number: String,
    pub bank: String,
    pub drawer: String,
    pub drawer_tax_id: Option<String>,
    pub amount: Money,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub received_from: Option<String>,
    pub notes: Option<String>,
}

impl NewCheck {
    /// Materializes the check with a fresh id, status `InPortfolio`.
    pub fn into_check(self) -> Check {
        let now = Utc::now();
        Check {
            id: new_id(),
            number: self.number,
            bank: self.bank,
            drawer: self.drawer,
            drawer_tax_id: self.drawer_tax_id,
            amount: self.amount,
            issue_date: self.issue_date,
            due_date: self.due_date,
            status: CheckStatus::InPortfolio,
            received_from: self.received_from,
            delivered_to: None,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Check fields as typed into a payment form. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckDetails {
    pub number: Option<String>,
    pub bank: Option<String>,
    pub drawer: Option<String>,
    pub drawer_tax_id: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

// =============================================================================
// Pricing & Payment Enums
// =============================================================================

/// Which price list a sale line is charged from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    Retail,
    Wholesale,
}

impl Default for PriceTier {
    fn default() -> Self {
        PriceTier::Retail
    }
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Transfer,
    DebitCard,
    /// The only method that may carry an installment plan.
    CreditCard,
    /// A third-party check handed in by a customer.
    Check,
    /// Charged to the customer's account; nothing paid at the counter.
    OnAccount,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::Check => "check",
            PaymentMethod::OnAccount => "on_account",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credit card installment plan offered at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardPlan {
    /// Label shown at checkout, e.g. "3 cuotas".
    pub name: String,
    pub installments: u32,
    /// Surcharge over the base amount (`0.15` = 15%).
    pub interest_rate: Rate,
}

// =============================================================================
// Sale
// =============================================================================

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItem {
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name: String,
    pub quantity: i64,
    /// Unit price at time of sale (frozen).
    pub unit_price: Money,
    /// Unit cost at time of sale (frozen, keeps historical margin stable).
    pub unit_cost: Money,
    pub price_tier: PriceTier,
}

impl SaleItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// A recorded sale. Never modified after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    /// `None` for a walk-in sale.
    pub customer_id: Option<String>,
    pub items: Vec<SaleItem>,
    pub subtotal: Money,
    pub tax: Money,
    pub freight: Money,
    pub surcharge: Money,
    pub total: Money,
    pub installments: u32,
    pub installment_amount: Option<Money>,
    pub payment_method: PaymentMethod,
    pub paid_amount: Money,
    /// Amount charged to the customer's account (negative = credited).
    pub due_amount: Money,
    /// Cash handed back at the counter.
    pub change: Money,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Purchase
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    PendingPayment,
    /// Set only by a supplier payment that references the purchase.
    Paid,
}

impl PurchaseStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::PendingPayment => "pending_payment",
            PurchaseStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost: Money,
}

/// Merchandise bought from a supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: String,
    pub supplier_id: String,
    /// Supplier invoice, `"N/A"` when none was given.
    pub invoice_number: String,
    pub items: Vec<PurchaseItem>,
    pub total: Money,
    pub status: PurchaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_terminal_statuses() {
        assert!(CheckStatus::Collected.is_terminal());
        assert!(CheckStatus::Delivered.is_terminal());
        assert!(!CheckStatus::InPortfolio.is_terminal());
        assert!(!CheckStatus::Deposited.is_terminal());
        assert!(!CheckStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_check_status_default() {
        assert_eq!(CheckStatus::default(), CheckStatus::InPortfolio);
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_string(&CheckStatus::InPortfolio).unwrap(), "\"in_portfolio\"");
        assert_eq!(serde_json::to_string(&PaymentMethod::OnAccount).unwrap(), "\"on_account\"");
        assert_eq!(serde_json::to_string(&PurchaseStatus::PendingPayment).unwrap(), "\"pending_payment\"");
        assert_eq!(PaymentMethod::DebitCard.to_string(), "debit_card");
    }

    #[test]
    fn test_new_check_starts_in_portfolio() {
        let check = NewCheck {
            number: "00012345".to_string(),
            bank: "Banco Nación".to_string(),
            drawer: "Ferretería Sur".to_string(),
            drawer_tax_id: None,
            amount: Money::new(dec!(1500)),
            issue_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            received_from: Some("customer-1".to_string()),
            notes: None,
        }
        .into_check();

        assert_eq!(check.status, CheckStatus::InPortfolio);
        assert!(check.delivered_to.is_none());
        assert_eq!(check.id.len(), 36);
    }

    #[test]
    fn test_sale_item_line_total() {
        let item = SaleItem {
            product_id: "p".to_string(),
            name: "Yerba 1kg".to_string(),
            quantity: 3,
            unit_price: Money::new(dec!(4.50)),
            unit_cost: Money::new(dec!(3)),
            price_tier: PriceTier::Retail,
        };
        assert_eq!(item.line_total(), Money::new(dec!(13.50)));
    }
}
