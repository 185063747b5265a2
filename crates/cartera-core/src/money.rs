//! # Money Module
//!
//! Provides the `Money` and `Rate` types for handling monetary values safely.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE ROUNDING PROBLEM                                                   │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  With integer cents, installments round too early:                      │
//! │    $139.15 / 3 = 4638 cents (×3 = $139.14)  → Lost $0.01!              │
//! │                                                                         │
//! │  OUR SOLUTION: exact decimals, rounded only when shown                  │
//! │    139.15 / 3 = 46.38333333…  (kept as-is internally)                   │
//! │    Display / rounded() → $46.38                                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cartera_core::money::{Money, Rate};
//!
//! let price = Money::from_cents(1099); // $10.99
//! let line = price * 3;                // $32.97
//! let tax = line.apply_rate(Rate::from_bps(2100));
//!
//! assert_eq!(line.to_string(), "$32.97");
//! assert_eq!(tax.to_string(), "$6.92"); // 6.9237 rounded for display
//! ```

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

// =============================================================================
// Money Type
// =============================================================================

/// A signed monetary amount in the store's single currency.
///
/// ## Design Decisions
/// - **Decimal (not cents)**: installment amounts and rate products are kept
///   exact until presentation
/// - **Signed**: balances go negative when a customer holds credit
/// - **No implicit rounding**: arithmetic never rounds, only [`Money::rounded`]
///   and `Display` do
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.retail_price ──► CartItem.unit_price ──► line total            │
/// │                                                                         │
/// │  Σ lines ──► subtotal ──► + tax + freight ──► base ──► + surcharge     │
/// │                                                   │                     │
/// │                                                   ▼                     │
/// │                       Sale.total ──► due amount ──► Customer.balance    │
/// │                                                                         │
/// │  Purchase.total ──► Supplier.balance ◄── cash + delivered checks       │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Wraps an exact decimal amount.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use cartera_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1099).to_string(), "$10.99");
    /// ```
    #[inline]
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, 2))
    }

    /// Creates a Money value from whole currency units.
    #[inline]
    pub fn from_major(units: i64) -> Self {
        Money(Decimal::from(units))
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Returns the exact underlying amount.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Returns the absolute value.
    #[inline]
    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Rounds to cents, half away from zero.
    ///
    /// Only for presentation boundaries (receipts, reports). Never feed a
    /// rounded value back into a running sum.
    ///
    /// ## Example
    /// ```rust
    /// use cartera_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let third = Money::from_cents(13915).divide(3);
    /// assert_eq!(third.rounded(), Money::from_cents(4638));
    ///
    /// let half = Money::new(Decimal::new(5, 3)); // 0.005
    /// assert_eq!(half.rounded(), Money::from_cents(1));
    /// ```
    pub fn rounded(&self) -> Self {
        Money(self.0.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Adds without panicking; `None` when the sum leaves the decimal range.
    #[inline]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Multiplies money by a quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Product: Yerba 1kg $4.50
    /// Quantity: 3
    ///      │
    ///      ▼
    /// multiply_quantity(3) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// Line Total: $13.50
    /// ```
    #[inline]
    pub fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * Decimal::from(qty))
    }

    /// Applies a rate (tax, card surcharge) and returns the resulting amount.
    ///
    /// The product is exact: `100 × 0.21 = 21`, `121 × 0.15 = 18.15`.
    #[inline]
    pub fn apply_rate(&self, rate: Rate) -> Self {
        Money(self.0 * rate.fraction())
    }

    /// Splits the amount into `parts` equal shares without rounding.
    ///
    /// Callers guarantee `parts > 0`; a zero count returns the amount as-is.
    pub fn divide(&self, parts: u32) -> Self {
        if parts == 0 {
            return *self;
        }
        Money(self.0 / Decimal::from(parts))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money rounded to cents, e.g. `$46.38` or `-$130.00`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut shown = self.rounded().0.abs();
        shown.rescale(2);
        let sign = if self.rounded().is_negative() { "-" } else { "" };
        write!(f, "{}${}", sign, shown)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Money)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Rate
// =============================================================================

/// A proportional rate expressed as a fraction: `0.21` means 21%.
///
/// Used for tax and for card-plan interest surcharges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(Decimal);

impl Rate {
    /// Wraps a fraction (`0.15` = 15%).
    #[inline]
    pub const fn new(fraction: Decimal) -> Self {
        Rate(fraction)
    }

    /// Creates a rate from basis points (2100 = 21%).
    #[inline]
    pub fn from_bps(bps: u32) -> Self {
        Rate(Decimal::new(i64::from(bps), 4))
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(Decimal::ZERO)
    }

    /// Returns the rate as a fraction.
    #[inline]
    pub const fn fraction(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", (self.0 * Decimal::ONE_HUNDRED).normalize())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
