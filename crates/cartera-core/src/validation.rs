//! # Validation Module
//!
//! Input validation for everything that reaches the settlement engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Forms (external)                                             │
//! │  └── Immediate operator feedback                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Settlement engine, pre-write phase                           │
//! │  ├── THIS MODULE: field and business rule validation                   │
//! │  └── Existence reads through the ledgers                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Nothing below layer 2 runs if a validator fails.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cartera_core::money::Money;
//! use cartera_core::validation::{validate_quantity, validate_positive_amount};
//!
//! assert!(validate_quantity(5).is_ok());
//! assert!(validate_positive_amount("amount", Money::zero()).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::{Money, Rate};
use crate::types::{CheckDetails, NewCheck};
use crate::{MAX_AMOUNT, MAX_ITEM_QUANTITY, MAX_RATE_BPS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return Err(ValidationError::invalid(
            "sku",
            "must contain only letters, numbers, hyphens, and underscores",
        ));
    }

    Ok(())
}

/// Validates a display name (product, customer, supplier).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Requires an entity reference to be selected.
///
/// Returns the trimmed id.
pub fn require_id<'a>(field: &str, id: Option<&'a str>) -> ValidationResult<&'a str> {
    match id.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(ValidationError::required(field)),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Amount must be strictly positive (payments, check amounts).
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_AMOUNT
pub fn validate_positive_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    validate_amount_ceiling(field, amount)
}

/// Amount may be zero but not negative (freight, cash, unit cost).
pub fn validate_non_negative_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    validate_amount_ceiling(field, amount)
}

fn validate_amount_ceiling(field: &str, amount: Money) -> ValidationResult<()> {
    if amount > Money::from_major(MAX_AMOUNT) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT,
        });
    }
    Ok(())
}

/// Rates are fractions between 0 and MAX_RATE_BPS (100%).
pub fn validate_rate(field: &str, rate: Rate) -> ValidationResult<()> {
    if rate.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    if rate > Rate::from_bps(MAX_RATE_BPS) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 100,
        });
    }
    Ok(())
}

pub fn validate_installments(installments: u32) -> ValidationResult<()> {
    if installments == 0 {
        return Err(ValidationError::MustBePositive {
            field: "installments".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Check Validators
// =============================================================================

/// Validates check fields typed into a payment form.
///
/// ## Rules
/// - number, bank, drawer, issue date and due date are all required
/// - due date may not precede issue date
/// - amount must be positive
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Customer pays $500 with a check                                        │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_check_details(details, $500, customer) ← THIS FUNCTION       │
/// │       │                                                                 │
/// │       ├── bank missing? → Error: "bank is required"                     │
/// │       │                                                                 │
/// │       ├── due < issue?  → Error: "due_date is invalid: ..."             │
/// │       │                                                                 │
/// │       └── OK → NewCheck enters the portfolio                            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_check_details(
    details: &CheckDetails,
    amount: Money,
    received_from: Option<String>,
) -> ValidationResult<NewCheck> {
    let number = required_text("check_number", details.number.as_deref())?;
    let bank = required_text("bank", details.bank.as_deref())?;
    let drawer = required_text("drawer", details.drawer.as_deref())?;
    let issue_date = details.issue_date.ok_or_else(|| ValidationError::required("issue_date"))?;
    let due_date = details.due_date.ok_or_else(|| ValidationError::required("due_date"))?;

    if due_date < issue_date {
        return Err(ValidationError::invalid("due_date", "must not be before the issue date"));
    }
    validate_positive_amount("check amount", amount)?;

    Ok(NewCheck {
        number,
        bank,
        drawer,
        drawer_tax_id: non_blank(details.drawer_tax_id.as_deref()),
        amount,
        issue_date,
        due_date,
        received_from,
        notes: non_blank(details.notes.as_deref()),
    })
}

/// Validates a fully specified check before it enters the portfolio.
pub fn validate_new_check(check: &NewCheck) -> ValidationResult<()> {
    required_text("check_number", Some(&check.number))?;
    required_text("bank", Some(&check.bank))?;
    required_text("drawer", Some(&check.drawer))?;
    if check.due_date < check.issue_date {
        return Err(ValidationError::invalid("due_date", "must not be before the issue date"));
    }
    validate_positive_amount("check amount", check.amount)
}

fn required_text(field: &str, value: Option<&str>) -> ValidationResult<String> {
    non_blank(value).ok_or_else(|| ValidationError::required(field))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn full_details() -> CheckDetails {
        CheckDetails {
            number: Some("00123456".to_string()),
            bank: Some("Banco Galicia".to_string()),
            drawer: Some("Juan Pérez".to_string()),
            drawer_tax_id: Some("  ".to_string()),
            issue_date: Some(date(2026, 5, 1)),
            due_date: Some(date(2026, 6, 1)),
            notes: None,
        }
    }

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("YER-1KG").is_ok());
        assert!(validate_sku("product_1").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Distribuidora Norte").is_ok());
        assert_eq!(validate_name("name", " "), Err(ValidationError::required("name")));
        assert!(validate_name("name", &"A".repeat(300)).is_err());
    }

    #[test]
    fn test_require_id() {
        assert_eq!(require_id("supplier", Some(" s-1 ")), Ok("s-1"));
        assert_eq!(require_id("supplier", Some("")), Err(ValidationError::required("supplier")));
        assert_eq!(require_id("supplier", None), Err(ValidationError::required("supplier")));
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_amounts() {
        assert!(validate_positive_amount("amount", Money::from_cents(1)).is_ok());
        assert!(validate_positive_amount("amount", Money::zero()).is_err());
        assert!(validate_non_negative_amount("cash", Money::zero()).is_ok());
        assert!(validate_non_negative_amount("cash", Money::from_cents(-1)).is_err());
        assert!(validate_rate("tax_rate", Rate::new(dec!(-0.1))).is_err());
        assert!(validate_installments(0).is_err());
    }

    #[test]
    fn test_amounts_have_a_ceiling() {
        let ceiling = Money::from_major(MAX_AMOUNT);
        assert!(validate_positive_amount("amount", ceiling).is_ok());
        assert_eq!(
            validate_positive_amount("amount", Money::new(rust_decimal::Decimal::MAX)),
            Err(ValidationError::OutOfRange {
                field: "amount".to_string(),
                min: 0,
                max: MAX_AMOUNT,
            })
        );
        assert!(validate_non_negative_amount("freight", ceiling + Money::from_cents(1)).is_err());

        assert!(validate_rate("tax_rate", Rate::from_bps(MAX_RATE_BPS)).is_ok());
        assert!(matches!(
            validate_rate("tax_rate", Rate::new(dec!(1.01))),
            Err(ValidationError::OutOfRange { max: 100, .. })
        ));
    }

    #[test]
    fn test_check_details_complete() {
        let check = validate_check_details(&full_details(), Money::from_major(500), Some("c-1".to_string())).unwrap();
        assert_eq!(check.bank, "Banco Galicia");
        assert_eq!(check.amount, Money::from_major(500));
        assert_eq!(check.drawer_tax_id, None);
        assert_eq!(check.received_from.as_deref(), Some("c-1"));
    }

    #[test]
    fn test_check_details_missing_fields() {
        let mut details = full_details();
        details.bank = None;
        assert_eq!(
            validate_check_details(&details, Money::from_major(1), None),
            Err(ValidationError::required("bank"))
        );

        let mut details = full_details();
        details.due_date = None;
        assert_eq!(
            validate_check_details(&details, Money::from_major(1), None),
            Err(ValidationError::required("due_date"))
        );
    }

    #[test]
    fn test_check_due_before_issue() {
        let mut details = full_details();
        details.due_date = Some(date(2026, 4, 30));
        assert!(matches!(
            validate_check_details(&details, Money::from_major(1), None),
            Err(ValidationError::Invalid { .. })
        ));
    }
}
