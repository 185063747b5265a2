//! # Customer Payment
//!
//! Money received against a customer's account. A check payment also
//! brings the check into the portfolio.
//!
//! ```text
//! Validated ──(check? register)──► CheckRegistered ──balance − amount──► BalanceReduced ──► Complete
//! ```
//!
//! Paying more than the balance leaves the customer in credit (negative
//! balance). That is not an error.

use cartera_core::validation::{require_id, validate_check_details, validate_positive_amount};
use cartera_core::{Check, CheckDetails, CheckStatus, LedgerSet, Money, NewCheck, PaymentMethod, ValidationError};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Progress, SettlementEngine};
use crate::error::SettlementResult;
use crate::outcome::{CustomerPaymentReceipt, EventKind, Stage, Step, StepOutcome};
use crate::retry::StepRunner;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerPaymentRequest {
    pub customer_id: Option<String>,
    pub amount: Money,
    pub method: PaymentMethod,
    /// Required when `method` is [`PaymentMethod::Check`].
    pub check: Option<CheckDetails>,
}

impl SettlementEngine {
    /// Records a payment from a customer.
    pub async fn receive_customer_payment(
        &self,
        request: CustomerPaymentRequest,
    ) -> SettlementResult<CustomerPaymentReceipt> {
        let runner = self.runner();

        validate_positive_amount("amount", request.amount)?;
        if request.method == PaymentMethod::OnAccount {
            return Err(ValidationError::NotAllowed {
                field: "method".to_string(),
                allowed: [
                    PaymentMethod::Cash,
                    PaymentMethod::Transfer,
                    PaymentMethod::DebitCard,
                    PaymentMethod::CreditCard,
                    PaymentMethod::Check,
                ]
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
            }
            .into());
        }

        let customer_id = require_id("customer", request.customer_id.as_deref())?;
        if self.config.is_final_consumer(customer_id) {
            return Err(ValidationError::invalid("customer", "the final consumer has no account").into());
        }

        let new_check = match (request.method, request.check.as_ref()) {
            (PaymentMethod::Check, Some(details)) => Some(validate_check_details(
                details,
                request.amount,
                Some(customer_id.to_string()),
            )?),
            (PaymentMethod::Check, None) => return Err(ValidationError::required("check").into()),
            _ => None,
        };

        let customer = self.load_customer(&runner, customer_id).await?;

        info!(
            customer_id = %customer.id,
            amount = %request.amount,
            method = %request.method,
            "Customer payment validated, applying"
        );

        self.spawn_writes(apply_customer_payment(
            self.ledgers.clone(),
            runner,
            customer.id,
            request.amount,
            request.method,
            new_check,
        ))
        .await
    }
}

async fn apply_customer_payment(
    ledgers: LedgerSet,
    runner: StepRunner,
    customer_id: String,
    amount: Money,
    method: PaymentMethod,
    new_check: Option<NewCheck>,
) -> SettlementResult<CustomerPaymentReceipt> {
    let mut progress = Progress::new(EventKind::CustomerPayment, &customer_id, Stage::Validated);

    let mut check: Option<Check> = None;
    if let Some(new_check) = new_check {
        let step = Step::RegisterCheck {
            number: new_check.number.clone(),
            amount,
        };
        let checks = &ledgers.checks;
        let result = runner.run(&step, || checks.create(new_check.clone())).await;
        match progress.track(step, result, |c: &Check| StepOutcome::Check {
            check_id: c.id.clone(),
            status: CheckStatus::InPortfolio,
        }) {
            Some(created) => check = Some(created),
            None => return Err(progress.into_error()),
        }
        progress.reach(Stage::CheckRegistered);
    }

    let delta = -amount;
    let step = Step::AdjustCustomerBalance {
        customer_id: customer_id.clone(),
        delta,
    };
    let result = runner
        .run(&step, || ledgers.customers.adjust_balance(&customer_id, delta))
        .await;
    let balance = progress.track(step, result, |b| StepOutcome::Balance { balance: *b });
    progress.reach(Stage::BalanceReduced);

    progress.finish()?;
    Ok(CustomerPaymentReceipt {
        customer_id,
        amount,
        method,
        check,
        balance: balance.unwrap_or_default(),
    })
}
