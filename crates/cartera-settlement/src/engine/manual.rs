//! Single-step operator corrections: stock recounts and check custody.
//!
//! These run through the same step runner as the multi-step events.
//! With one step there is no partial outcome: the write either landed or
//! it did not (a timeout still reports as partial, since it is unknown).

use cartera_core::validation::{require_id, validate_check_details};
use cartera_core::{Check, CheckDetails, CheckStatus, Money, ValidationError};

use super::{Progress, SettlementEngine};
use crate::error::{SettlementError, SettlementResult};
use crate::outcome::{EventKind, Stage, Step, StepOutcome, StockLevel};

impl SettlementEngine {
    /// Overwrites a product's stock after a physical count.
    pub async fn recount_stock(&self, product_id: &str, counted: i64) -> SettlementResult<StockLevel> {
        let runner = self.runner();
        let product_id = require_id("product", Some(product_id))?.to_string();
        if counted < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "stock".to_string(),
            }
            .into());
        }

        let ledgers = self.ledgers.clone();
        self.spawn_writes(async move {
            let mut progress = Progress::new(EventKind::StockRecount, &product_id, Stage::Validated);
            let step = Step::SetStock {
                product_id: product_id.clone(),
                value: counted,
            };
            let result = runner
                .run(&step, || ledgers.products.set_stock(&product_id, counted))
                .await;
            let stock = progress.track(step, result, |s| StepOutcome::Stock { stock: *s });

            progress.finish()?;
            Ok::<_, SettlementError>(StockLevel {
                product_id,
                stock: stock.unwrap_or(counted),
            })
        })
        .await
    }

    /// Brings a check into the portfolio outside of a customer payment.
    pub async fn register_check(
        &self,
        details: &CheckDetails,
        amount: Money,
        received_from: Option<String>,
    ) -> SettlementResult<Check> {
        let runner = self.runner();
        let received_from = received_from.filter(|id| !id.trim().is_empty());
        let new_check = validate_check_details(details, amount, received_from)?;
        if let Some(customer_id) = new_check.received_from.as_deref() {
            self.load_customer(&runner, customer_id).await?;
        }

        let ledgers = self.ledgers.clone();
        self.spawn_writes(async move {
            let mut progress = Progress::new(EventKind::CheckRegistration, &new_check.number, Stage::Validated);
            let step = Step::RegisterCheck {
                number: new_check.number.clone(),
                amount: new_check.amount,
            };
            let result = runner.run(&step, || ledgers.checks.create(new_check.clone())).await;
            let check = progress.track(step, result, |c: &Check| StepOutcome::Check {
                check_id: c.id.clone(),
                status: c.status,
            });

            progress.finish()?;
            check.ok_or_else(|| SettlementError::Internal("check registered without a record".into()))
        })
        .await
    }

    /// Moves a check to an operator-chosen status.
    pub async fn move_check(&self, check_id: &str, status: CheckStatus) -> SettlementResult<Check> {
        let runner = self.runner();
        let check_id = require_id("check", Some(check_id))?.to_string();

        let ledgers = self.ledgers.clone();
        self.spawn_writes(async move {
            let mut progress = Progress::new(EventKind::CheckMove, &check_id, Stage::Validated);
            let step = Step::MoveCheck {
                check_id: check_id.clone(),
                status,
            };
            let result = runner
                .run(&step, || ledgers.checks.transition(&check_id, status))
                .await;
            let check = progress.track(step, result, |c: &Check| StepOutcome::Check {
                check_id: c.id.clone(),
                status: c.status,
            });

            progress.finish()?;
            check.ok_or_else(|| SettlementError::Internal("check moved without a record".into()))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{check_details, fixture, seed_check, seed_customer, seed_product};

    #[tokio::test]
    async fn test_recount_overwrites_stock() {
        let fx = fixture().await;
        let product = seed_product(&fx.db, "YER-1KG", Money::from_major(100), -3).await;

        let level = fx.engine.recount_stock(&product.id, 12).await.unwrap();
        assert_eq!(level.stock, 12);
        assert_eq!(fx.db.ledgers().products.get(&product.id).await.unwrap().stock, 12);

        let err = fx.engine.recount_stock(&product.id, -1).await.unwrap_err();
        assert!(matches!(err, SettlementError::Validation(ValidationError::MustNotBeNegative { .. })));

        let err = fx.engine.recount_stock("missing", 1).await.unwrap_err();
        assert!(matches!(err, SettlementError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_register_check_for_customer() {
        let fx = fixture().await;
        let customer = seed_customer(&fx.db, "Ana Gómez", Money::zero()).await;

        let check = fx
            .engine
            .register_check(&check_details("0042"), Money::from_major(80), Some(customer.id.clone()))
            .await
            .unwrap();
        assert_eq!(check.status, CheckStatus::InPortfolio);
        assert_eq!(check.received_from.as_deref(), Some(customer.id.as_str()));

        let err = fx
            .engine
            .register_check(&check_details("0043"), Money::from_major(80), Some("nobody".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::NotFound { .. }));

        let err = fx
            .engine
            .register_check(&CheckDetails::default(), Money::from_major(80), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::Validation(ValidationError::Required { .. })));
    }

    #[tokio::test]
    async fn test_move_check_lifecycle() {
        let fx = fixture().await;
        let check = seed_check(&fx.db, "0001", Money::from_major(300)).await;

        let moved = fx.engine.move_check(&check.id, CheckStatus::Deposited).await.unwrap();
        assert_eq!(moved.status, CheckStatus::Deposited);

        let moved = fx.engine.move_check(&check.id, CheckStatus::Collected).await.unwrap();
        assert_eq!(moved.status, CheckStatus::Collected);

        let err = fx.engine.move_check(&check.id, CheckStatus::Rejected).await.unwrap_err();
        assert_eq!(
            err,
            SettlementError::InvalidTransition {
                check_id: check.id.clone(),
                from: CheckStatus::Collected,
                to: CheckStatus::Rejected,
            }
        );
    }
}
