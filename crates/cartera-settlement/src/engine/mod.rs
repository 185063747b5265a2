//! # Settlement Engine
//!
//! One entry point per business event. Each event is a short saga of
//! independently committing ledger writes.
//!
//! ## Event Anatomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Life of a settlement event                         │
//! │                                                                         │
//! │  caller task                          spawned task                      │
//! │  ───────────                          ────────────                      │
//! │  validate request                                                       │
//! │  read entities (customer, checks...)                                    │
//! │  price / plan writes                                                    │
//! │       │                                                                 │
//! │       │  dropping the future up to here cancels for free               │
//! │       ▼                                                                 │
//! │  tokio::spawn ──────────────────────► first write (Recorded point)     │
//! │       │                               remaining writes, roll forward   │
//! │       │                               log outcome                      │
//! │       ▼                                    │                            │
//! │  await JoinHandle ◄────────────────── receipt | PartialCompletion      │
//! │                                                                         │
//! │  Once spawned the writes finish even if the caller goes away.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Outcome Rules
//! - Every step succeeded → receipt
//! - Nothing was written → the first failure as a plain error
//! - Anything in between (or a write whose fate a timeout hid) →
//!   [`SettlementError::Partial`]
//!
//! Completed writes are never compensated.

use std::future::Future;
use std::sync::Arc;

use cartera_core::error::EntityKind;
use cartera_core::{Customer, LedgerSet, Product, Supplier};
use futures_util::future::join_all;
use tracing::{debug, error, info, warn};

use crate::config::SettlementConfig;
use crate::error::{SettlementError, SettlementResult};
use crate::outcome::{CompletedStep, EventKind, FailedStep, PartialCompletion, Stage, Step, StepError, StepOutcome, Warning};
use crate::retry::{RetryPolicy, StepRunner};

pub mod customer_payment;
pub mod manual;
pub mod purchase;
pub mod sale;
pub mod supplier_payment;

pub use customer_payment::CustomerPaymentRequest;
pub use purchase::PurchaseRequest;
pub use sale::Checkout;
pub use supplier_payment::SupplierPaymentRequest;

// =============================================================================
// Engine
// =============================================================================

/// Settlement workflow engine.
///
/// Cheap to clone; every clone shares the same ledgers and configuration.
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    ledgers: LedgerSet,
    config: Arc<SettlementConfig>,
}

impl SettlementEngine {
    pub fn new(ledgers: LedgerSet, config: SettlementConfig) -> Self {
        SettlementEngine {
            ledgers,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    pub fn ledgers(&self) -> &LedgerSet {
        &self.ledgers
    }

    /// Starts the clock for a new event.
    fn runner(&self) -> StepRunner {
        StepRunner::new(RetryPolicy::from_config(&self.config), self.config.event_timeout())
    }

    /// Runs the write phase of an event on its own task.
    async fn spawn_writes<T, Fut>(&self, writes: Fut) -> SettlementResult<T>
    where
        Fut: Future<Output = SettlementResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(writes).await?
    }

    // =========================================================================
    // Pre-write reads
    // =========================================================================

    async fn load_customer(&self, runner: &StepRunner, id: &str) -> SettlementResult<Customer> {
        let customers = &self.ledgers.customers;
        let customer = runner
            .run(&lookup(EntityKind::Customer, id), || customers.get(id))
            .await?;
        Ok(customer)
    }

    async fn load_supplier(&self, runner: &StepRunner, id: &str) -> SettlementResult<Supplier> {
        let suppliers = &self.ledgers.suppliers;
        let supplier = runner
            .run(&lookup(EntityKind::Supplier, id), || suppliers.get(id))
            .await?;
        Ok(supplier)
    }

    /// Reads every product concurrently; the first missing one fails the event.
    async fn load_products(&self, runner: &StepRunner, ids: &[String]) -> SettlementResult<Vec<Product>> {
        let products = &self.ledgers.products;
        let reads = ids.iter().map(|id| async move {
            runner
                .run(&lookup(EntityKind::Product, id), || products.get(id))
                .await
        });

        join_all(reads)
            .await
            .into_iter()
            .map(|result| result.map_err(SettlementError::from))
            .collect()
    }
}

/// Label used in the runner's logs for pre-write reads.
fn lookup(entity: EntityKind, id: &str) -> String {
    format!("load {entity} {id}")
}

// =============================================================================
// Progress Tracking
// =============================================================================

/// Bookkeeping for one event's write phase.
#[derive(Debug)]
pub(crate) struct Progress {
    event: EventKind,
    reference: String,
    stage: Stage,
    completed: Vec<CompletedStep>,
    failed: Vec<FailedStep>,
    warnings: Vec<Warning>,
}

impl Progress {
    pub(crate) fn new(event: EventKind, reference: impl Into<String>, stage: Stage) -> Self {
        Progress {
            event,
            reference: reference.into(),
            stage,
            completed: Vec::new(),
            failed: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Advances the stage. Stages stop advancing at the first failure.
    pub(crate) fn reach(&mut self, stage: Stage) {
        if self.failed.is_empty() {
            debug!(event = %self.event, reference = %self.reference, stage = %stage, "Stage reached");
            self.stage = stage;
        }
    }

    /// Files a step result. Returns the value when the step succeeded.
    pub(crate) fn track<T>(
        &mut self,
        step: Step,
        result: Result<T, StepError>,
        outcome: impl FnOnce(&T) -> StepOutcome,
    ) -> Option<T> {
        match result {
            Ok(value) => {
                self.completed.push(CompletedStep {
                    outcome: outcome(&value),
                    step,
                });
                Some(value)
            }
            Err(error) => {
                self.failed.push(FailedStep { step, error });
                None
            }
        }
    }

    pub(crate) fn warn(&mut self, warning: Warning) {
        warn!(event = %self.event, reference = %self.reference, %warning, "Settlement warning");
        self.warnings.push(warning);
    }

    /// Closes the event. Returns the warnings when every step succeeded.
    pub(crate) fn finish(mut self) -> SettlementResult<Vec<Warning>> {
        if !self.failed.is_empty() {
            return Err(self.into_error());
        }

        self.stage = Stage::Complete;
        info!(
            event = %self.event,
            reference = %self.reference,
            steps = self.completed.len(),
            warnings = self.warnings.len(),
            "Settlement complete"
        );
        Ok(self.warnings)
    }

    /// Ends the event after a failure: a plain error when nothing was
    /// written, a partial report otherwise.
    pub(crate) fn into_error(mut self) -> SettlementError {
        let fate_unknown = self.failed.iter().any(|f| f.error.is_fate_unknown());
        if self.completed.is_empty() && !fate_unknown && !self.failed.is_empty() {
            let first = self.failed.swap_remove(0);
            error!(
                event = %self.event,
                reference = %self.reference,
                step = %first.step,
                error = %first.error,
                "Settlement failed, nothing applied"
            );
            return first.error.into();
        }

        let report = PartialCompletion {
            event: self.event,
            reference: self.reference,
            stage: self.stage,
            completed: self.completed,
            failed: self.failed,
            warnings: self.warnings,
        };
        warn!(
            event = %report.event,
            reference = %report.reference,
            stage = %report.stage,
            completed = report.completed.len(),
            failed = report.failed.len(),
            "Settlement partially applied"
        );
        report.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartera_core::LedgerError;

    fn stock_step(id: &str) -> Step {
        Step::AdjustStock {
            product_id: id.into(),
            delta: -1,
        }
    }

    #[test]
    fn test_all_completed_is_receipt() {
        let mut progress = Progress::new(EventKind::SaleFinalization, "s-1", Stage::Priced);
        progress.track(stock_step("p-1"), Ok(4_i64), |s| StepOutcome::Stock { stock: *s });
        progress.reach(Stage::StockApplied);

        let warnings = progress.finish().unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_nothing_completed_is_plain_error() {
        let mut progress = Progress::new(EventKind::SaleFinalization, "s-1", Stage::Priced);
        let value: Option<i64> = progress.track(
            stock_step("p-1"),
            Err(StepError::Ledger(LedgerError::storage("locked"))),
            |s| StepOutcome::Stock { stock: *s },
        );
        assert!(value.is_none());

        let err = progress.finish().unwrap_err();
        assert_eq!(err, SettlementError::Storage("locked".into()));
    }

    #[test]
    fn test_timeout_without_completions_is_partial() {
        let mut progress = Progress::new(EventKind::SaleFinalization, "s-1", Stage::Priced);
        progress.track::<()>(
            Step::RecordSale { sale_id: "s-1".into() },
            Err(StepError::Timeout),
            |_| StepOutcome::Recorded,
        );

        let err = progress.finish().unwrap_err();
        let report = err.partial().unwrap();
        assert!(report.completed.is_empty());
        assert_eq!(report.stage, Stage::Priced);
    }

    #[test]
    fn test_stage_stops_at_first_failure() {
        let mut progress = Progress::new(EventKind::SaleFinalization, "s-1", Stage::Priced);
        progress.track(Step::RecordSale { sale_id: "s-1".into() }, Ok(()), |_| StepOutcome::Recorded);
        progress.reach(Stage::Recorded);
        progress.track::<i64>(
            stock_step("p-2"),
            Err(StepError::Ledger(LedgerError::storage("locked"))),
            |s| StepOutcome::Stock { stock: *s },
        );
        progress.reach(Stage::StockApplied);

        let err = progress.finish().unwrap_err();
        let report = err.partial().unwrap();
        assert_eq!(report.stage, Stage::Recorded);
        assert_eq!(report.completed.len(), 1);
        assert_eq!(report.failed.len(), 1);
    }
}
