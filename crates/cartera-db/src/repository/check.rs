//! # Check Repository
//!
//! Custody of the third-party check portfolio.
//!
//! ## Status Machine
//! ```text
//!  create ──► InPortfolio ◄──► Deposited ◄──► Rejected
//!                 │                │
//!              deliver          collect
//!                 ▼                ▼
//!             Delivered        Collected        (terminal)
//! ```
//!
//! Non-terminal statuses may move to any other status by operator choice.
//! [`CheckLedger::deliver`] is the supplier-payment path and only leaves
//! from `InPortfolio`.
//!
//! Every status write is conditional on the status that was read:
//! `UPDATE checks SET status = ? WHERE id = ? AND status = <seen>`.
//! Zero rows affected means another writer moved the check first.

use async_trait::async_trait;
use cartera_core::error::{EntityKind, LedgerError, LedgerResult};
use cartera_core::ledger::CheckLedger;
use cartera_core::{Check, CheckStatus, NewCheck};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::{money_from_db, money_to_db};
use crate::error::{DbError, DbResult};

/// Re-reads before an operator transition gives up on a contended check.
const MAX_TRANSITION_ATTEMPTS: u32 = 8;

#[derive(Debug, sqlx::FromRow)]
struct CheckRow {
    id: String,
    number: String,
    bank: String,
    drawer: String,
    drawer_tax_id: Option<String>,
    amount: String,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    status: CheckStatus,
    received_from: Option<String>,
    delivered_to: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CheckRow> for Check {
    type Error = DbError;

    fn try_from(row: CheckRow) -> DbResult<Self> {
        Ok(Check {
            amount: money_from_db("amount", &row.amount)?,
            id: row.id,
            number: row.number,
            bank: row.bank,
            drawer: row.drawer,
            drawer_tax_id: row.drawer_tax_id,
            issue_date: row.issue_date,
            due_date: row.due_date,
            status: row.status,
            received_from: row.received_from,
            delivered_to: row.delivered_to,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_CHECK: &str = r#"
    SELECT id, number, bank, drawer, drawer_tax_id, amount, issue_date, due_date,
           status, received_from, delivered_to, notes, created_at, updated_at
    FROM checks
"#;

/// Repository for the check portfolio.
#[derive(Debug, Clone)]
pub struct CheckRepository {
    pool: SqlitePool,
}

impl CheckRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CheckRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Check>> {
        let row: Option<CheckRow> = sqlx::query_as(&format!("{SELECT_CHECK} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Check::try_from).transpose()
    }

    /// Lists checks in a given status, earliest due date first.
    pub async fn list_by_status(&self, status: CheckStatus) -> DbResult<Vec<Check>> {
        let rows: Vec<CheckRow> =
            sqlx::query_as(&format!("{SELECT_CHECK} WHERE status = ?1 ORDER BY due_date, number"))
                .bind(status)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Check::try_from).collect()
    }

    /// Inserts a check exactly as given (any status).
    pub async fn insert(&self, check: &Check) -> DbResult<()> {
        debug!(id = %check.id, number = %check.number, amount = %check.amount, "Inserting check");

        sqlx::query(
            r#"
            INSERT INTO checks (
                id, number, bank, drawer, drawer_tax_id, amount, issue_date, due_date,
                status, received_from, delivered_to, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&check.id)
        .bind(&check.number)
        .bind(&check.bank)
        .bind(&check.drawer)
        .bind(&check.drawer_tax_id)
        .bind(money_to_db(check.amount))
        .bind(check.issue_date)
        .bind(check.due_date)
        .bind(check.status)
        .bind(&check.received_from)
        .bind(&check.delivered_to)
        .bind(&check.notes)
        .bind(check.created_at)
        .bind(check.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Writes `target` only if the stored status is still `expected`.
    ///
    /// Returns whether the row was updated.
    async fn compare_and_set(&self, id: &str, expected: CheckStatus, target: CheckStatus) -> DbResult<bool> {
        let result = sqlx::query("UPDATE checks SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4")
            .bind(target)
            .bind(Utc::now())
            .bind(id)
            .bind(expected)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn require(&self, id: &str) -> LedgerResult<Check> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| LedgerError::not_found(EntityKind::Check, id))
    }
}

#[async_trait]
impl CheckLedger for CheckRepository {
    async fn create(&self, new_check: NewCheck) -> LedgerResult<Check> {
        let check = new_check.into_check();
        self.insert(&check).await?;

        info!(id = %check.id, number = %check.number, amount = %check.amount, "Check entered portfolio");
        Ok(check)
    }

    async fn get(&self, id: &str) -> LedgerResult<Check> {
        self.require(id).await
    }

    async fn transition(&self, id: &str, target: CheckStatus) -> LedgerResult<Check> {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let mut check = self.require(id).await?;

            if check.status == target {
                return Ok(check);
            }
            if check.status.is_terminal() {
                return Err(LedgerError::InvalidTransition {
                    check_id: id.to_string(),
                    from: check.status,
                    to: target,
                });
            }

            if self.compare_and_set(id, check.status, target).await? {
                debug!(id = %id, from = %check.status, to = %target, "Check status changed");
                check.status = target;
                check.updated_at = Utc::now();
                return Ok(check);
            }

            warn!(id = %id, attempt, "Check status changed concurrently, re-reading");
        }

        Err(DbError::Conflict {
            entity: EntityKind::Check,
            id: id.to_string(),
            attempts: MAX_TRANSITION_ATTEMPTS,
        }
        .into())
    }

    async fn deliver(&self, id: &str, supplier_id: &str) -> LedgerResult<Check> {
        let result = sqlx::query(
            r#"
            UPDATE checks
            SET status = ?1, delivered_to = ?2, updated_at = ?3
            WHERE id = ?4 AND status = ?5
            "#,
        )
        .bind(CheckStatus::Delivered)
        .bind(supplier_id)
        .bind(Utc::now())
        .bind(id)
        .bind(CheckStatus::InPortfolio)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        let check = self.require(id).await?;

        if result.rows_affected() == 0 {
            warn!(id = %id, status = %check.status, "Check not available for delivery");
            return Err(LedgerError::CheckUnavailable {
                check_id: id.to_string(),
                status: check.status,
            });
        }

        info!(id = %id, supplier_id = %supplier_id, amount = %check.amount, "Check delivered");
        Ok(check)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use cartera_core::{Customer, Money, Supplier};

    struct Fixture {
        db: Database,
        customer: Customer,
        supplier: Supplier,
    }

    async fn setup() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = Customer::new("Ferretería Sur");
        let supplier = Supplier::new("Distribuidora Norte");
        db.customers().insert(&customer).await.unwrap();
        db.suppliers().insert(&supplier).await.unwrap();
        Fixture { db, customer, supplier }
    }

    fn new_check(received_from: &str) -> NewCheck {
        NewCheck {
            number: "00012345".to_string(),
            bank: "Banco Nación".to_string(),
            drawer: "Ferretería Sur SRL".to_string(),
            drawer_tax_id: None,
            amount: Money::from_major(500),
            issue_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            received_from: Some(received_from.to_string()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_enters_portfolio() {
        let f = setup().await;
        let repo = f.db.checks();

        let check = repo.create(new_check(&f.customer.id)).await.unwrap();
        let loaded = repo.get(&check.id).await.unwrap();

        assert_eq!(loaded.status, CheckStatus::InPortfolio);
        assert_eq!(loaded.amount, Money::from_major(500));
        assert_eq!(loaded.received_from.as_deref(), Some(f.customer.id.as_str()));

        let in_portfolio = repo.list_by_status(CheckStatus::InPortfolio).await.unwrap();
        assert_eq!(in_portfolio.len(), 1);
    }

    #[tokio::test]
    async fn test_deliver_once() {
        let f = setup().await;
        let repo = f.db.checks();
        let check = repo.create(new_check(&f.customer.id)).await.unwrap();

        let delivered = repo.deliver(&check.id, &f.supplier.id).await.unwrap();
        assert_eq!(delivered.status, CheckStatus::Delivered);
        assert_eq!(delivered.delivered_to.as_deref(), Some(f.supplier.id.as_str()));

        let err = repo.deliver(&check.id, &f.supplier.id).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::CheckUnavailable {
                check_id: check.id.clone(),
                status: CheckStatus::Delivered,
            }
        );
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_have_one_winner() {
        let f = setup().await;
        let repo = f.db.checks();
        let check = repo.create(new_check(&f.customer.id)).await.unwrap();

        let (a, b) = tokio::join!(
            repo.deliver(&check.id, &f.supplier.id),
            repo.deliver(&check.id, &f.supplier.id)
        );

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    }

    #[tokio::test]
    async fn test_deliver_unknown_check() {
        let f = setup().await;
        let err = f.db.checks().deliver("missing", &f.supplier.id).await.unwrap_err();
        assert_eq!(err, LedgerError::not_found(EntityKind::Check, "missing"));
    }

    #[tokio::test]
    async fn test_transitions() {
        let f = setup().await;
        let repo = f.db.checks();
        let check = repo.create(new_check(&f.customer.id)).await.unwrap();

        let rejected = repo.transition(&check.id, CheckStatus::Rejected).await.unwrap();
        assert_eq!(rejected.status, CheckStatus::Rejected);

        // Same status is a no-op
        let again = repo.transition(&check.id, CheckStatus::Rejected).await.unwrap();
        assert_eq!(again.status, CheckStatus::Rejected);

        repo.transition(&check.id, CheckStatus::InPortfolio).await.unwrap();
        repo.transition(&check.id, CheckStatus::Deposited).await.unwrap();
        repo.transition(&check.id, CheckStatus::Collected).await.unwrap();

        let err = repo.transition(&check.id, CheckStatus::InPortfolio).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::InvalidTransition {
                check_id: check.id.clone(),
                from: CheckStatus::Collected,
                to: CheckStatus::InPortfolio,
            }
        );

        // Rejected checks cannot be handed to a supplier
        let other = repo.create(new_check(&f.customer.id)).await.unwrap();
        repo.transition(&other.id, CheckStatus::Rejected).await.unwrap();
        let err = repo.deliver(&other.id, &f.supplier.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::CheckUnavailable { status: CheckStatus::Rejected, .. }));
    }
}
