//! # Customer Repository
//!
//! Customer accounts. Balance changes go through the shared
//! compare-and-swap in `account.rs`.

use async_trait::async_trait;
use cartera_core::error::{EntityKind, LedgerResult};
use cartera_core::ledger::CustomerLedger;
use cartera_core::{Customer, Money};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::account::{self, CUSTOMERS};
use super::{money_from_db, money_to_db};
use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: String,
    name: String,
    tax_id: Option<String>,
    balance: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = DbError;

    fn try_from(row: CustomerRow) -> DbResult<Self> {
        Ok(Customer {
            balance: money_from_db("balance", &row.balance)?,
            id: row.id,
            name: row.name,
            tax_id: row.tax_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let row: Option<CustomerRow> = sqlx::query_as(
            "SELECT id, name, tax_id, balance, created_at, updated_at FROM customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }

    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, name = %customer.name, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, tax_id, balance, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.tax_id)
        .bind(money_to_db(customer.balance))
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CustomerLedger for CustomerRepository {
    async fn get(&self, id: &str) -> LedgerResult<Customer> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(EntityKind::Customer, id).into())
    }

    async fn adjust_balance(&self, id: &str, delta: Money) -> LedgerResult<Money> {
        Ok(account::adjust_balance(&self.pool, CUSTOMERS, id, delta).await?)
    }
}
