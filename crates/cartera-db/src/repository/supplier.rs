//! # Supplier Repository

use async_trait::async_trait;
use cartera_core::error::{EntityKind, LedgerResult};
use cartera_core::ledger::SupplierLedger;
use cartera_core::{Money, Supplier};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::account::{self, SUPPLIERS};
use super::{money_from_db, money_to_db};
use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct SupplierRow {
    id: String,
    name: String,
    tax_id: Option<String>,
    balance: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SupplierRow> for Supplier {
    type Error = DbError;

    fn try_from(row: SupplierRow) -> DbResult<Self> {
        Ok(Supplier {
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
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Supplier>> {
        let row: Option<SupplierRow> = sqlx::query_as(
            "SELECT id, name, tax_id, balance, created_at, updated_at FROM suppliers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Supplier::try_from).transpose()
    }

    pub async fn insert(&self, supplier: &Supplier) -> DbResult<()> {
        debug!(id = %supplier.id, name = %supplier.name, "Inserting supplier");

        sqlx::query(
            r#"
            INSERT INTO suppliers (id, name, tax_id, balance, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.tax_id)
        .bind(money_to_db(supplier.balance))
        .bind(supplier.created_at)
        .bind(supplier.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SupplierLedger for SupplierRepository {
    async fn get(&self, id: &str) -> LedgerResult<Supplier> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(EntityKind::Supplier, id).into())
    }

    async fn adjust_balance(&self, id: &str, delta: Money) -> LedgerResult<Money> {
        Ok(account::adjust_balance(&self.pool, SUPPLIERS, id, delta).await?)
    }
}
