//! # Purchase Repository
//!
//! Supplier purchases. The document itself is immutable once recorded;
//! only `status` moves, from `pending_payment` to `paid`.

use async_trait::async_trait;
use cartera_core::error::{EntityKind, LedgerResult};
use cartera_core::ledger::PurchaseLedger;
use cartera_core::{Purchase, PurchaseItem, PurchaseStatus};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::{money_from_db, money_to_db};
use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    id: String,
    supplier_id: String,
    invoice_number: String,
    total: String,
    status: PurchaseStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct PurchaseItemRow {
    product_id: String,
    quantity: i64,
    unit_cost: String,
}

impl TryFrom<PurchaseItemRow> for PurchaseItem {
    type Error = DbError;

    fn try_from(row: PurchaseItemRow) -> DbResult<Self> {
        Ok(PurchaseItem {
            unit_cost: money_from_db("unit_cost", &row.unit_cost)?,
            product_id: row.product_id,
            quantity: row.quantity,
        })
    }
}

const SELECT_PURCHASE: &str = r#"
    SELECT id, supplier_id, invoice_number, total, status, created_at, updated_at
    FROM purchases
"#;

#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Purchase>> {
        let row: Option<PurchaseRow> = sqlx::query_as(&format!("{SELECT_PURCHASE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => self.hydrate(row).await.map(Some),
            None => Ok(None),
        }
    }

    /// Purchases from one supplier, newest first.
    pub async fn list_by_supplier(&self, supplier_id: &str) -> DbResult<Vec<Purchase>> {
        let rows: Vec<PurchaseRow> =
            sqlx::query_as(&format!("{SELECT_PURCHASE} WHERE supplier_id = ?1 ORDER BY created_at DESC"))
                .bind(supplier_id)
                .fetch_all(&self.pool)
                .await?;

        let mut purchases = Vec::with_capacity(rows.len());
        for row in rows {
            purchases.push(self.hydrate(row).await?);
        }
        Ok(purchases)
    }

    async fn hydrate(&self, row: PurchaseRow) -> DbResult<Purchase> {
        let items: Vec<PurchaseItemRow> = sqlx::query_as(
            "SELECT product_id, quantity, unit_cost FROM purchase_items WHERE purchase_id = ?1 ORDER BY line_no",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Purchase {
            total: money_from_db("total", &row.total)?,
            items: items.into_iter().map(PurchaseItem::try_from).collect::<DbResult<_>>()?,
            id: row.id,
            supplier_id: row.supplier_id,
            invoice_number: row.invoice_number,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    /// Inserts the purchase header and its lines in one transaction.
    pub async fn insert(&self, purchase: &Purchase) -> DbResult<()> {
        debug!(
            id = %purchase.id,
            supplier_id = %purchase.supplier_id,
            invoice = %purchase.invoice_number,
            total = %purchase.total,
            "Recording purchase"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO purchases (id, supplier_id, invoice_number, total, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.supplier_id)
        .bind(&purchase.invoice_number)
        .bind(money_to_db(purchase.total))
        .bind(purchase.status)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&mut *tx)
        .await?;

        for (line_no, item) in purchase.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO purchase_items (purchase_id, line_no, product_id, quantity, unit_cost)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&purchase.id)
            .bind(line_no as i64)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(money_to_db(item.unit_cost))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn update_status(&self, id: &str, status: PurchaseStatus) -> DbResult<()> {
        let result = sqlx::query("UPDATE purchases SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(EntityKind::Purchase, id));
        }

        info!(id = %id, status = %status, "Purchase status updated");
        Ok(())
    }
}

#[async_trait]
impl PurchaseLedger for PurchaseRepository {
    async fn record(&self, purchase: &Purchase) -> LedgerResult<()> {
        Ok(self.insert(purchase).await?)
    }

    async fn get(&self, id: &str) -> LedgerResult<Purchase> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(EntityKind::Purchase, id).into())
    }

    async fn set_status(&self, id: &str, status: PurchaseStatus) -> LedgerResult<Purchase> {
        self.update_status(id, status).await?;
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use cartera_core::{LedgerError, Money, Product, Supplier, DEFAULT_INVOICE_NUMBER};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_record_then_mark_paid() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let supplier = Supplier::new("Molinos SA");
        let product = Product::new("HAR-000", "Harina 000", Money::new(dec!(0.90)), Money::new(dec!(1.40)));
        db.suppliers().insert(&supplier).await.unwrap();
        db.products().insert(&product).await.unwrap();

        let now = Utc::now();
        let purchase = Purchase {
            id: uuid::Uuid::new_v4().to_string(),
            supplier_id: supplier.id.clone(),
            invoice_number: DEFAULT_INVOICE_NUMBER.to_string(),
            items: vec![PurchaseItem {
                product_id: product.id.clone(),
                quantity: 50,
                unit_cost: Money::new(dec!(0.95)),
            }],
            total: Money::new(dec!(47.50)),
            status: PurchaseStatus::PendingPayment,
            created_at: now,
            updated_at: now,
        };

        let repo = db.purchases();
        repo.record(&purchase).await.unwrap();

        let loaded = repo.get(&purchase.id).await.unwrap();
        assert_eq!(loaded.items, purchase.items);
        assert_eq!(loaded.invoice_number, "N/A");
        assert_eq!(loaded.status, PurchaseStatus::PendingPayment);

        let paid = repo.set_status(&purchase.id, PurchaseStatus::Paid).await.unwrap();
        assert_eq!(paid.status, PurchaseStatus::Paid);

        let listed = repo.list_by_supplier(&supplier.id).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_set_status_unknown_purchase() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.purchases().set_status("missing", PurchaseStatus::Paid).await.unwrap_err();
        assert_eq!(err, LedgerError::not_found(EntityKind::Purchase, "missing"));
    }
}
