//! # Sale Repository
//!
//! Database operations for sales and sale items.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  Cart (memory) ──► settlement engine computes totals                   │
//! │                          │                                              │
//! │                          ▼                                              │
//! │  record()  BEGIN                                                       │
//! │              INSERT sales       (header, totals, payment)              │
//! │              INSERT sale_items  (one row per line, frozen prices)      │
//! │            COMMIT                                                      │
//! │                                                                         │
//! │  After commit the sale is never updated. Stock and balances are        │
//! │  separate ledger writes.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use cartera_core::error::{EntityKind, LedgerResult};
use cartera_core::ledger::SaleLedger;
use cartera_core::{PaymentMethod, PriceTier, Sale, SaleItem};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::{money_from_db, money_to_db, opt_money_from_db};
use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    customer_id: Option<String>,
    subtotal: String,
    tax: String,
    freight: String,
    surcharge: String,
    total: String,
    installments: i64,
    installment_amount: Option<String>,
    payment_method: PaymentMethod,
    paid_amount: String,
    due_amount: String,
    change_amount: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SaleItemRow {
    product_id: String,
    name: String,
    quantity: i64,
    unit_price: String,
    unit_cost: String,
    price_tier: PriceTier,
}

impl TryFrom<SaleItemRow> for SaleItem {
    type Error = DbError;

    fn try_from(row: SaleItemRow) -> DbResult<Self> {
        Ok(SaleItem {
            unit_price: money_from_db("unit_price", &row.unit_price)?,
            unit_cost: money_from_db("unit_cost", &row.unit_cost)?,
            product_id: row.product_id,
            name: row.name,
            quantity: row.quantity,
            price_tier: row.price_tier,
        })
    }
}

impl SaleRow {
    fn into_sale(self, items: Vec<SaleItem>) -> DbResult<Sale> {
        let installments =
            u32::try_from(self.installments).map_err(|e| DbError::decode("installments", e))?;

        Ok(Sale {
            subtotal: money_from_db("subtotal", &self.subtotal)?,
            tax: money_from_db("tax", &self.tax)?,
            freight: money_from_db("freight", &self.freight)?,
            surcharge: money_from_db("surcharge", &self.surcharge)?,
            total: money_from_db("total", &self.total)?,
            installment_amount: opt_money_from_db("installment_amount", self.installment_amount.as_deref())?,
            paid_amount: money_from_db("paid_amount", &self.paid_amount)?,
            due_amount: money_from_db("due_amount", &self.due_amount)?,
            change: money_from_db("change_amount", &self.change_amount)?,
            id: self.id,
            customer_id: self.customer_id,
            items,
            installments,
            payment_method: self.payment_method,
            created_at: self.created_at,
        })
    }
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID, lines in their original order.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let row: Option<SaleRow> = sqlx::query_as(
            r#"
            SELECT id, customer_id, subtotal, tax, freight, surcharge, total,
                   installments, installment_amount, payment_method,
                   paid_amount, due_amount, change_amount, created_at
            FROM sales
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = self.get_items(id).await?;
        row.into_sale(items).map(Some)
    }

    /// Gets all line items for a sale.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let rows: Vec<SaleItemRow> = sqlx::query_as(
            r#"
            SELECT product_id, name, quantity, unit_price, unit_cost, price_tier
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SaleItem::try_from).collect()
    }

    /// Inserts the sale header and every line in one transaction.
    pub async fn insert(&self, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, total = %sale.total, items = sale.items.len(), "Recording sale");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, customer_id, subtotal, tax, freight, surcharge, total,
                installments, installment_amount, payment_method,
                paid_amount, due_amount, change_amount, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.customer_id)
        .bind(money_to_db(sale.subtotal))
        .bind(money_to_db(sale.tax))
        .bind(money_to_db(sale.freight))
        .bind(money_to_db(sale.surcharge))
        .bind(money_to_db(sale.total))
        .bind(i64::from(sale.installments))
        .bind(sale.installment_amount.map(money_to_db))
        .bind(sale.payment_method)
        .bind(money_to_db(sale.paid_amount))
        .bind(money_to_db(sale.due_amount))
        .bind(money_to_db(sale.change))
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await?;

        for (line_no, item) in sale.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    sale_id, line_no, product_id, name, quantity, unit_price, unit_cost, price_tier
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&sale.id)
            .bind(line_no as i64)
            .bind(&item.product_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(money_to_db(item.unit_price))
            .bind(money_to_db(item.unit_cost))
            .bind(item.price_tier)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Number of recorded sales.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl SaleLedger for SaleRepository {
    async fn record(&self, sale: &Sale) -> LedgerResult<()> {
        Ok(self.insert(sale).await?)
    }

    async fn get(&self, id: &str) -> LedgerResult<Sale> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(EntityKind::Sale, id).into())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use cartera_core::{LedgerError, Money, Product};
    use rust_decimal_macros::dec;

    async fn setup() -> (Database, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = Product::new("ACE-900", "Aceite 900ml", Money::new(dec!(1.90)), Money::new(dec!(3.25)));
        db.products().insert(&product).await.unwrap();
        (db, product)
    }

    fn sale_for(product: &Product) -> Sale {
        let item = SaleItem {
            product_id: product.id.clone(),
            name: product.name.clone(),
            quantity: 4,
            unit_price: product.retail_price,
            unit_cost: product.cost_price,
            price_tier: PriceTier::Retail,
        };

        Sale {
            id: uuid::Uuid::new_v4().to_string(),
            customer_id: None,
            items: vec![item.clone(), SaleItem { quantity: 1, ..item }],
            subtotal: Money::new(dec!(16.25)),
            tax: Money::new(dec!(3.4125)),
            freight: Money::zero(),
            surcharge: Money::zero(),
            total: Money::new(dec!(19.6625)),
            installments: 1,
            installment_amount: None,
            payment_method: PaymentMethod::Cash,
            paid_amount: Money::from_major(20),
            due_amount: Money::zero(),
            change: Money::new(dec!(0.3375)),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_record_and_get() {
        let (db, product) = setup().await;
        let repo = db.sales();
        let sale = sale_for(&product);

        repo.record(&sale).await.unwrap();
        let loaded = repo.get(&sale.id).await.unwrap();

        assert_eq!(loaded.items, sale.items);
        assert_eq!(loaded.total, Money::new(dec!(19.6625)));
        assert_eq!(loaded.change, Money::new(dec!(0.3375)));
        assert_eq!(loaded.payment_method, PaymentMethod::Cash);
        assert_eq!(loaded.customer_id, None);
    }

    #[tokio::test]
    async fn test_same_sale_twice_is_duplicate() {
        let (db, product) = setup().await;
        let repo = db.sales();
        let sale = sale_for(&product);

        repo.record(&sale).await.unwrap();
        let err = repo.record(&sale).await.unwrap_err();

        assert!(matches!(err, LedgerError::Duplicate { entity: EntityKind::Sale, .. }));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_line_leaves_no_header() {
        let (db, product) = setup().await;
        let repo = db.sales();
        let mut sale = sale_for(&product);
        sale.items[1].product_id = "no-such-product".to_string();

        assert!(repo.record(&sale).await.is_err());
        assert!(repo.get_by_id(&sale.id).await.unwrap().is_none());
    }
}
