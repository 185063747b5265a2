//! # Product Repository
//!
//! Database operations for products and their stock.
//!
//! ## Stock Update Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                            │
//! │                                                                     │
//! │  ❌ WRONG: read, compute, write back an absolute value              │
//! │     SELECT stock ... → 10                                           │
//! │     UPDATE products SET stock = 7 WHERE id = ?                      │
//! │                                                                     │
//! │  ✅ CORRECT: Delta update, result read in the same statement        │
//! │     UPDATE products SET stock = stock - 3 ... RETURNING stock       │
//! │                                                                     │
//! │  Sale A: sells 3 → stock - 3                                        │
//! │  Sale B: sells 2 → stock - 2                                        │
//! │  Any interleaving ends at 10 - 3 - 2 = 5                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Physical recounts are the one place an absolute value is written
//! ([`ProductRepository::set_stock`]).

use async_trait::async_trait;
use cartera_core::error::{EntityKind, LedgerResult};
use cartera_core::ledger::ProductLedger;
use cartera_core::{Money, Product};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::{money_from_db, money_to_db, opt_money_from_db};
use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    sku: String,
    name: String,
    stock: i64,
    cost_price: String,
    retail_price: String,
    wholesale_price: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = DbError;

    fn try_from(row: ProductRow) -> DbResult<Self> {
        Ok(Product {
            cost_price: money_from_db("cost_price", &row.cost_price)?,
            retail_price: money_from_db("retail_price", &row.retail_price)?,
            wholesale_price: opt_money_from_db("wholesale_price", row.wholesale_price.as_deref())?,
            id: row.id,
            sku: row.sku,
            name: row.name,
            stock: row.stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_PRODUCT: &str = r#"
    SELECT id, sku, name, stock, cost_price, retail_price, wholesale_price, created_at, updated_at
    FROM products
"#;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!("{SELECT_PRODUCT} WHERE sku = ?1"))
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    /// Lists products ordered by name.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!("{SELECT_PRODUCT} ORDER BY name LIMIT ?1"))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Inserts a new product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, stock, cost_price, retail_price, wholesale_price, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.stock)
        .bind(money_to_db(product.cost_price))
        .bind(money_to_db(product.retail_price))
        .bind(product.wholesale_price.map(money_to_db))
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Adds `delta` to the stock and returns the resulting level.
    ///
    /// ## Arguments
    /// * `id` - Product ID
    /// * `delta` - Change in stock (negative for sales, positive for purchases)
    pub async fn update_stock(&self, id: &str, delta: i64) -> DbResult<i64> {
        debug!(id = %id, delta = %delta, "Updating stock");

        let stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock + ?2, updated_at = ?3
            WHERE id = ?1
            RETURNING stock
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        stock.ok_or_else(|| DbError::not_found(EntityKind::Product, id))
    }

    /// Overwrites the stock level (physical recount).
    pub async fn set_stock(&self, id: &str, value: i64) -> DbResult<i64> {
        debug!(id = %id, value = %value, "Setting stock");

        let result = sqlx::query("UPDATE products SET stock = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(value)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(EntityKind::Product, id));
        }

        Ok(value)
    }

    /// Re-bases the unit cost.
    pub async fn set_cost_price(&self, id: &str, cost: Money) -> DbResult<()> {
        debug!(id = %id, cost = %cost, "Setting cost price");

        let result = sqlx::query("UPDATE products SET cost_price = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(money_to_db(cost))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(EntityKind::Product, id));
        }

        Ok(())
    }

    /// Counts products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl ProductLedger for ProductRepository {
    async fn get(&self, id: &str) -> LedgerResult<Product> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(EntityKind::Product, id).into())
    }

    async fn adjust_stock(&self, id: &str, delta: i64) -> LedgerResult<i64> {
        Ok(self.update_stock(id, delta).await?)
    }

    async fn set_stock(&self, id: &str, value: i64) -> LedgerResult<i64> {
        Ok(ProductRepository::set_stock(self, id, value).await?)
    }

    async fn set_cost_price(&self, id: &str, cost: Money) -> LedgerResult<()> {
        Ok(ProductRepository::set_cost_price(self, id, cost).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use cartera_core::LedgerError;
    use futures_util::future::join_all;
    use rust_decimal_macros::dec;

    async fn setup() -> (Database, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = Product::new("YER-1KG", "Yerba 1kg", Money::new(dec!(2.80)), Money::new(dec!(4.50)))
            .with_stock(10);
        db.products().insert(&product).await.unwrap();
        (db, product)
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trips_money() {
        let (db, product) = setup().await;

        let loaded = ProductLedger::get(&db.products(), &product.id).await.unwrap();
        assert_eq!(loaded.sku, "YER-1KG");
        assert_eq!(loaded.retail_price, Money::new(dec!(4.50)));
        assert_eq!(loaded.wholesale_price, None);
        assert_eq!(loaded.stock, 10);

        let by_sku = db.products().get_by_sku("YER-1KG").await.unwrap().unwrap();
        assert_eq!(by_sku.id, product.id);
    }

    #[tokio::test]
    async fn test_adjust_stock_allows_negative() {
        let (db, product) = setup().await;
        let repo = db.products();

        assert_eq!(repo.adjust_stock(&product.id, -4).await.unwrap(), 6);
        assert_eq!(repo.adjust_stock(&product.id, -9).await.unwrap(), -3);
        assert_eq!(repo.adjust_stock(&product.id, 5).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let (db, _) = setup().await;
        let err = db.products().adjust_stock("missing", -1).await.unwrap_err();
        assert_eq!(err, LedgerError::not_found(EntityKind::Product, "missing"));
    }

    #[tokio::test]
    async fn test_set_stock_and_cost() {
        let (db, product) = setup().await;
        let repo = db.products();

        assert_eq!(ProductLedger::set_stock(&repo, &product.id, 42).await.unwrap(), 42);
        ProductLedger::set_cost_price(&repo, &product.id, Money::new(dec!(3.10)))
            .await
            .unwrap();

        let loaded = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.stock, 42);
        assert_eq!(loaded.cost_price, Money::new(dec!(3.10)));
    }

    #[tokio::test]
    async fn test_concurrent_decrements_sum_exactly() {
        let (db, product) = setup().await;
        let repo = db.products();

        let writes = (0..25).map(|_| repo.adjust_stock(&product.id, -2));
        let results = join_all(writes).await;
        assert!(results.iter().all(Result::is_ok));

        let loaded = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.stock, 10 - 50);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let (db, product) = setup().await;
        let clone = Product::new(product.sku.clone(), "Other", Money::zero(), Money::zero());

        let err = db.products().insert(&clone).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
