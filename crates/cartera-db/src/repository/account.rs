//! Shared balance handling for the `customers` and `suppliers` tables.
//!
//! Both tables store the balance as decimal text, which SQLite cannot add
//! to atomically. Updates are therefore read-modify-write guarded by a
//! `version` column:
//!
//! ```text
//! read (balance, version=7)
//!      │
//!      ▼
//! UPDATE ... SET balance = new, version = 8 WHERE id = ? AND version = 7
//!      │
//!      ├── 1 row  → done
//!      └── 0 rows → someone else won, read again
//! ```

use cartera_core::error::EntityKind;
use cartera_core::Money;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use super::{money_from_db, money_to_db};
use crate::error::{DbError, DbResult};

/// Attempts before a balance update gives up with [`DbError::Conflict`].
pub(crate) const MAX_CAS_ATTEMPTS: u32 = 16;

#[derive(Debug, Clone, Copy)]
pub(crate) struct AccountTable {
    pub table: &'static str,
    pub entity: EntityKind,
}

pub(crate) const CUSTOMERS: AccountTable = AccountTable {
    table: "customers",
    entity: EntityKind::Customer,
};

pub(crate) const SUPPLIERS: AccountTable = AccountTable {
    table: "suppliers",
    entity: EntityKind::Supplier,
};

/// Adds `delta` to an account balance and returns the new balance.
pub(crate) async fn adjust_balance(
    pool: &SqlitePool,
    account: AccountTable,
    id: &str,
    delta: Money,
) -> DbResult<Money> {
    let select = format!("SELECT balance, version FROM {} WHERE id = ?1", account.table);
    let update = format!(
        "UPDATE {} SET balance = ?1, version = version + 1, updated_at = ?2 WHERE id = ?3 AND version = ?4",
        account.table
    );

    for attempt in 1..=MAX_CAS_ATTEMPTS {
        let row: Option<(String, i64)> = sqlx::query_as(&select).bind(id).fetch_optional(pool).await?;
        let (balance, version) = row.ok_or_else(|| DbError::not_found(account.entity, id))?;

        let new_balance = money_from_db("balance", &balance)?
            .checked_add(delta)
            .ok_or_else(|| DbError::Overflow {
                entity: account.entity,
                id: id.to_string(),
            })?;

        let result = sqlx::query(&update)
            .bind(money_to_db(new_balance))
            .bind(Utc::now())
            .bind(id)
            .bind(version)
            .execute(pool)
            .await?;

        if result.rows_affected() == 1 {
            debug!(
                entity = %account.entity,
                id = %id,
                delta = %delta,
                balance = %new_balance,
                "Balance adjusted"
            );
            return Ok(new_balance);
        }

        warn!(entity = %account.entity, id = %id, attempt, "Balance changed concurrently, retrying");
    }

    Err(DbError::Conflict {
        entity: account.entity,
        id: id.to_string(),
        attempts: MAX_CAS_ATTEMPTS,
    })
}
