//! Test support: an in-memory SQLite fixture and ledger wrappers that
//! inject failures.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cartera_core::error::LedgerResult;
use cartera_core::ledger::{CustomerLedger, ProductLedger, SaleLedger, SupplierLedger};
use cartera_core::{
    Check, CheckDetails, Customer, LedgerError, LedgerSet, Money, Product, Sale, Supplier,
};
use cartera_db::{Database, DbConfig};
use chrono::NaiveDate;

use crate::config::SettlementConfig;
use crate::engine::SettlementEngine;

// =============================================================================
// Fixture
// =============================================================================

pub(crate) struct Fixture {
    pub db: Database,
    pub engine: SettlementEngine,
}

/// Millisecond backoff so retry tests stay fast.
pub(crate) fn fast_config() -> SettlementConfig {
    let mut config = SettlementConfig::default();
    config.engine.event_timeout_ms = 5_000;
    config.engine.max_step_retries = 2;
    config.engine.initial_backoff_ms = 1;
    config.engine.max_backoff_ms = 5;
    config
}

pub(crate) async fn fixture() -> Fixture {
    fixture_with(fast_config(), |ledgers| ledgers).await
}

/// Builds the engine over wrapped ledgers. The returned `db` still reaches
/// the unwrapped tables.
pub(crate) async fn fixture_with(
    config: SettlementConfig,
    wrap: impl FnOnce(LedgerSet) -> LedgerSet,
) -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let engine = SettlementEngine::new(wrap(db.ledgers()), config);
    Fixture { db, engine }
}

// =============================================================================
// Seed Helpers
// =============================================================================

pub(crate) async fn seed_product(db: &Database, sku: &str, retail: Money, stock: i64) -> Product {
    let product = Product::new(sku, format!("Product {sku}"), Money::from_major(1), retail).with_stock(stock);
    db.products().insert(&product).await.unwrap();
    product
}

pub(crate) async fn seed_customer(db: &Database, name: &str, balance: Money) -> Customer {
    let customer = Customer::new(name).with_balance(balance);
    db.customers().insert(&customer).await.unwrap();
    customer
}

pub(crate) async fn seed_supplier(db: &Database, name: &str, balance: Money) -> Supplier {
    let supplier = Supplier::new(name).with_balance(balance);
    db.suppliers().insert(&supplier).await.unwrap();
    supplier
}

pub(crate) fn check_details(number: &str) -> CheckDetails {
    CheckDetails {
        number: Some(number.to_string()),
        bank: Some("Banco Nación".to_string()),
        drawer: Some("Juan Pérez".to_string()),
        drawer_tax_id: Some("20-12345678-9".to_string()),
        issue_date: NaiveDate::from_ymd_opt(2026, 3, 1),
        due_date: NaiveDate::from_ymd_opt(2026, 4, 1),
        notes: None,
    }
}

/// A check sitting in the portfolio, not tied to any customer.
pub(crate) async fn seed_check(db: &Database, number: &str, amount: Money) -> Check {
    let new_check = cartera_core::validation::validate_check_details(&check_details(number), amount, None).unwrap();
    let ledgers = db.ledgers();
    ledgers.checks.create(new_check).await.unwrap()
}

// =============================================================================
// Fault Injection
// =============================================================================

/// Stock adjustments of the listed products always fail with a storage error.
pub(crate) struct FailingStock {
    inner: Arc<dyn ProductLedger>,
    failing: HashSet<String>,
}

impl FailingStock {
    pub fn wrap(ledgers: LedgerSet, failing: &[&str]) -> LedgerSet {
        let products = Arc::new(FailingStock {
            inner: ledgers.products.clone(),
            failing: failing.iter().map(|id| id.to_string()).collect(),
        });
        LedgerSet { products, ..ledgers }
    }
}

#[async_trait]
impl ProductLedger for FailingStock {
    async fn get(&self, id: &str) -> LedgerResult<Product> {
        self.inner.get(id).await
    }

    async fn adjust_stock(&self, id: &str, delta: i64) -> LedgerResult<i64> {
        if self.failing.contains(id) {
            return Err(LedgerError::storage("disk I/O error"));
        }
        self.inner.adjust_stock(id, delta).await
    }

    async fn set_stock(&self, id: &str, value: i64) -> LedgerResult<i64> {
        self.inner.set_stock(id, value).await
    }

    async fn set_cost_price(&self, id: &str, cost: Money) -> LedgerResult<()> {
        self.inner.set_cost_price(id, cost).await
    }
}

/// Customer balance writes fail `failures` times before going through.
pub(crate) struct FlakyCustomers {
    inner: Arc<dyn CustomerLedger>,
    failures_left: AtomicU32,
}

impl FlakyCustomers {
    pub fn wrap(ledgers: LedgerSet, failures: u32) -> LedgerSet {
        let customers = Arc::new(FlakyCustomers {
            inner: ledgers.customers.clone(),
            failures_left: AtomicU32::new(failures),
        });
        LedgerSet { customers, ..ledgers }
    }
}

#[async_trait]
impl CustomerLedger for FlakyCustomers {
    async fn get(&self, id: &str) -> LedgerResult<Customer> {
        self.inner.get(id).await
    }

    async fn adjust_balance(&self, id: &str, delta: Money) -> LedgerResult<Money> {
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(LedgerError::storage("database is locked"));
        }
        self.inner.adjust_balance(id, delta).await
    }
}

/// Customer balance writes panic inside the ledger call.
pub(crate) struct PanickingCustomers {
    inner: Arc<dyn CustomerLedger>,
}

impl PanickingCustomers {
    pub fn wrap(ledgers: LedgerSet) -> LedgerSet {
        let customers = Arc::new(PanickingCustomers {
            inner: ledgers.customers.clone(),
        });
        LedgerSet { customers, ..ledgers }
    }
}

#[async_trait]
impl CustomerLedger for PanickingCustomers {
    async fn get(&self, id: &str) -> LedgerResult<Customer> {
        self.inner.get(id).await
    }

    async fn adjust_balance(&self, _id: &str, _delta: Money) -> LedgerResult<Money> {
        panic!("Addition overflowed")
    }
}

/// Supplier balance writes always fail with a storage error.
pub(crate) struct FailingSuppliers {
    inner: Arc<dyn SupplierLedger>,
}

impl FailingSuppliers {
    pub fn wrap(ledgers: LedgerSet) -> LedgerSet {
        let suppliers = Arc::new(FailingSuppliers {
            inner: ledgers.suppliers.clone(),
        });
        LedgerSet { suppliers, ..ledgers }
    }
}

#[async_trait]
impl SupplierLedger for FailingSuppliers {
    async fn get(&self, id: &str) -> LedgerResult<Supplier> {
        self.inner.get(id).await
    }

    async fn adjust_balance(&self, _id: &str, _delta: Money) -> LedgerResult<Money> {
        Err(LedgerError::storage("disk full"))
    }
}

/// Sale records hang for `delay` before reaching the store.
pub(crate) struct SlowSales {
    inner: Arc<dyn SaleLedger>,
    delay: Duration,
}

impl SlowSales {
    pub fn wrap(ledgers: LedgerSet, delay: Duration) -> LedgerSet {
        let sales = Arc::new(SlowSales {
            inner: ledgers.sales.clone(),
            delay,
        });
        LedgerSet { sales, ..ledgers }
    }
}

#[async_trait]
impl SaleLedger for SlowSales {
    async fn record(&self, sale: &Sale) -> LedgerResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.record(sale).await
    }

    async fn get(&self, id: &str) -> LedgerResult<Sale> {
        self.inner.get(id).await
    }
}
