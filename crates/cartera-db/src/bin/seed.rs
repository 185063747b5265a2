//! # Seed Data Generator
//!
//! Populates a database with a small demo store for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./cartera_dev.db
//! cargo run -p cartera-db --bin seed
//!
//! # Specify database path
//! cargo run -p cartera-db --bin seed -- --db ./data/cartera.db
//! ```
//!
//! ## Generated Data
//! - Products across a few grocery families, some with wholesale prices
//! - Customers with opening balances (one in credit)
//! - Suppliers with opening balances
//! - Checks in portfolio received from the customers

use std::env;

use chrono::{Days, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cartera_core::ledger::CheckLedger;
use cartera_core::{Customer, Money, NewCheck, Product, Supplier};
use cartera_db::{Database, DbConfig};

/// (sku, name, cost, retail, wholesale) with prices in cents.
const PRODUCTS: &[(&str, &str, i64, i64, Option<i64>)] = &[
    ("YER-500", "Yerba Mate 500g", 210, 350, Some(310)),
    ("YER-1KG", "Yerba Mate 1kg", 390, 640, Some(570)),
    ("AZU-1KG", "Azúcar 1kg", 95, 160, Some(140)),
    ("HAR-000", "Harina 000 1kg", 80, 135, None),
    ("ACE-900", "Aceite Girasol 900ml", 190, 325, Some(290)),
    ("FID-500", "Fideos Spaghetti 500g", 70, 120, None),
    ("ARR-1KG", "Arroz Largo Fino 1kg", 110, 185, Some(165)),
    ("LEC-1L", "Leche Entera 1L", 85, 140, None),
    ("GAL-CHO", "Galletitas Chocolate", 60, 110, None),
    ("DUL-LEC", "Dulce de Leche 400g", 150, 260, Some(230)),
];

/// (name, tax id, opening balance in cents)
const CUSTOMERS: &[(&str, &str, i64)] = &[
    ("Almacén Don Luis", "20-12345678-3", 12000),
    ("Kiosco 24", "27-23456789-1", 0),
    ("Ferretería Sur", "30-34567890-5", -2500),
];

const SUPPLIERS: &[(&str, &str, i64)] = &[
    ("Distribuidora Norte", "30-71234567-8", 85000),
    ("Molinos SA", "30-50001234-9", 0),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,cartera_db=debug,sqlx=warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./cartera_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Cartera Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./cartera_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(path = %db_path, "Seeding database");
    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    for (sku, name, cost, retail, wholesale) in PRODUCTS {
        let mut product = Product::new(*sku, *name, Money::from_cents(*cost), Money::from_cents(*retail))
            .with_stock(stock_for(sku));
        if let Some(wholesale) = wholesale {
            product = product.with_wholesale_price(Money::from_cents(*wholesale));
        }
        db.products().insert(&product).await?;
    }

    let mut customer_ids = Vec::new();
    for (name, tax_id, balance) in CUSTOMERS {
        let mut customer = Customer::new(*name).with_balance(Money::from_cents(*balance));
        customer.tax_id = Some(tax_id.to_string());
        db.customers().insert(&customer).await?;
        customer_ids.push(customer.id);
    }

    for (name, tax_id, balance) in SUPPLIERS {
        let mut supplier = Supplier::new(*name).with_balance(Money::from_cents(*balance));
        supplier.tax_id = Some(tax_id.to_string());
        db.suppliers().insert(&supplier).await?;
    }

    let today = Utc::now().date_naive();
    let mut portfolio = Money::zero();
    for (n, customer_id) in customer_ids.iter().enumerate() {
        let amount = Money::new(Decimal::from(150 * (n as i64 + 1)));
        let check = NewCheck {
            number: format!("{:08}", 40_000 + n),
            bank: "Banco Provincia".to_string(),
            drawer: CUSTOMERS[n].0.to_string(),
            drawer_tax_id: Some(CUSTOMERS[n].1.to_string()),
            amount,
            issue_date: today,
            due_date: today.checked_add_days(Days::new(30 * (n as u64 + 1))).unwrap_or(today),
            received_from: Some(customer_id.clone()),
            notes: None,
        };
        db.checks().create(check).await?;
        portfolio += amount;
    }

    let summary = json!({
        "database": db_path,
        "products": PRODUCTS.len(),
        "customers": CUSTOMERS.len(),
        "suppliers": SUPPLIERS.len(),
        "checks": customer_ids.len(),
        "portfolio_total": portfolio,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    db.close().await;
    Ok(())
}

/// Deterministic opening stock, 0..=120.
fn stock_for(sku: &str) -> i64 {
    sku.bytes().map(i64::from).sum::<i64>() % 121
}
