//! # Seed Data Generator
//!
//! Populates the database with tables and a starter catalog for development.
//!
//! ## Usage
//! ```bash
//! # Uses $BARPOS_DATABASE_PATH (default ./barpos.db)
//! cargo run -p barpos-db --bin seed
//!
//! # Specify database path and table count
//! cargo run -p barpos-db --bin seed -- --db ./barpos_dev.db --tables 20
//! ```
//!
//! Tables and products are only created when none exist yet, so running the
//! seed twice is harmless.

use std::env;

use barpos_core::NewProduct;
use barpos_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_TABLES: u32 = 12;

/// Starter catalog: (name, category, price in cents, stock as (quantity, min)).
const CATALOG: &[(&str, &str, i64, Option<(i64, i64)>)] = &[
    ("Cerveja Lata", "Bebidas", 800, Some((100, 10))),
    ("Refrigerante", "Bebidas", 600, Some((80, 10))),
    ("Porção Batata", "Cozinha", 2500, None),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,barpos=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut config = DbConfig::from_env();
    let mut table_count = DEFAULT_TABLES;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--tables" | "-t" => {
                if i + 1 < args.len() {
                    table_count = args[i + 1].parse().unwrap_or(DEFAULT_TABLES);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("BarPOS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: $BARPOS_DATABASE_PATH or ./barpos.db)");
                println!("  -t, --tables <N>     Number of tables to create (default: 12)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(database = %config.database_path.display(), "Seeding database");
    let db = Database::new(config).await?;

    let existing = db.tables().count().await?;
    if existing > 0 {
        info!(existing, "Tables already present, skipping");
    } else {
        for n in 1..=table_count {
            db.tables().create(&n.to_string()).await?;
        }
        info!(count = table_count, "Created tables");
    }

    let existing = db.products().count().await?;
    if existing > 0 {
        info!(existing, "Products already present, skipping");
    } else {
        for (name, category, price_cents, stock) in CATALOG {
            let product = db
                .products()
                .create(NewProduct {
                    name: name.to_string(),
                    category: category.to_string(),
                    price_cents: *price_cents,
                    controls_stock: stock.is_some(),
                    quantity: stock.map(|(quantity, _)| quantity),
                    min_quantity: stock.map(|(_, min)| min),
                })
                .await?;
            info!(product_id = %product.id, name = %product.name, "Created product");
        }
    }

    let low = db.reports().low_stock().await?;
    info!(low_stock = low.len(), "Seed complete");

    db.close().await;
    Ok(())
}
