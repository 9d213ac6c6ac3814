//! Seed script: replaces the catalog with the products in a JSON file.
//!
//! Run with: cargo run --bin seed-data -- --file data/products.json
//!
//! Existing order items, orders and products are deleted first.

use anyhow::Context;
use clap::Parser;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ConnectOptions, Database, EntityTrait, Set, TransactionTrait,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use student_store_api::{
    db,
    entities::{order, order_item, product},
    services::totals::validate_money,
};

#[derive(Debug, Parser)]
#[command(name = "seed-data", version)]
struct Args {
    /// Database URL; falls back to the DATABASE_URL environment variable
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://student_store.db?mode=rwc")]
    database_url: String,

    /// Catalog file shaped as {"products": [...]}
    #[arg(long, default_value = "data/products.json")]
    file: PathBuf,

    /// Run migrations before seeding
    #[arg(long)]
    migrate: bool,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
struct SeedProduct {
    name: String,
    #[serde(default)]
    description: String,
    price: Decimal,
    #[serde(default)]
    image_url: String,
    category: String,
}

fn load_catalog(path: &Path) -> anyhow::Result<Vec<SeedProduct>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading catalog file {}", path.display()))?;
    let catalog: CatalogFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing catalog file {}", path.display()))?;

    for seed in &catalog.products {
        validate_money(seed.price, &format!("price of '{}'", seed.name))?;
    }
    Ok(catalog.products)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let products = load_catalog(&args.file)?;

    let mut options = ConnectOptions::new(args.database_url.clone());
    options
        .max_connections(5)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10));

    info!("Connecting to database: {}", args.database_url);
    let conn = Database::connect(options).await?;

    if args.migrate {
        db::run_migrations(&conn).await?;
    }

    let txn = conn.begin().await?;

    info!("Clearing existing data");
    order_item::Entity::delete_many().exec(&txn).await?;
    order::Entity::delete_many().exec(&txn).await?;
    product::Entity::delete_many().exec(&txn).await?;

    for seed in products {
        let created = product::ActiveModel {
            name: Set(seed.name),
            description: Set(seed.description),
            price: Set(seed.price),
            image_url: Set(seed.image_url),
            category: Set(seed.category),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        info!("Created product: {}", created.name);
    }

    txn.commit().await?;
    info!("Seeding complete");

    db::close_pool(conn).await?;
    Ok(())
}
