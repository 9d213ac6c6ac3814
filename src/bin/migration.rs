use clap::Parser;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

use student_store_api::migrator::Migrator;

/// Apply or roll back the schema migrations
#[derive(Debug, Parser)]
#[command(name = "migration", version)]
struct Args {
    /// Database URL; falls back to the DATABASE_URL environment variable
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://student_store.db?mode=rwc")]
    database_url: String,

    /// Roll back every migration instead of applying them
    #[arg(long)]
    down: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    info!("Connecting to database: {}", args.database_url);

    let mut options = ConnectOptions::new(args.database_url);
    options
        .max_connections(5)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(true);

    let db = Database::connect(options).await?;

    if args.down {
        info!("Rolling back all migrations");
        Migrator::down(&db, None).await?;
    } else {
        info!("Applying pending migrations");
        Migrator::up(&db, None).await?;
    }

    info!("Migration completed successfully");
    db.close().await?;
    Ok(())
}
