use crate::config::DatabaseConfig;
use crate::error::AppResult;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;

/// Shared handle; `DatabaseConnection` itself is not `Clone` under sea-orm's `mock` feature.
pub type DbPool = Arc<DatabaseConnection>;

pub async fn create_pool(config: &DatabaseConfig) -> AppResult<DbPool> {
    connect(&config.url, config.max_connections).await
}

/// Opens a pool for `url`; the task broker and result backend use this too.
pub async fn connect(url: &str, max_connections: u32) -> AppResult<DbPool> {
    let mut options = ConnectOptions::new(url.to_owned());
    options
        .max_connections(max_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let pool = Database::connect(options).await?;
    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &DbPool) -> AppResult<()> {
    let db: &DatabaseConnection = pool;
    Migrator::up(db, None).await?;
    Ok(())
}
