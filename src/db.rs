use sqlx::{PgPool, postgres::PgPoolOptions};
use crate::config::StoreConfig;

pub type DbPool = PgPool;

pub async fn create_pool(config: &StoreConfig, database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.timeout())
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
