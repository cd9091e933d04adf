pub mod api;
pub mod migrate;
pub mod user;

use sqlx::PgPool;

use crate::config::config;
use crate::database::DatabaseManager;

/// Pool for commands that work on the database directly
pub(crate) async fn connect() -> anyhow::Result<PgPool> {
    Ok(DatabaseManager::connect(&config().database).await?)
}
