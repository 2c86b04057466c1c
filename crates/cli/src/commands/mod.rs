//! CLI subcommands.

pub mod cotizar;
pub mod migrate;
pub mod seed;

use sqlx::PgPool;
use tienda_api::config::ApiConfig;
use tienda_api::db;

/// Load the API configuration and connect to its database.
///
/// # Errors
///
/// Returns an error if the database URL is missing or the connection fails.
pub async fn connect() -> Result<(ApiConfig, PgPool), Box<dyn std::error::Error>> {
    let config = ApiConfig::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Connected to database");
    Ok((config, pool))
}
