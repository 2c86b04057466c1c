//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! tienda-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `TIENDA_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/api/migrations/` and are embedded at build
//! time:
//! ```text
//! migrations/
//! ├── 20261001000001_enums.sql
//! ├── 20261001000002_catalogo.sql
//! ├── 20261001000003_clientes.sql
//! └── ...
//! ```

use tracing::info;

/// Run the API database migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (_, pool) = super::connect().await?;

    info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    info!("Migrations complete!");
    Ok(())
}
