//! Database operations for the Tienda `PostgreSQL` schema.
//!
//! ## Tables
//!
//! - `categorias`, `productos`, `producto_imagenes`, `variaciones` - Catalog
//! - `grupos_adicionales`, `adicionales`, `producto_grupo_adicional` - Modifiers
//! - `departamentos`, `provincias`, `distritos` - Ubigeo
//! - `clientes`, `direcciones`, `direcciones_validadas` - Customers
//! - `zonas_reparto`, `zona_distritos`, `costos_envio_dinamico`,
//!   `horarios_zona`, `excepciones_zona` - Delivery zones
//! - `cupones`, `cupon_usos` - Coupons
//! - `pedidos`, `detalle_pedidos`, `detalle_pedido_adicionales`,
//!   `pedido_estado_historial` - Orders
//! - `pagos`, `cuotas_credito` - Payments and installments
//! - `movimientos_inventario` - Stock ledger
//!
//! Repositories borrow the pool for plain reads and writes. Functions that
//! take a `&mut PgConnection` are meant to run inside a caller's transaction.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p tienda-cli -- migrate
//! ```

pub mod categorias;
pub mod clientes;
pub mod cuotas;
pub mod cupones;
pub mod inventario;
pub mod pagos;
pub mod pedidos;
pub mod productos;
pub mod zonas;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use categorias::CategoriaRepository;
pub use clientes::{ClienteRepository, DireccionRepository};
pub use cuotas::CuotaRepository;
pub use cupones::CuponRepository;
pub use inventario::InventarioRepository;
pub use pagos::PagoRepository;
pub use pedidos::PedidoRepository;
pub use productos::ProductoRepository;
pub use zonas::ZonaRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
    pub(crate) fn unique_or_database(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }

    /// Map a foreign-key violation to `Conflict`, anything else to `Database`.
    pub(crate) fn foreign_key_or_database(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_foreign_key_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Build a pool that connects on first use.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL cannot be parsed.
pub fn create_lazy_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect_lazy(database_url.expose_secret())
}
