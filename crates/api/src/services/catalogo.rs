//! Product creation.

use sqlx::PgPool;
use tracing::{info, instrument};

use tienda_core::TipoMovimiento;

use super::inventario::registrar_movimiento;
use crate::db::inventario::Existencia;
use crate::db::productos;
use crate::error::AppError;
use crate::models::catalogo::{Producto, ProductoInput};

const MOTIVO_STOCK_INICIAL: &str = "Stock inicial";

pub struct CatalogoService<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogoService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a product. Its opening stock is booked as an `entrada`
    /// movement in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad input and `Conflict` for a
    /// duplicate slug or sku or an unknown category.
    #[instrument(skip(self, input), fields(nombre = %input.nombre))]
    pub async fn crear_producto(&self, input: &ProductoInput) -> Result<Producto, AppError> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;
        let mut producto = productos::insertar(&mut tx, input).await?;
        if input.stock > 0 {
            let registrado = registrar_movimiento(
                &mut tx,
                Existencia {
                    producto_id: producto.id,
                    variacion_id: None,
                },
                None,
                TipoMovimiento::Entrada,
                input.stock,
                Some(MOTIVO_STOCK_INICIAL),
            )
            .await?;
            producto.stock = registrado.movimiento.stock_nuevo;
        }
        tx.commit().await?;

        info!(producto_id = %producto.id, stock = producto.stock, "product created");
        Ok(producto)
    }
}
