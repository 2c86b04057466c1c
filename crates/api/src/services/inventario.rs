//! Stock movements.
//!
//! [`registrar_movimiento`] is the only path that changes stock. It runs on
//! the caller's transaction so checkout and cancellation can move stock
//! together with the order rows.

use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};

use tienda_core::inventario::MovimientoInventario;
use tienda_core::{PedidoId, TipoMovimiento};

use crate::db::inventario::{self, Existencia};
use crate::error::AppError;
use crate::models::pedido::{MovimientoInput, MovimientoRegistrado};

/// Lock the stock row, compute the movement, write the new stock and record
/// the movement in the ledger.
///
/// # Errors
///
/// Returns `AppError::Database(NotFound)` for an unknown product or
/// variation and a `422` when the movement would leave stock negative.
pub async fn registrar_movimiento(
    conn: &mut PgConnection,
    existencia: Existencia,
    pedido_id: Option<PedidoId>,
    tipo: TipoMovimiento,
    cantidad: i32,
    motivo: Option<&str>,
) -> Result<MovimientoRegistrado, AppError> {
    let stock = inventario::lock_stock(conn, existencia).await?;
    let movimiento = MovimientoInventario::registrar(stock, tipo, cantidad)?;
    inventario::aplicar(conn, existencia, &movimiento).await?;
    Ok(inventario::insertar(conn, existencia, pedido_id, &movimiento, motivo).await?)
}

/// Manual stock movements (purchases, counts, returns).
pub struct InventarioService<'a> {
    pool: &'a PgPool,
}

impl<'a> InventarioService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a manual movement.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad input or a rejected movement,
    /// `NotFound` for an unknown product or variation.
    #[instrument(skip(self, input), fields(producto_id = %input.producto_id, tipo = %input.tipo))]
    pub async fn registrar(
        &self,
        input: &MovimientoInput,
    ) -> Result<MovimientoRegistrado, AppError> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;
        let registrado = registrar_movimiento(
            &mut tx,
            Existencia {
                producto_id: input.producto_id,
                variacion_id: input.variacion_id,
            },
            None,
            input.tipo,
            input.cantidad,
            input.motivo().as_deref(),
        )
        .await?;
        tx.commit().await?;

        info!(
            cantidad = registrado.movimiento.cantidad,
            stock_nuevo = registrado.movimiento.stock_nuevo,
            "stock movement recorded"
        );
        Ok(registrado)
    }
}
