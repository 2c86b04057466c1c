//! Database operations for the stock ledger.
//!
//! Stock lives on `productos.stock`, or on `variaciones.stock` for lines
//! with a variation. Every change goes through [`lock_stock`],
//! [`aplicar`] and [`insertar`] inside one transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use tienda_core::inventario::MovimientoInventario;
use tienda_core::{MovimientoInventarioId, PedidoId, ProductoId, TipoMovimiento, VariacionId};

use super::RepositoryError;
use crate::models::Paginacion;
use crate::models::pedido::MovimientoRegistrado;

#[derive(Debug, sqlx::FromRow)]
struct MovimientoRow {
    id: i32,
    producto_id: i32,
    variacion_id: Option<i32>,
    pedido_id: Option<i32>,
    tipo: TipoMovimiento,
    cantidad: i32,
    stock_anterior: i32,
    stock_nuevo: i32,
    motivo: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<MovimientoRow> for MovimientoRegistrado {
    fn from(row: MovimientoRow) -> Self {
        Self {
            id: MovimientoInventarioId::new(row.id),
            producto_id: ProductoId::new(row.producto_id),
            variacion_id: row.variacion_id.map(VariacionId::new),
            pedido_id: row.pedido_id.map(PedidoId::new),
            movimiento: MovimientoInventario {
                tipo: row.tipo,
                cantidad: row.cantidad,
                stock_anterior: row.stock_anterior,
                stock_nuevo: row.stock_nuevo,
            },
            motivo: row.motivo,
            created_at: row.created_at,
        }
    }
}

const MOVIMIENTO_COLUMNS: &str = "id, producto_id, variacion_id, pedido_id, tipo, cantidad, \
     stock_anterior, stock_nuevo, motivo, created_at";

/// Where a movement's stock is kept, plus what it is recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Existencia {
    pub producto_id: ProductoId,
    pub variacion_id: Option<VariacionId>,
}

/// Repository for inventory reads.
pub struct InventarioRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> InventarioRepository<'a> {
    /// Create a new inventory repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Movements of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_producto(
        &self,
        producto_id: ProductoId,
        paginacion: Paginacion,
    ) -> Result<Vec<MovimientoRegistrado>, RepositoryError> {
        let rows = sqlx::query_as::<_, MovimientoRow>(&format!(
            "SELECT {MOVIMIENTO_COLUMNS} FROM movimientos_inventario \
             WHERE producto_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(producto_id)
        .bind(paginacion.limit())
        .bind(paginacion.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Lock the stock row and return its current stock.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` when the product is deleted or the
/// variation does not belong to it.
pub async fn lock_stock(
    conn: &mut PgConnection,
    existencia: Existencia,
) -> Result<i32, RepositoryError> {
    let stock: Option<(i32,)> = match existencia.variacion_id {
        Some(variacion_id) => {
            sqlx::query_as(
                "SELECT v.stock FROM variaciones v \
                 JOIN productos p ON p.id = v.producto_id \
                 WHERE v.id = $1 AND v.producto_id = $2 AND p.deleted_at IS NULL \
                 FOR UPDATE OF v",
            )
            .bind(variacion_id)
            .bind(existencia.producto_id)
            .fetch_optional(&mut *conn)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT stock FROM productos WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
            )
            .bind(existencia.producto_id)
            .fetch_optional(&mut *conn)
            .await?
        }
    };

    stock.map(|(s,)| s).ok_or(RepositoryError::NotFound)
}

/// Write the movement's resulting stock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn aplicar(
    conn: &mut PgConnection,
    existencia: Existencia,
    movimiento: &MovimientoInventario,
) -> Result<(), RepositoryError> {
    let query = match existencia.variacion_id {
        Some(variacion_id) => sqlx::query("UPDATE variaciones SET stock = $2 WHERE id = $1")
            .bind(variacion_id)
            .bind(movimiento.stock_nuevo),
        None => sqlx::query("UPDATE productos SET stock = $2 WHERE id = $1")
            .bind(existencia.producto_id)
            .bind(movimiento.stock_nuevo),
    };
    query.execute(&mut *conn).await?;
    Ok(())
}

/// Record a computed movement in the ledger.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insertar(
    conn: &mut PgConnection,
    existencia: Existencia,
    pedido_id: Option<PedidoId>,
    movimiento: &MovimientoInventario,
    motivo: Option<&str>,
) -> Result<MovimientoRegistrado, RepositoryError> {
    let row = sqlx::query_as::<_, MovimientoRow>(&format!(
        "INSERT INTO movimientos_inventario ( \
             producto_id, variacion_id, pedido_id, tipo, cantidad, stock_anterior, stock_nuevo, motivo \
         ) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {MOVIMIENTO_COLUMNS}"
    ))
    .bind(existencia.producto_id)
    .bind(existencia.variacion_id)
    .bind(pedido_id)
    .bind(movimiento.tipo)
    .bind(movimiento.cantidad)
    .bind(movimiento.stock_anterior)
    .bind(movimiento.stock_nuevo)
    .bind(motivo)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}
