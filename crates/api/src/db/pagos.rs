//! Database operations for order payments.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use tienda_core::{CuotaCreditoId, EstadoPago, MetodoPago, PagoId, PedidoId};

use super::RepositoryError;
use crate::models::pedido::Pago;

#[derive(Debug, sqlx::FromRow)]
struct PagoRow {
    id: i32,
    pedido_id: i32,
    cuota_credito_id: Option<i32>,
    metodo: MetodoPago,
    monto: Decimal,
    estado: EstadoPago,
    referencia: Option<String>,
    fecha_pago: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<PagoRow> for Pago {
    fn from(row: PagoRow) -> Self {
        Self {
            id: PagoId::new(row.id),
            pedido_id: PedidoId::new(row.pedido_id),
            cuota_credito_id: row.cuota_credito_id.map(CuotaCreditoId::new),
            metodo: row.metodo,
            monto: row.monto,
            estado: row.estado,
            referencia: row.referencia,
            fecha_pago: row.fecha_pago,
            created_at: row.created_at,
        }
    }
}

const PAGO_COLUMNS: &str = "id, pedido_id, cuota_credito_id, metodo, monto, estado, \
     referencia, fecha_pago, created_at";

/// A payment before it is stored.
#[derive(Debug, Clone)]
pub struct NuevoPago {
    pub pedido_id: PedidoId,
    pub cuota_credito_id: Option<CuotaCreditoId>,
    pub metodo: MetodoPago,
    pub monto: Decimal,
    pub estado: EstadoPago,
    pub referencia: Option<String>,
}

/// Repository for payment reads.
pub struct PagoRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PagoRepository<'a> {
    /// Create a new payment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Payments of an order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_pedido(&self, pedido_id: PedidoId) -> Result<Vec<Pago>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        list_by_pedido(&mut conn, pedido_id).await
    }
}

/// Store a payment. Completed payments are stamped with the current time.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insertar(conn: &mut PgConnection, pago: &NuevoPago) -> Result<Pago, RepositoryError> {
    let row = sqlx::query_as::<_, PagoRow>(&format!(
        "INSERT INTO pagos (pedido_id, cuota_credito_id, metodo, monto, estado, referencia, fecha_pago) \
         VALUES ($1, $2, $3, $4, $5, $6, CASE WHEN $5 = 'completado'::estado_pago THEN NOW() END) \
         RETURNING {PAGO_COLUMNS}"
    ))
    .bind(pago.pedido_id)
    .bind(pago.cuota_credito_id)
    .bind(pago.metodo)
    .bind(pago.monto)
    .bind(pago.estado)
    .bind(pago.referencia.as_deref())
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}

/// Payments of an order, oldest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_by_pedido(
    conn: &mut PgConnection,
    pedido_id: PedidoId,
) -> Result<Vec<Pago>, RepositoryError> {
    let rows = sqlx::query_as::<_, PagoRow>(&format!(
        "SELECT {PAGO_COLUMNS} FROM pagos WHERE pedido_id = $1 ORDER BY created_at, id"
    ))
    .bind(pedido_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Mark the order's pending payments as failed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn anular_pendientes(
    conn: &mut PgConnection,
    pedido_id: PedidoId,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        "UPDATE pagos SET estado = 'fallido' WHERE pedido_id = $1 AND estado = 'pendiente'",
    )
    .bind(pedido_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}
