//! Database operations for credit installments.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use tienda_core::credito::{CuotaCredito, CuotaProgramada};
use tienda_core::{CuotaCreditoId, EstadoCuota, PedidoId};

use super::RepositoryError;

#[derive(Debug, sqlx::FromRow)]
struct CuotaRow {
    id: i32,
    pedido_id: i32,
    numero_cuota: i32,
    monto_cuota: Decimal,
    monto_pagado: Decimal,
    fecha_vencimiento: NaiveDate,
    fecha_pago: Option<NaiveDate>,
    estado: EstadoCuota,
}

impl From<CuotaRow> for CuotaCredito {
    fn from(row: CuotaRow) -> Self {
        Self {
            id: CuotaCreditoId::new(row.id),
            pedido_id: PedidoId::new(row.pedido_id),
            numero_cuota: row.numero_cuota,
            monto_cuota: row.monto_cuota,
            monto_pagado: row.monto_pagado,
            fecha_vencimiento: row.fecha_vencimiento,
            fecha_pago: row.fecha_pago,
            estado: row.estado,
        }
    }
}

const CUOTA_COLUMNS: &str = "id, pedido_id, numero_cuota, monto_cuota, monto_pagado, \
     fecha_vencimiento, fecha_pago, estado";

/// Repository for installment reads.
pub struct CuotaRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CuotaRepository<'a> {
    /// Create a new installment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Installments of an order in schedule order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_pedido(
        &self,
        pedido_id: PedidoId,
    ) -> Result<Vec<CuotaCredito>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        list_by_pedido(&mut conn, pedido_id).await
    }
}

/// Store a generated schedule for an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if an insert fails.
pub async fn insertar_plan(
    conn: &mut PgConnection,
    pedido_id: PedidoId,
    plan: &[CuotaProgramada],
) -> Result<Vec<CuotaCredito>, RepositoryError> {
    let mut cuotas = Vec::with_capacity(plan.len());
    for cuota in plan {
        let row = sqlx::query_as::<_, CuotaRow>(&format!(
            "INSERT INTO cuotas_credito (pedido_id, numero_cuota, monto_cuota, fecha_vencimiento) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {CUOTA_COLUMNS}"
        ))
        .bind(pedido_id)
        .bind(cuota.numero_cuota)
        .bind(cuota.monto_cuota)
        .bind(cuota.fecha_vencimiento)
        .fetch_one(&mut *conn)
        .await?;
        cuotas.push(row.into());
    }
    Ok(cuotas)
}

/// Installments of an order in schedule order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_by_pedido(
    conn: &mut PgConnection,
    pedido_id: PedidoId,
) -> Result<Vec<CuotaCredito>, RepositoryError> {
    let rows = sqlx::query_as::<_, CuotaRow>(&format!(
        "SELECT {CUOTA_COLUMNS} FROM cuotas_credito WHERE pedido_id = $1 ORDER BY numero_cuota"
    ))
    .bind(pedido_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// The order an installment belongs to, read without locking.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn pedido_de(
    conn: &mut PgConnection,
    id: CuotaCreditoId,
) -> Result<Option<PedidoId>, RepositoryError> {
    let row: Option<(PedidoId,)> =
        sqlx::query_as("SELECT pedido_id FROM cuotas_credito WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(row.map(|(pedido_id,)| pedido_id))
}

/// Load one installment and lock it until the transaction ends.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    id: CuotaCreditoId,
) -> Result<Option<CuotaCredito>, RepositoryError> {
    let row = sqlx::query_as::<_, CuotaRow>(&format!(
        "SELECT {CUOTA_COLUMNS} FROM cuotas_credito WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Persist the paid amount, payment date and state of an installment.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the installment is gone.
pub async fn guardar_pago(
    conn: &mut PgConnection,
    cuota: &CuotaCredito,
) -> Result<CuotaCredito, RepositoryError> {
    let row = sqlx::query_as::<_, CuotaRow>(&format!(
        "UPDATE cuotas_credito SET monto_pagado = $2, fecha_pago = $3, estado = $4 \
         WHERE id = $1 \
         RETURNING {CUOTA_COLUMNS}"
    ))
    .bind(cuota.id)
    .bind(cuota.monto_pagado)
    .bind(cuota.fecha_pago)
    .bind(cuota.estado)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Into::into).ok_or(RepositoryError::NotFound)
}

/// Close the schedule of a cancelled order.
///
/// Untouched installments are deleted and partially paid ones shrink to what
/// was paid. Returns the unpaid balance that was written off.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a statement fails.
pub async fn cancelar_pendientes(
    conn: &mut PgConnection,
    pedido_id: PedidoId,
) -> Result<Decimal, RepositoryError> {
    let (saldo,): (Option<Decimal>,) = sqlx::query_as(
        "SELECT SUM(monto_cuota - monto_pagado) FROM cuotas_credito \
         WHERE pedido_id = $1 AND estado <> 'pagado'",
    )
    .bind(pedido_id)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        "DELETE FROM cuotas_credito \
         WHERE pedido_id = $1 AND estado <> 'pagado' AND monto_pagado = 0",
    )
    .bind(pedido_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE cuotas_credito \
         SET monto_cuota = monto_pagado, estado = 'pagado' \
         WHERE pedido_id = $1 AND estado <> 'pagado' AND monto_pagado > 0",
    )
    .bind(pedido_id)
    .execute(&mut *conn)
    .await?;

    Ok(saldo.unwrap_or(Decimal::ZERO))
}
