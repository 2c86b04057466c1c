//! Database operations for coupons and their uses.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use tienda_core::cupon::Cupon;
use tienda_core::{ClienteId, CuponId, PedidoId, TipoCupon};

use super::RepositoryError;

#[derive(Debug, sqlx::FromRow)]
struct CuponRow {
    id: i32,
    codigo: String,
    tipo: TipoCupon,
    valor: Decimal,
    monto_minimo: Option<Decimal>,
    descuento_maximo: Option<Decimal>,
    fecha_inicio: Option<DateTime<Utc>>,
    fecha_fin: Option<DateTime<Utc>>,
    limite_uso: Option<i32>,
    usos: i32,
    activo: bool,
}

impl From<CuponRow> for Cupon {
    fn from(row: CuponRow) -> Self {
        Self {
            id: CuponId::new(row.id),
            codigo: row.codigo,
            tipo: row.tipo,
            valor: row.valor,
            monto_minimo: row.monto_minimo,
            descuento_maximo: row.descuento_maximo,
            fecha_inicio: row.fecha_inicio,
            fecha_fin: row.fecha_fin,
            limite_uso: row.limite_uso,
            usos: row.usos,
            activo: row.activo,
        }
    }
}

const CUPON_COLUMNS: &str = "id, codigo, tipo, valor, monto_minimo, descuento_maximo, \
     fecha_inicio, fecha_fin, limite_uso, usos, activo";

/// Repository for coupon reads.
pub struct CuponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CuponRepository<'a> {
    /// Create a new coupon repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find a live coupon by its normalized code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_por_codigo(&self, codigo: &str) -> Result<Option<Cupon>, RepositoryError> {
        let row = sqlx::query_as::<_, CuponRow>(&format!(
            "SELECT {CUPON_COLUMNS} FROM cupones WHERE codigo = $1 AND deleted_at IS NULL"
        ))
        .bind(codigo)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}

/// Find a live coupon by code and lock it for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_por_codigo(
    conn: &mut PgConnection,
    codigo: &str,
) -> Result<Option<Cupon>, RepositoryError> {
    let row = sqlx::query_as::<_, CuponRow>(&format!(
        "SELECT {CUPON_COLUMNS} FROM cupones \
         WHERE codigo = $1 AND deleted_at IS NULL FOR UPDATE"
    ))
    .bind(codigo)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Count one use of a coupon against an order.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the coupon is already used by the
/// order or has reached its limit.
pub async fn registrar_uso(
    conn: &mut PgConnection,
    cupon_id: CuponId,
    pedido_id: PedidoId,
    cliente_id: ClienteId,
    descuento: Decimal,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE cupones SET usos = usos + 1 \
         WHERE id = $1 AND (limite_uso IS NULL OR usos < limite_uso)",
    )
    .bind(cupon_id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict(
            "el cupón alcanzó su límite de usos".to_owned(),
        ));
    }

    sqlx::query(
        "INSERT INTO cupon_usos (cupon_id, pedido_id, cliente_id, descuento) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(cupon_id)
    .bind(pedido_id)
    .bind(cliente_id)
    .bind(descuento)
    .execute(&mut *conn)
    .await
    .map_err(|e| RepositoryError::unique_or_database(e, "el cupón ya se aplicó a este pedido"))?;

    Ok(())
}
