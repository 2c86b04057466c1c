//! Database operations for orders, their lines and state history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use tienda_core::pedido::TotalesPedido;
use tienda_core::{
    AdicionalId, ClienteId, CuponId, DetallePedidoId, DireccionId, EstadoPedido, MetodoPago,
    PedidoId, ProductoId, TipoPago, VariacionId, ZonaRepartoId,
};

use super::{RepositoryError, cuotas, pagos};
use crate::models::Paginacion;
use crate::models::pedido::{
    DetalleAdicional, DetallePedido, HistorialEstado, Pedido, PedidoCompleto,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PedidoRow {
    id: i32,
    numero: String,
    cliente_id: i32,
    direccion_id: Option<i32>,
    zona_reparto_id: Option<i32>,
    cupon_id: Option<i32>,
    estado: EstadoPedido,
    tipo_pago: TipoPago,
    metodo_pago: MetodoPago,
    subtotal: Decimal,
    igv: Decimal,
    costo_envio: Decimal,
    descuento: Decimal,
    total: Decimal,
    numero_cuotas: Option<i32>,
    observaciones: Option<String>,
    fecha_entrega_estimada: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PedidoRow> for Pedido {
    fn from(row: PedidoRow) -> Self {
        Self {
            id: PedidoId::new(row.id),
            numero: row.numero,
            cliente_id: ClienteId::new(row.cliente_id),
            direccion_id: row.direccion_id.map(DireccionId::new),
            zona_reparto_id: row.zona_reparto_id.map(ZonaRepartoId::new),
            cupon_id: row.cupon_id.map(CuponId::new),
            estado: row.estado,
            tipo_pago: row.tipo_pago,
            metodo_pago: row.metodo_pago,
            totales: TotalesPedido {
                subtotal: row.subtotal,
                igv: row.igv,
                costo_envio: row.costo_envio,
                descuento: row.descuento,
                total: row.total,
            },
            numero_cuotas: row.numero_cuotas,
            observaciones: row.observaciones,
            fecha_entrega_estimada: row.fecha_entrega_estimada,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DetalleRow {
    id: i32,
    pedido_id: i32,
    producto_id: i32,
    variacion_id: Option<i32>,
    nombre_producto: String,
    nombre_variacion: Option<String>,
    cantidad: i32,
    precio_unitario: Decimal,
    subtotal: Decimal,
}

impl From<DetalleRow> for DetallePedido {
    fn from(row: DetalleRow) -> Self {
        Self {
            id: DetallePedidoId::new(row.id),
            pedido_id: PedidoId::new(row.pedido_id),
            producto_id: ProductoId::new(row.producto_id),
            variacion_id: row.variacion_id.map(VariacionId::new),
            nombre_producto: row.nombre_producto,
            nombre_variacion: row.nombre_variacion,
            cantidad: row.cantidad,
            precio_unitario: row.precio_unitario,
            subtotal: row.subtotal,
            adicionales: Vec::new(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DetalleAdicionalRow {
    detalle_pedido_id: i32,
    adicional_id: Option<i32>,
    nombre: String,
    precio_unitario: Decimal,
    cantidad: i32,
}

impl From<DetalleAdicionalRow> for DetalleAdicional {
    fn from(row: DetalleAdicionalRow) -> Self {
        Self {
            adicional_id: row.adicional_id.map(AdicionalId::new),
            nombre: row.nombre,
            precio_unitario: row.precio_unitario,
            cantidad: row.cantidad,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HistorialRow {
    estado_anterior: Option<EstadoPedido>,
    estado_nuevo: EstadoPedido,
    comentario: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<HistorialRow> for HistorialEstado {
    fn from(row: HistorialRow) -> Self {
        Self {
            estado_anterior: row.estado_anterior,
            estado_nuevo: row.estado_nuevo,
            comentario: row.comentario,
            created_at: row.created_at,
        }
    }
}

const PEDIDO_COLUMNS: &str = "id, numero, cliente_id, direccion_id, zona_reparto_id, cupon_id, \
     estado, tipo_pago, metodo_pago, subtotal, igv, costo_envio, descuento, total, \
     numero_cuotas, observaciones, fecha_entrega_estimada, created_at, updated_at";

const DETALLE_COLUMNS: &str = "id, pedido_id, producto_id, variacion_id, nombre_producto, \
     nombre_variacion, cantidad, precio_unitario, subtotal";

// =============================================================================
// Write Types
// =============================================================================

/// An order header before it is stored.
#[derive(Debug, Clone)]
pub struct NuevoPedido {
    pub numero: String,
    pub cliente_id: ClienteId,
    pub direccion_id: Option<DireccionId>,
    pub zona_reparto_id: Option<ZonaRepartoId>,
    pub cupon_id: Option<CuponId>,
    pub tipo_pago: TipoPago,
    pub metodo_pago: MetodoPago,
    pub totales: TotalesPedido,
    pub numero_cuotas: Option<i32>,
    pub observaciones: Option<String>,
    pub fecha_entrega_estimada: Option<DateTime<Utc>>,
}

/// An order line before it is stored, with its priced additionals.
#[derive(Debug, Clone)]
pub struct NuevoDetalle {
    pub producto_id: ProductoId,
    pub variacion_id: Option<VariacionId>,
    pub nombre_producto: String,
    pub nombre_variacion: Option<String>,
    pub cantidad: i32,
    pub precio_unitario: Decimal,
    pub subtotal: Decimal,
    pub adicionales: Vec<DetalleAdicional>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order reads.
pub struct PedidoRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PedidoRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order header by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: PedidoId) -> Result<Option<Pedido>, RepositoryError> {
        let row = sqlx::query_as::<_, PedidoRow>(&format!(
            "SELECT {PEDIDO_COLUMNS} FROM pedidos WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get an order with its lines, history, payments and installments.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_completo(
        &self,
        id: PedidoId,
    ) -> Result<Option<PedidoCompleto>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        get_completo(&mut conn, id).await
    }

    /// Orders of a customer, newest first, plus the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_by_cliente(
        &self,
        cliente_id: ClienteId,
        paginacion: Paginacion,
    ) -> Result<(Vec<Pedido>, i64), RepositoryError> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM pedidos WHERE cliente_id = $1 AND deleted_at IS NULL",
        )
        .bind(cliente_id)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, PedidoRow>(&format!(
            "SELECT {PEDIDO_COLUMNS} FROM pedidos \
             WHERE cliente_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(cliente_id)
        .bind(paginacion.limit())
        .bind(paginacion.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }
}

// =============================================================================
// Transactional Operations
// =============================================================================

/// Next value of the order number sequence.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn siguiente_secuencia(conn: &mut PgConnection) -> Result<i64, RepositoryError> {
    let (secuencia,): (i64,) = sqlx::query_as("SELECT nextval('pedido_numero_seq')")
        .fetch_one(&mut *conn)
        .await?;
    Ok(secuencia)
}

/// Store an order header in state `pendiente`.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the number is taken.
pub async fn insertar(
    conn: &mut PgConnection,
    nuevo: &NuevoPedido,
) -> Result<Pedido, RepositoryError> {
    let row = sqlx::query_as::<_, PedidoRow>(&format!(
        "INSERT INTO pedidos ( \
             numero, cliente_id, direccion_id, zona_reparto_id, cupon_id, tipo_pago, metodo_pago, \
             subtotal, igv, costo_envio, descuento, total, numero_cuotas, observaciones, \
             fecha_entrega_estimada \
         ) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         RETURNING {PEDIDO_COLUMNS}"
    ))
    .bind(&nuevo.numero)
    .bind(nuevo.cliente_id)
    .bind(nuevo.direccion_id)
    .bind(nuevo.zona_reparto_id)
    .bind(nuevo.cupon_id)
    .bind(nuevo.tipo_pago)
    .bind(nuevo.metodo_pago)
    .bind(nuevo.totales.subtotal)
    .bind(nuevo.totales.igv)
    .bind(nuevo.totales.costo_envio)
    .bind(nuevo.totales.descuento)
    .bind(nuevo.totales.total)
    .bind(nuevo.numero_cuotas)
    .bind(nuevo.observaciones.as_deref())
    .bind(nuevo.fecha_entrega_estimada)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::unique_or_database(e, "el número de pedido ya existe"))?;

    Ok(row.into())
}

/// Store the lines of an order, with their additionals.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if an insert fails.
pub async fn insertar_detalles(
    conn: &mut PgConnection,
    pedido_id: PedidoId,
    detalles: &[NuevoDetalle],
) -> Result<Vec<DetallePedido>, RepositoryError> {
    let mut guardados = Vec::with_capacity(detalles.len());
    for detalle in detalles {
        let row = sqlx::query_as::<_, DetalleRow>(&format!(
            "INSERT INTO detalle_pedidos ( \
                 pedido_id, producto_id, variacion_id, nombre_producto, nombre_variacion, \
                 cantidad, precio_unitario, subtotal \
             ) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {DETALLE_COLUMNS}"
        ))
        .bind(pedido_id)
        .bind(detalle.producto_id)
        .bind(detalle.variacion_id)
        .bind(&detalle.nombre_producto)
        .bind(detalle.nombre_variacion.as_deref())
        .bind(detalle.cantidad)
        .bind(detalle.precio_unitario)
        .bind(detalle.subtotal)
        .fetch_one(&mut *conn)
        .await?;

        for adicional in &detalle.adicionales {
            sqlx::query(
                "INSERT INTO detalle_pedido_adicionales \
                     (detalle_pedido_id, adicional_id, nombre, precio_unitario, cantidad) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(row.id)
            .bind(adicional.adicional_id)
            .bind(&adicional.nombre)
            .bind(adicional.precio_unitario)
            .bind(adicional.cantidad)
            .execute(&mut *conn)
            .await?;
        }

        let mut guardado = DetallePedido::from(row);
        guardado.adicionales.clone_from(&detalle.adicionales);
        guardados.push(guardado);
    }
    Ok(guardados)
}

/// Append an entry to the order's state history.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn registrar_historial(
    conn: &mut PgConnection,
    pedido_id: PedidoId,
    estado_anterior: Option<EstadoPedido>,
    estado_nuevo: EstadoPedido,
    comentario: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO pedido_estado_historial (pedido_id, estado_anterior, estado_nuevo, comentario) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(pedido_id)
    .bind(estado_anterior)
    .bind(estado_nuevo)
    .bind(comentario)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Load an order and lock it until the transaction ends.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(conn: &mut PgConnection, id: PedidoId) -> Result<Option<Pedido>, RepositoryError> {
    let row = sqlx::query_as::<_, PedidoRow>(&format!(
        "SELECT {PEDIDO_COLUMNS} FROM pedidos WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Store a new order state.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order is gone.
pub async fn set_estado(
    conn: &mut PgConnection,
    id: PedidoId,
    estado: EstadoPedido,
) -> Result<Pedido, RepositoryError> {
    let row = sqlx::query_as::<_, PedidoRow>(&format!(
        "UPDATE pedidos SET estado = $2 WHERE id = $1 AND deleted_at IS NULL \
         RETURNING {PEDIDO_COLUMNS}"
    ))
    .bind(id)
    .bind(estado)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Into::into).ok_or(RepositoryError::NotFound)
}

/// Lines of an order, with their additionals.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn list_detalles(
    conn: &mut PgConnection,
    pedido_id: PedidoId,
) -> Result<Vec<DetallePedido>, RepositoryError> {
    let rows = sqlx::query_as::<_, DetalleRow>(&format!(
        "SELECT {DETALLE_COLUMNS} FROM detalle_pedidos WHERE pedido_id = $1 ORDER BY id"
    ))
    .bind(pedido_id)
    .fetch_all(&mut *conn)
    .await?;

    let adicionales = sqlx::query_as::<_, DetalleAdicionalRow>(
        "SELECT a.detalle_pedido_id, a.adicional_id, a.nombre, a.precio_unitario, a.cantidad \
         FROM detalle_pedido_adicionales a \
         JOIN detalle_pedidos d ON d.id = a.detalle_pedido_id \
         WHERE d.pedido_id = $1 \
         ORDER BY a.id",
    )
    .bind(pedido_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut por_detalle: HashMap<i32, Vec<DetalleAdicional>> = HashMap::new();
    for row in adicionales {
        por_detalle
            .entry(row.detalle_pedido_id)
            .or_default()
            .push(row.into());
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let adicionales = por_detalle.remove(&row.id).unwrap_or_default();
            let mut detalle = DetallePedido::from(row);
            detalle.adicionales = adicionales;
            detalle
        })
        .collect())
}

async fn get_completo(
    conn: &mut PgConnection,
    id: PedidoId,
) -> Result<Option<PedidoCompleto>, RepositoryError> {
    let Some(row) = sqlx::query_as::<_, PedidoRow>(&format!(
        "SELECT {PEDIDO_COLUMNS} FROM pedidos WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };

    let detalles = list_detalles(conn, id).await?;
    let historial = sqlx::query_as::<_, HistorialRow>(
        "SELECT estado_anterior, estado_nuevo, comentario, created_at \
         FROM pedido_estado_historial WHERE pedido_id = $1 ORDER BY created_at, id",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(Into::into)
    .collect();
    let pagos = pagos::list_by_pedido(conn, id).await?;
    let cuotas = cuotas::list_by_pedido(conn, id).await?;

    Ok(Some(PedidoCompleto {
        pedido: row.into(),
        detalles,
        historial,
        pagos,
        cuotas,
    }))
}
