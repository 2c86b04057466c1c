//! Order state changes and payments.

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use tienda_core::credito::liberar_credito;
use tienda_core::pedido::{saldo_pendiente, transicionar};
use tienda_core::{EstadoPago, EstadoPedido, PedidoId, TipoMovimiento, TipoPago, format_soles};

use super::inventario::registrar_movimiento;
use crate::db::inventario::Existencia;
use crate::db::pagos::NuevoPago;
use crate::db::{RepositoryError, clientes, cuotas, pagos, pedidos};
use crate::error::AppError;
use crate::models::pedido::{CambioEstadoInput, DetallePedido, Pago, PagoInput, Pedido};
use crate::models::texto_opcional;
use crate::state::AppState;

pub struct PedidoService<'a> {
    state: &'a AppState,
}

impl<'a> PedidoService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Move an order to a new state and record it in the history.
    ///
    /// Cancelling returns every line's stock with `devolucion` movements,
    /// closes the unpaid installments and releases their credit, and fails
    /// any pending payment.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown order and a validation error for a
    /// transition the order's state does not allow.
    #[instrument(skip(self, input), fields(estado = %input.estado))]
    pub async fn cambiar_estado(
        &self,
        id: PedidoId,
        input: &CambioEstadoInput,
    ) -> Result<Pedido, AppError> {
        let comentario = texto_opcional(input.comentario.as_deref());
        if comentario.as_ref().is_some_and(|c| c.chars().count() > 255) {
            return Err(AppError::invalid(
                "comentario",
                "el comentario no puede superar 255 caracteres",
            ));
        }

        let mut tx = self.state.pool().begin().await?;
        let actual = pedidos::lock(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("pedido", id))?;
        let nuevo = transicionar(actual.estado, input.estado)?;

        let pedido = pedidos::set_estado(&mut tx, id, nuevo).await?;
        pedidos::registrar_historial(
            &mut tx,
            id,
            Some(actual.estado),
            nuevo,
            comentario.as_deref(),
        )
        .await?;

        if nuevo == EstadoPedido::Cancelado {
            self.revertir(&mut tx, &pedido).await?;
        }

        tx.commit().await?;

        info!(
            pedido_id = %id,
            desde = %actual.estado,
            hacia = %nuevo,
            "order state changed"
        );
        Ok(pedido)
    }

    /// Undo the stock and credit effects of a cancelled order.
    ///
    /// Rows are locked in checkout's order (customer, then stock rows) and
    /// the installments last, after the order row the caller holds.
    async fn revertir(
        &self,
        conn: &mut sqlx::PgConnection,
        pedido: &Pedido,
    ) -> Result<(), AppError> {
        let es_credito = pedido.tipo_pago == TipoPago::Credito;
        let cliente = if es_credito {
            clientes::lock(conn, pedido.cliente_id).await?
        } else {
            None
        };

        let motivo = format!("Cancelación del pedido {}", pedido.numero);
        let detalles = pedidos::list_detalles(conn, pedido.id).await?;
        for (existencia, cantidad) in devoluciones(&detalles) {
            match registrar_movimiento(
                conn,
                existencia,
                Some(pedido.id),
                TipoMovimiento::Devolucion,
                cantidad,
                Some(&motivo),
            )
            .await
            {
                Ok(_) => {}
                // A product deleted since the order keeps no stock to return.
                Err(AppError::Database(RepositoryError::NotFound)) => {
                    warn!(producto_id = %existencia.producto_id, "stock not returned, product is gone");
                }
                Err(err) => return Err(err),
            }
        }

        if es_credito {
            let saldo = cuotas::cancelar_pendientes(conn, pedido.id).await?;
            if saldo > Decimal::ZERO
                && let Some(cliente) = cliente
            {
                let usado = liberar_credito(cliente.credito_usado, saldo);
                clientes::set_credito_usado(conn, cliente.id, usado).await?;
                info!(cliente_id = %cliente.id, liberado = %saldo, "credit released");
            }
        }

        let anulados = pagos::anular_pendientes(conn, pedido.id).await?;
        if anulados > 0 {
            info!(pedido_id = %pedido.id, anulados, "pending payments failed");
        }
        Ok(())
    }

    /// Record a payment against a cash order.
    ///
    /// Credit orders are paid per installment instead. A completed payment
    /// may not exceed what is still owed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown order and a validation error for an
    /// invalid payment.
    #[instrument(skip(self, input), fields(metodo = %input.metodo, monto = %input.monto))]
    pub async fn registrar_pago(&self, id: PedidoId, input: &PagoInput) -> Result<Pago, AppError> {
        input.validate()?;

        let mut tx = self.state.pool().begin().await?;
        let pedido = pedidos::lock(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("pedido", id))?;
        if pedido.estado == EstadoPedido::Cancelado {
            return Err(AppError::invalid("pedido", "el pedido está cancelado"));
        }
        if pedido.tipo_pago == TipoPago::Credito {
            return Err(AppError::invalid(
                "metodo",
                "los pedidos a crédito se pagan por cuota",
            ));
        }

        let existentes: Vec<_> = pagos::list_by_pedido(&mut tx, id)
            .await?
            .into_iter()
            .map(|p| (p.estado, p.monto))
            .collect();
        let saldo = saldo_pendiente(pedido.totales.total, &existentes);
        if input.estado == EstadoPago::Completado && input.monto > saldo {
            return Err(AppError::invalid(
                "monto",
                format!("el monto excede el saldo pendiente de {}", format_soles(saldo)),
            ));
        }

        let pago = pagos::insertar(
            &mut tx,
            &NuevoPago {
                pedido_id: id,
                cuota_credito_id: None,
                metodo: input.metodo,
                monto: input.monto,
                estado: input.estado,
                referencia: texto_opcional(input.referencia.as_deref()),
            },
        )
        .await?;
        tx.commit().await?;

        info!(pedido_id = %id, pago_id = %pago.id, "payment recorded");
        Ok(pago)
    }
}

/// Stock to return for each line, ordered the way checkout locks stock rows:
/// products by ID, then variations by ID.
fn devoluciones(detalles: &[DetallePedido]) -> Vec<(Existencia, i32)> {
    let mut devoluciones: Vec<_> = detalles
        .iter()
        .map(|d| {
            let existencia = Existencia {
                producto_id: d.producto_id,
                variacion_id: d.variacion_id,
            };
            (existencia, d.cantidad)
        })
        .collect();
    devoluciones.sort_by_key(|(e, _)| (e.variacion_id, e.producto_id));
    devoluciones
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tienda_core::{DetallePedidoId, ProductoId, VariacionId};

    fn detalle(id: i32, producto: i32, variacion: Option<i32>, cantidad: i32) -> DetallePedido {
        DetallePedido {
            id: DetallePedidoId::new(id),
            pedido_id: PedidoId::new(1),
            producto_id: ProductoId::new(producto),
            variacion_id: variacion.map(VariacionId::new),
            nombre_producto: format!("Producto {producto}"),
            nombre_variacion: None,
            cantidad,
            precio_unitario: Decimal::TEN,
            subtotal: Decimal::TEN * Decimal::from(cantidad),
            adicionales: Vec::new(),
        }
    }

    #[test]
    fn test_returns_follow_checkout_lock_order() {
        let detalles = [
            detalle(1, 9, Some(4), 1),
            detalle(2, 7, None, 2),
            detalle(3, 3, Some(2), 3),
            detalle(4, 2, None, 4),
        ];

        let orden: Vec<_> = devoluciones(&detalles)
            .into_iter()
            .map(|(e, cantidad)| (i32::from(e.producto_id), e.variacion_id.map(i32::from), cantidad))
            .collect();

        assert_eq!(
            orden,
            vec![(2, None, 4), (7, None, 2), (3, Some(2), 3), (9, Some(4), 1)]
        );
    }
}
