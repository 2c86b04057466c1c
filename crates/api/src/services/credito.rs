//! Installment payments.

use tracing::{info, instrument};

use tienda_core::credito::{CuotaCredito, liberar_credito};
use tienda_core::{CuotaCreditoId, EstadoPago, EstadoPedido, format_soles};

use crate::db::pagos::NuevoPago;
use crate::db::{clientes, cuotas, pagos, pedidos};
use crate::error::AppError;
use crate::models::pedido::{Pago, PagoCuotaInput};
use crate::models::texto_opcional;
use crate::state::AppState;

/// An installment after a payment, with the payment that settled it.
#[derive(Debug, serde::Serialize)]
pub struct PagoCuota {
    pub cuota: CuotaCredito,
    pub pago: Pago,
}

pub struct CreditoService<'a> {
    state: &'a AppState,
}

impl<'a> CreditoService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Pay an installment, in full when no amount is given.
    ///
    /// The payment is recorded against the order and the amount paid is
    /// released from the customer's used credit. The order row is locked
    /// before the installment so a concurrent cancellation waits for it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown installment and a validation error
    /// for a paid installment, a cancelled order or an amount above the
    /// balance.
    #[instrument(skip(self, input), fields(metodo = %input.metodo))]
    pub async fn pagar_cuota(
        &self,
        id: CuotaCreditoId,
        input: &PagoCuotaInput,
    ) -> Result<PagoCuota, AppError> {
        input.validate()?;

        let hoy = self.state.config().hoy();
        let mut tx = self.state.pool().begin().await?;

        // Same lock order as cancellation: order, customer, installment.
        let pedido_id = cuotas::pedido_de(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("cuota", id))?;
        let pedido = pedidos::lock(&mut tx, pedido_id)
            .await?
            .ok_or_else(|| AppError::not_found("pedido", pedido_id))?;
        if pedido.estado == EstadoPedido::Cancelado {
            return Err(AppError::invalid("pedido", "el pedido está cancelado"));
        }
        let cliente = clientes::lock(&mut tx, pedido.cliente_id).await?;
        let mut cuota = cuotas::lock(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("cuota", id))?;

        let saldo = cuota.saldo();
        let monto = input.monto.unwrap_or(saldo);
        if monto > saldo {
            return Err(AppError::invalid(
                "monto",
                format!("el monto excede el saldo de la cuota ({})", format_soles(saldo)),
            ));
        }

        let aplicacion = cuota.aplicar_pago(monto, hoy)?;
        let cuota = cuotas::guardar_pago(&mut tx, &cuota).await?;
        let pago = pagos::insertar(
            &mut tx,
            &NuevoPago {
                pedido_id: pedido.id,
                cuota_credito_id: Some(cuota.id),
                metodo: input.metodo,
                monto: aplicacion.aplicado,
                estado: EstadoPago::Completado,
                referencia: texto_opcional(input.referencia.as_deref()),
            },
        )
        .await?;

        if let Some(cliente) = cliente {
            let usado = liberar_credito(cliente.credito_usado, aplicacion.aplicado);
            clientes::set_credito_usado(&mut tx, cliente.id, usado).await?;
        }

        tx.commit().await?;

        info!(
            cuota_id = %cuota.id,
            pedido_id = %pedido.id,
            aplicado = %aplicacion.aplicado,
            estado = %aplicacion.estado,
            "installment paid"
        );
        Ok(PagoCuota { cuota, pago })
    }
}
