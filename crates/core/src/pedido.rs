//! Order pricing, numbering and state transitions.
//!
//! Every order satisfies `subtotal + igv + costo_envio - descuento = total`.
//! [`calcular_totales`] is the only place that produces those figures.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{EstadoPago, EstadoPedido, IGV_RATE, round_money};

/// An additional (modifier) chosen on an order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdicionalLinea {
    pub precio_unitario: Decimal,
    /// Units of this additional per unit of the line.
    pub cantidad: i32,
}

/// A priced order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineaPedido {
    /// Effective product price (offer already applied).
    pub precio_unitario: Decimal,
    /// Variation surcharge, zero without a variation.
    pub recargo_variacion: Decimal,
    pub adicionales: Vec<AdicionalLinea>,
    pub cantidad: i32,
}

impl LineaPedido {
    /// Unit price including variation surcharge and additionals.
    #[must_use]
    pub fn precio_final_unitario(&self) -> Decimal {
        let adicionales: Decimal = self
            .adicionales
            .iter()
            .map(|a| a.precio_unitario * Decimal::from(a.cantidad))
            .sum();
        self.precio_unitario + self.recargo_variacion + adicionales
    }

    /// Line subtotal: final unit price times quantity.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        round_money(self.precio_final_unitario() * Decimal::from(self.cantidad))
    }
}

/// Monetary summary of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalesPedido {
    pub subtotal: Decimal,
    pub igv: Decimal,
    pub costo_envio: Decimal,
    pub descuento: Decimal,
    pub total: Decimal,
}

impl TotalesPedido {
    /// Whether the stored figures satisfy the order identity.
    #[must_use]
    pub fn es_consistente(&self) -> bool {
        self.subtotal + self.igv + self.costo_envio - self.descuento == self.total
            && self.total >= Decimal::ZERO
    }
}

/// Compute order totals from priced lines.
///
/// IGV is charged on the merchandise subtotal. The discount is capped so
/// that it never exceeds `subtotal + igv`; shipping is never discounted.
#[must_use]
pub fn calcular_totales(
    lineas: &[LineaPedido],
    costo_envio: Decimal,
    descuento: Decimal,
) -> TotalesPedido {
    let subtotal: Decimal = lineas.iter().map(LineaPedido::subtotal).sum();
    let igv = round_money(subtotal * IGV_RATE);
    let costo_envio = round_money(costo_envio.max(Decimal::ZERO));
    let descuento = round_money(descuento.max(Decimal::ZERO).min(subtotal + igv));
    TotalesPedido {
        subtotal,
        igv,
        costo_envio,
        descuento,
        total: subtotal + igv + costo_envio - descuento,
    }
}

/// Human order number, e.g. `PED-20261015-000123`.
#[must_use]
pub fn numero_pedido(fecha: NaiveDate, secuencia: i64) -> String {
    format!("PED-{}-{secuencia:06}", fecha.format("%Y%m%d"))
}

/// An order state change that is not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no se puede pasar un pedido de '{desde}' a '{hacia}'")]
pub struct TransicionInvalida {
    pub desde: EstadoPedido,
    pub hacia: EstadoPedido,
}

/// Validate an order state change.
///
/// # Errors
///
/// Returns [`TransicionInvalida`] when `actual` cannot move to `nuevo`.
pub const fn transicionar(
    actual: EstadoPedido,
    nuevo: EstadoPedido,
) -> Result<EstadoPedido, TransicionInvalida> {
    if actual.puede_transicionar_a(nuevo) {
        Ok(nuevo)
    } else {
        Err(TransicionInvalida {
            desde: actual,
            hacia: nuevo,
        })
    }
}

/// Amount still owed on an order; only completed payments count.
#[must_use]
pub fn saldo_pendiente(total: Decimal, pagos: &[(EstadoPago, Decimal)]) -> Decimal {
    let pagado: Decimal = pagos
        .iter()
        .filter(|(estado, _)| *estado == EstadoPago::Completado)
        .map(|(_, monto)| *monto)
        .sum();
    (total - pagado).max(Decimal::ZERO)
}
