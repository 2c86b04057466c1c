//! Orders, payments and inventory movements.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tienda_core::credito::{CuotaCredito, MAX_CUOTAS};
use tienda_core::inventario::MovimientoInventario;
use tienda_core::pedido::TotalesPedido;
use tienda_core::{
    AdicionalId, ClienteId, CuotaCreditoId, CuponId, DetallePedidoId, DireccionId, EstadoPago,
    EstadoPedido, MetodoPago, MovimientoInventarioId, PagoId, PedidoId, ProductoId, TipoMovimiento,
    TipoPago, VariacionId, ZonaRepartoId,
};

use super::catalogo::validar_monto;
use super::texto_opcional;
use crate::error::{AppError, ValidationErrors};

/// Most lines accepted in one checkout.
pub const MAX_LINEAS: usize = 50;

/// Most units of one product or additional on a single line.
pub const MAX_CANTIDAD_LINEA: i32 = 999;

/// An order header.
#[derive(Debug, Clone, Serialize)]
pub struct Pedido {
    pub id: PedidoId,
    pub numero: String,
    pub cliente_id: ClienteId,
    pub direccion_id: Option<DireccionId>,
    pub zona_reparto_id: Option<ZonaRepartoId>,
    pub cupon_id: Option<CuponId>,
    pub estado: EstadoPedido,
    pub tipo_pago: TipoPago,
    pub metodo_pago: MetodoPago,
    #[serde(flatten)]
    pub totales: TotalesPedido,
    pub numero_cuotas: Option<i32>,
    pub observaciones: Option<String>,
    pub fecha_entrega_estimada: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An additional as sold on an order line, with its price frozen.
#[derive(Debug, Clone, Serialize)]
pub struct DetalleAdicional {
    pub adicional_id: Option<AdicionalId>,
    pub nombre: String,
    pub precio_unitario: Decimal,
    pub cantidad: i32,
}

/// An order line.
///
/// `precio_unitario` already includes the variation surcharge and the
/// additionals, so `subtotal = precio_unitario * cantidad`.
#[derive(Debug, Clone, Serialize)]
pub struct DetallePedido {
    pub id: DetallePedidoId,
    pub pedido_id: PedidoId,
    pub producto_id: ProductoId,
    pub variacion_id: Option<VariacionId>,
    pub nombre_producto: String,
    pub nombre_variacion: Option<String>,
    pub cantidad: i32,
    pub precio_unitario: Decimal,
    pub subtotal: Decimal,
    pub adicionales: Vec<DetalleAdicional>,
}

/// One entry of an order's state history.
#[derive(Debug, Clone, Serialize)]
pub struct HistorialEstado {
    pub estado_anterior: Option<EstadoPedido>,
    pub estado_nuevo: EstadoPedido,
    pub comentario: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A payment against an order or one of its installments.
#[derive(Debug, Clone, Serialize)]
pub struct Pago {
    pub id: PagoId,
    pub pedido_id: PedidoId,
    pub cuota_credito_id: Option<CuotaCreditoId>,
    pub metodo: MetodoPago,
    pub monto: Decimal,
    pub estado: EstadoPago,
    pub referencia: Option<String>,
    pub fecha_pago: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A stored inventory movement.
#[derive(Debug, Clone, Serialize)]
pub struct MovimientoRegistrado {
    pub id: MovimientoInventarioId,
    pub producto_id: ProductoId,
    pub variacion_id: Option<VariacionId>,
    pub pedido_id: Option<PedidoId>,
    #[serde(flatten)]
    pub movimiento: MovimientoInventario,
    pub motivo: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An order with its lines, history, payments and installments.
#[derive(Debug, Clone, Serialize)]
pub struct PedidoCompleto {
    pub pedido: Pedido,
    pub detalles: Vec<DetallePedido>,
    pub historial: Vec<HistorialEstado>,
    pub pagos: Vec<Pago>,
    pub cuotas: Vec<CuotaCredito>,
}

// =============================================================================
// Inputs
// =============================================================================

/// An additional requested on a checkout line.
#[derive(Debug, Clone, Deserialize)]
pub struct AdicionalInput {
    pub adicional_id: AdicionalId,
    #[serde(default = "una_unidad")]
    pub cantidad: i32,
}

const fn una_unidad() -> i32 {
    1
}

/// A checkout line.
#[derive(Debug, Clone, Deserialize)]
pub struct LineaInput {
    pub producto_id: ProductoId,
    pub variacion_id: Option<VariacionId>,
    pub cantidad: i32,
    #[serde(default)]
    pub adicionales: Vec<AdicionalInput>,
}

/// Body of `POST /api/pedidos`.
///
/// Without `direccion_id` the order is picked up at the store and ships
/// for free.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutInput {
    pub cliente_id: ClienteId,
    pub direccion_id: Option<DireccionId>,
    pub lineas: Vec<LineaInput>,
    pub metodo_pago: MetodoPago,
    #[serde(default)]
    pub tipo_pago: TipoPago,
    pub numero_cuotas: Option<i32>,
    pub cupon: Option<String>,
    pub observaciones: Option<String>,
}

impl CheckoutInput {
    /// Validate the request shape. Stock, credit and coupon rules are
    /// checked against the database by the checkout service.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] listing every invalid field.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();

        if self.lineas.is_empty() {
            errors.add("lineas", "el pedido debe tener al menos un producto");
        }
        errors.check(
            self.lineas.len() <= MAX_LINEAS,
            "lineas",
            format!("el pedido admite como máximo {MAX_LINEAS} líneas"),
        );
        for (i, linea) in self.lineas.iter().enumerate() {
            if linea.cantidad <= 0 {
                errors.add(&format!("lineas.{i}.cantidad"), "la cantidad debe ser mayor a cero");
            }
            errors.check(
                linea.cantidad <= MAX_CANTIDAD_LINEA,
                &format!("lineas.{i}.cantidad"),
                format!("la cantidad no puede superar {MAX_CANTIDAD_LINEA}"),
            );
            let mut vistos = HashSet::new();
            for (j, adicional) in linea.adicionales.iter().enumerate() {
                if adicional.cantidad <= 0 {
                    errors.add(
                        &format!("lineas.{i}.adicionales.{j}.cantidad"),
                        "la cantidad debe ser mayor a cero",
                    );
                }
                errors.check(
                    adicional.cantidad <= MAX_CANTIDAD_LINEA,
                    &format!("lineas.{i}.adicionales.{j}.cantidad"),
                    format!("la cantidad no puede superar {MAX_CANTIDAD_LINEA}"),
                );
                if !vistos.insert(adicional.adicional_id) {
                    errors.add(
                        &format!("lineas.{i}.adicionales.{j}.adicional_id"),
                        "el adicional está repetido",
                    );
                }
            }
        }

        let es_credito = self.tipo_pago == TipoPago::Credito;
        errors.check(
            es_credito == (self.metodo_pago == MetodoPago::Credito),
            "tipo_pago",
            "el pago a crédito debe usar el método crédito",
        );
        match (es_credito, self.numero_cuotas) {
            (true, None) => errors.add("numero_cuotas", "indique el número de cuotas"),
            (true, Some(n)) if !(1..=MAX_CUOTAS).contains(&n) => errors.add(
                "numero_cuotas",
                format!("el número de cuotas debe estar entre 1 y {MAX_CUOTAS}"),
            ),
            (false, Some(_)) => {
                errors.add("numero_cuotas", "solo los pedidos a crédito tienen cuotas");
            }
            _ => {}
        }

        if let Some(observaciones) = &self.observaciones {
            errors.check(
                observaciones.chars().count() <= 1000,
                "observaciones",
                "las observaciones no pueden superar 1000 caracteres",
            );
        }

        errors.into_result()
    }

    /// Normalized coupon code, `None` when blank.
    #[must_use]
    pub fn codigo_cupon(&self) -> Option<String> {
        texto_opcional(self.cupon.as_deref()).map(|c| tienda_core::cupon::Cupon::normalizar_codigo(&c))
    }
}

/// Body of `PATCH /api/pedidos/{id}/estado`.
#[derive(Debug, Clone, Deserialize)]
pub struct CambioEstadoInput {
    pub estado: EstadoPedido,
    pub comentario: Option<String>,
}

/// Body of `POST /api/pedidos/{id}/pagos`.
#[derive(Debug, Clone, Deserialize)]
pub struct PagoInput {
    pub metodo: MetodoPago,
    pub monto: Decimal,
    #[serde(default = "pago_completado")]
    pub estado: EstadoPago,
    pub referencia: Option<String>,
}

const fn pago_completado() -> EstadoPago {
    EstadoPago::Completado
}

impl PagoInput {
    /// Validate the input.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] listing every invalid field.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();
        validar_pago(&mut errors, self.metodo, Some(self.monto));
        errors.check(
            matches!(self.estado, EstadoPago::Pendiente | EstadoPago::Completado),
            "estado",
            "un pago nuevo solo puede estar pendiente o completado",
        );
        errors.into_result()
    }
}

/// Body of `POST /api/cuotas/{id}/pagar`.
#[derive(Debug, Clone, Deserialize)]
pub struct PagoCuotaInput {
    /// Defaults to the installment's outstanding balance.
    pub monto: Option<Decimal>,
    pub metodo: MetodoPago,
    pub referencia: Option<String>,
}

impl PagoCuotaInput {
    /// Validate the input.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] listing every invalid field.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();
        validar_pago(&mut errors, self.metodo, self.monto);
        errors.into_result()
    }
}

/// Body of `POST /api/inventario/movimientos`.
#[derive(Debug, Clone, Deserialize)]
pub struct MovimientoInput {
    pub producto_id: ProductoId,
    pub variacion_id: Option<VariacionId>,
    pub tipo: TipoMovimiento,
    /// Positive for `entrada`, `salida` and `devolucion`; signed for `ajuste`.
    pub cantidad: i32,
    pub motivo: Option<String>,
}

impl MovimientoInput {
    /// Validate the input.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] listing every invalid field.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();
        errors.check(
            self.tipo != TipoMovimiento::Ajuste || self.motivo().is_some(),
            "motivo",
            "los ajustes requieren un motivo",
        );
        if let Some(motivo) = &self.motivo {
            errors.check(
                motivo.chars().count() <= 255,
                "motivo",
                "el motivo no puede superar 255 caracteres",
            );
        }
        errors.into_result()
    }

    #[must_use]
    pub fn motivo(&self) -> Option<String> {
        texto_opcional(self.motivo.as_deref())
    }
}

fn validar_pago(errors: &mut ValidationErrors, metodo: MetodoPago, monto: Option<Decimal>) {
    errors.check(
        metodo != MetodoPago::Credito,
        "metodo",
        "el crédito no es un medio de pago",
    );
    if let Some(monto) = monto {
        errors.check(monto > Decimal::ZERO, "monto", "el monto debe ser mayor a cero");
        validar_monto(errors, "monto", monto);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn checkout() -> CheckoutInput {
        CheckoutInput {
            cliente_id: ClienteId::new(1),
            direccion_id: Some(DireccionId::new(1)),
            lineas: vec![LineaInput {
                producto_id: ProductoId::new(1),
                variacion_id: None,
                cantidad: 2,
                adicionales: vec![AdicionalInput {
                    adicional_id: AdicionalId::new(3),
                    cantidad: 1,
                }],
            }],
            metodo_pago: MetodoPago::Yape,
            tipo_pago: TipoPago::Contado,
            numero_cuotas: None,
            cupon: Some(" promo5 ".to_string()),
            observaciones: None,
        }
    }

    fn validation(err: AppError) -> ValidationErrors {
        match err {
            AppError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_checkout_valid() {
        let input = checkout();
        assert!(input.validate().is_ok());
        assert_eq!(input.codigo_cupon().as_deref(), Some("PROMO5"));
    }

    #[test]
    fn test_checkout_requires_lines() {
        let mut input = checkout();
        input.lineas.clear();
        assert!(validation(input.validate().unwrap_err()).get("lineas").is_some());
    }

    #[test]
    fn test_checkout_line_errors_are_indexed() {
        let mut input = checkout();
        input.lineas[0].cantidad = 0;
        input.lineas[0].adicionales.push(AdicionalInput {
            adicional_id: AdicionalId::new(3),
            cantidad: 1,
        });
        let errors = validation(input.validate().unwrap_err());
        assert!(errors.get("lineas.0.cantidad").is_some());
        assert_eq!(
            errors.get("lineas.0.adicionales.1.adicional_id").unwrap(),
            ["el adicional está repetido"]
        );
    }

    #[test]
    fn test_checkout_caps_line_quantities() {
        let mut input = checkout();
        input.lineas[0].cantidad = MAX_CANTIDAD_LINEA;
        assert!(input.validate().is_ok());

        input.lineas[0].cantidad = i32::MAX;
        input.lineas[0].adicionales[0].cantidad = MAX_CANTIDAD_LINEA + 1;
        let errors = validation(input.validate().unwrap_err());
        assert_eq!(
            errors.get("lineas.0.cantidad").unwrap(),
            [format!("la cantidad no puede superar {MAX_CANTIDAD_LINEA}")]
        );
        assert!(errors.get("lineas.0.adicionales.0.cantidad").is_some());
    }

    #[test]
    fn test_credit_requires_installments() {
        let mut input = checkout();
        input.tipo_pago = TipoPago::Credito;
        input.metodo_pago = MetodoPago::Credito;
        assert!(validation(input.validate().unwrap_err()).get("numero_cuotas").is_some());

        input.numero_cuotas = Some(25);
        assert!(input.validate().is_err());

        input.numero_cuotas = Some(3);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_payment_type_matches_method() {
        let mut input = checkout();
        input.metodo_pago = MetodoPago::Credito;
        assert!(validation(input.validate().unwrap_err()).get("tipo_pago").is_some());

        let mut input = checkout();
        input.numero_cuotas = Some(2);
        assert!(validation(input.validate().unwrap_err()).get("numero_cuotas").is_some());
    }

    #[test]
    fn test_pago_input() {
        let pago = PagoInput {
            metodo: MetodoPago::Transferencia,
            monto: dec!(50),
            estado: EstadoPago::Completado,
            referencia: None,
        };
        assert!(pago.validate().is_ok());

        let pago = PagoInput {
            metodo: MetodoPago::Credito,
            monto: dec!(0),
            estado: EstadoPago::Reembolsado,
            referencia: None,
        };
        let errors = validation(pago.validate().unwrap_err());
        assert!(errors.get("metodo").is_some());
        assert!(errors.get("monto").is_some());
        assert!(errors.get("estado").is_some());
    }

    #[test]
    fn test_ajuste_requires_reason() {
        let input = MovimientoInput {
            producto_id: ProductoId::new(1),
            variacion_id: None,
            tipo: TipoMovimiento::Ajuste,
            cantidad: -2,
            motivo: Some("  ".to_string()),
        };
        assert!(validation(input.validate().unwrap_err()).get("motivo").is_some());
    }
}
