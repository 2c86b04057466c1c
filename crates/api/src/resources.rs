//! JSON views returned by the API.
//!
//! Each view wraps a stored entity (flattened) and adds the derived fields
//! clients would otherwise recompute: formatted prices, labels, overdue
//! state and balances.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;

use tienda_core::catalogo::{porcentaje_descuento, precio_con_variacion};
use tienda_core::credito::CuotaCredito;
use tienda_core::pedido::saldo_pendiente;
use tienda_core::reparto::{CotizacionEnvio, ZonaConfig, tiempo_entrega_texto, ventana_entrega};
use tienda_core::{EstadoCuota, format_soles};

use crate::models::catalogo::{Producto, ProductoDetalle, Variacion};
use crate::models::cliente::Cliente;
use crate::models::pedido::{Pago, Pedido, PedidoCompleto};

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ProductoResource {
    #[serde(flatten)]
    pub producto: Producto,
    pub precio_vigente: Decimal,
    pub precio_formateado: String,
    pub en_oferta: bool,
    pub porcentaje_descuento: Decimal,
    pub stock_bajo: bool,
}

impl From<Producto> for ProductoResource {
    fn from(producto: Producto) -> Self {
        let precio_vigente = producto.precio_vigente();
        Self {
            precio_formateado: format_soles(precio_vigente),
            en_oferta: producto.en_oferta(),
            porcentaje_descuento: porcentaje_descuento(producto.precio, producto.precio_oferta),
            stock_bajo: producto.stock_bajo(),
            precio_vigente,
            producto,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VariacionResource {
    #[serde(flatten)]
    pub variacion: Variacion,
    /// Product price (offer included) plus the variation surcharge.
    pub precio_final: Decimal,
    pub precio_formateado: String,
}

#[derive(Debug, Serialize)]
pub struct ProductoDetalleResource {
    #[serde(flatten)]
    pub producto: ProductoResource,
    pub categoria: Option<crate::models::catalogo::Categoria>,
    pub variaciones: Vec<VariacionResource>,
    pub imagenes: Vec<crate::models::catalogo::ProductoImagen>,
    pub grupos_adicionales: Vec<crate::models::catalogo::GrupoAdicional>,
}

impl From<ProductoDetalle> for ProductoDetalleResource {
    fn from(detalle: ProductoDetalle) -> Self {
        let base = detalle.producto.precio_vigente();
        let variaciones = detalle
            .variaciones
            .into_iter()
            .map(|variacion| {
                let precio_final = precio_con_variacion(base, variacion.precio_adicional);
                VariacionResource {
                    precio_formateado: format_soles(precio_final),
                    precio_final,
                    variacion,
                }
            })
            .collect();

        Self {
            producto: detalle.producto.into(),
            categoria: detalle.categoria,
            variaciones,
            imagenes: detalle.imagenes,
            grupos_adicionales: detalle.grupos,
        }
    }
}

// =============================================================================
// Customers
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ClienteResource {
    #[serde(flatten)]
    pub cliente: Cliente,
    pub nombre_completo: String,
    pub credito_disponible: Decimal,
    pub credito_disponible_formateado: String,
}

impl From<Cliente> for ClienteResource {
    fn from(cliente: Cliente) -> Self {
        let disponible = cliente.credito_disponible();
        Self {
            nombre_completo: cliente.nombre_completo(),
            credito_disponible: disponible,
            credito_disponible_formateado: format_soles(disponible),
            cliente,
        }
    }
}

// =============================================================================
// Delivery
// =============================================================================

#[derive(Debug, Serialize)]
pub struct CotizacionResource {
    #[serde(flatten)]
    pub cotizacion: CotizacionEnvio,
    pub costo_envio_formateado: String,
    pub tiempo_entrega_texto: String,
    pub es_gratis: bool,
    /// Local store time.
    pub entrega_desde: NaiveDateTime,
    pub entrega_hasta: NaiveDateTime,
}

impl CotizacionResource {
    #[must_use]
    pub fn new(cotizacion: CotizacionEnvio, momento: NaiveDateTime) -> Self {
        let (entrega_desde, entrega_hasta) = ventana_entrega(momento, &cotizacion);
        Self {
            costo_envio_formateado: cotizacion.costo_envio_formateado(),
            tiempo_entrega_texto: cotizacion.tiempo_entrega_texto(),
            es_gratis: cotizacion.es_gratis(),
            entrega_desde,
            entrega_hasta,
            cotizacion,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ZonaResource {
    #[serde(flatten)]
    pub config: ZonaConfig,
    pub costo_envio_formateado: String,
    pub tiempo_entrega_texto: String,
}

impl From<ZonaConfig> for ZonaResource {
    fn from(config: ZonaConfig) -> Self {
        Self {
            costo_envio_formateado: format_soles(config.zona.costo_envio_base),
            tiempo_entrega_texto: tiempo_entrega_texto(
                config.zona.tiempo_entrega_min,
                config.zona.tiempo_entrega_max,
            ),
            config,
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Serialize)]
pub struct PedidoResource {
    #[serde(flatten)]
    pub pedido: Pedido,
    pub estado_etiqueta: &'static str,
    pub subtotal_formateado: String,
    pub total_formateado: String,
}

impl From<Pedido> for PedidoResource {
    fn from(pedido: Pedido) -> Self {
        Self {
            estado_etiqueta: pedido.estado.etiqueta(),
            subtotal_formateado: format_soles(pedido.totales.subtotal),
            total_formateado: format_soles(pedido.totales.total),
            pedido,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PagoResource {
    #[serde(flatten)]
    pub pago: Pago,
    pub estado_etiqueta: &'static str,
    pub monto_formateado: String,
}

impl From<Pago> for PagoResource {
    fn from(pago: Pago) -> Self {
        Self {
            estado_etiqueta: pago.estado.etiqueta(),
            monto_formateado: format_soles(pago.monto),
            pago,
        }
    }
}

/// An installment as of a given local date.
#[derive(Debug, Serialize)]
pub struct CuotaResource {
    #[serde(flatten)]
    pub cuota: CuotaCredito,
    /// State derived for today; the stored state is only updated on payment.
    pub estado_actual: EstadoCuota,
    pub estado_etiqueta: &'static str,
    pub saldo: Decimal,
    pub esta_vencida: bool,
    pub dias_vencida: i64,
    /// Late fee accrued so far. Informational, never charged automatically.
    pub mora: Decimal,
    pub monto_formateado: String,
}

impl CuotaResource {
    #[must_use]
    pub fn new(cuota: CuotaCredito, hoy: NaiveDate, mora_diaria: Decimal) -> Self {
        let estado_actual = cuota.estado_en(hoy);
        Self {
            estado_actual,
            estado_etiqueta: estado_actual.etiqueta(),
            saldo: cuota.saldo(),
            esta_vencida: cuota.esta_vencida(hoy),
            dias_vencida: cuota.dias_vencida(hoy),
            mora: cuota.calcular_mora(hoy, mora_diaria),
            monto_formateado: format_soles(cuota.monto_cuota),
            cuota,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PedidoCompletoResource {
    #[serde(flatten)]
    pub pedido: PedidoResource,
    pub detalles: Vec<crate::models::pedido::DetallePedido>,
    pub historial: Vec<crate::models::pedido::HistorialEstado>,
    pub pagos: Vec<PagoResource>,
    pub cuotas: Vec<CuotaResource>,
    pub saldo_pendiente: Decimal,
    pub saldo_pendiente_formateado: String,
}

impl PedidoCompletoResource {
    #[must_use]
    pub fn new(completo: PedidoCompleto, hoy: NaiveDate, mora_diaria: Decimal) -> Self {
        let montos: Vec<_> = completo.pagos.iter().map(|p| (p.estado, p.monto)).collect();
        let saldo = saldo_pendiente(completo.pedido.totales.total, &montos);
        Self {
            pedido: completo.pedido.into(),
            detalles: completo.detalles,
            historial: completo.historial,
            pagos: completo.pagos.into_iter().map(Into::into).collect(),
            cuotas: completo
                .cuotas
                .into_iter()
                .map(|c| CuotaResource::new(c, hoy, mora_diaria))
                .collect(),
            saldo_pendiente: saldo,
            saldo_pendiente_formateado: format_soles(saldo),
        }
    }
}
