//! Order placement.
//!
//! Checkout runs in one transaction. The customer row is locked first, then
//! products and variations, then the coupon, so two concurrent checkouts for
//! the same customer or stock serialize instead of overselling. Cancellation
//! and installment payments take the order row and then the same sequence.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use tienda_core::catalogo::es_stock_suficiente;
use tienda_core::credito::{INTERVALO_DIAS_DEFECTO, generar_cuotas, validar_credito};
use tienda_core::pedido::{AdicionalLinea, LineaPedido, calcular_totales, numero_pedido};
use tienda_core::reparto::{CotizacionEnvio, SolicitudEnvio, cotizar_mejor, ventana_entrega};
use tienda_core::{
    EstadoPedido, GrupoAdicionalId, ProductoId, TipoMovimiento, TipoPago, VariacionId,
};

use super::inventario::registrar_movimiento;
use crate::db::inventario::Existencia;
use crate::db::pedidos::{NuevoDetalle, NuevoPedido};
use crate::db::{PedidoRepository, clientes, cuotas, cupones, pedidos, productos};
use crate::error::{AppError, ValidationErrors};
use crate::models::catalogo::{GrupoAdicional, Producto, Variacion};
use crate::models::pedido::{CheckoutInput, DetalleAdicional, LineaInput, PedidoCompleto};
use crate::state::AppState;

const COMENTARIO_CREACION: &str = "Pedido creado";

/// An input line priced against locked catalog rows.
#[derive(Debug, Clone)]
struct LineaPreparada {
    existencia: Existencia,
    linea: LineaPedido,
    detalle: NuevoDetalle,
}

pub struct CheckoutService<'a> {
    state: &'a AppState,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Place an order.
    ///
    /// Without `direccion_id` the order is a store pickup with no shipping
    /// cost. Credit orders consume the customer's credit line and get an
    /// installment schedule starting one interval after today.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown customer and a validation error for
    /// anything the order cannot be placed with: unknown or inactive
    /// products, missing stock, invalid additionals, an address outside
    /// every zone, a rejected coupon or insufficient credit.
    #[instrument(skip(self, input), fields(cliente_id = %input.cliente_id, lineas = input.lineas.len()))]
    pub async fn procesar(&self, input: &CheckoutInput) -> Result<PedidoCompleto, AppError> {
        input.validate()?;

        let config = self.state.config();
        let ahora = config.ahora_local();
        let hoy = ahora.date();
        let mut tx = self.state.pool().begin().await?;

        let cliente = clientes::lock(&mut tx, input.cliente_id)
            .await?
            .ok_or_else(|| AppError::not_found("cliente", input.cliente_id))?;
        if !cliente.activo {
            return Err(AppError::invalid("cliente_id", "el cliente no está activo"));
        }

        let direccion = match input.direccion_id {
            Some(id) => {
                let direccion = clientes::get_direccion(&mut tx, id)
                    .await?
                    .filter(|d| d.cliente_id == cliente.id)
                    .ok_or_else(|| {
                        AppError::invalid("direccion_id", "la dirección no pertenece al cliente")
                    })?;
                Some(direccion)
            }
            None => None,
        };

        // Catalog rows, locked in id order.
        let mut producto_ids: Vec<ProductoId> =
            input.lineas.iter().map(|l| l.producto_id).collect();
        producto_ids.sort_unstable();
        producto_ids.dedup();
        let mut variacion_ids: Vec<VariacionId> =
            input.lineas.iter().filter_map(|l| l.variacion_id).collect();
        variacion_ids.sort_unstable();
        variacion_ids.dedup();

        let catalogo = productos::lock_productos(&mut tx, &producto_ids).await?;
        let variaciones = productos::lock_variaciones(&mut tx, &variacion_ids).await?;
        let grupos = productos::grupos_por_producto(&mut tx, &producto_ids).await?;

        let preparadas = preparar_lineas(&input.lineas, &catalogo, &variaciones, &grupos)
            .map_err(AppError::Validation)?;
        let lineas: Vec<LineaPedido> = preparadas.iter().map(|p| p.linea.clone()).collect();
        let subtotal: Decimal = lineas.iter().map(LineaPedido::subtotal).sum();

        // Shipping.
        let cotizacion: Option<CotizacionEnvio> = match &direccion {
            Some(direccion) => {
                let zonas = self.state.zonas().todas(self.state.pool()).await?;
                let solicitud = SolicitudEnvio {
                    distrito_id: Some(direccion.distrito_id),
                    coordenadas: direccion.coordenadas,
                    subtotal,
                    momento: ahora,
                };
                Some(cotizar_mejor(&zonas, &solicitud)?)
            }
            None => None,
        };
        let costo_envio = cotizacion.as_ref().map_or(Decimal::ZERO, |c| c.costo_envio);

        // Coupon.
        let cupon = match input.codigo_cupon() {
            Some(codigo) => {
                let cupon = cupones::lock_por_codigo(&mut tx, &codigo)
                    .await?
                    .ok_or_else(|| AppError::invalid("cupon", "el cupón no existe"))?;
                cupon.puede_usarse(Utc::now(), subtotal)?;
                Some(cupon)
            }
            None => None,
        };
        let descuento = cupon
            .as_ref()
            .map_or(Decimal::ZERO, |c| c.calcular_descuento(subtotal));

        let totales = calcular_totales(&lineas, costo_envio, descuento);

        // Credit.
        let plan = if input.tipo_pago == TipoPago::Credito {
            let numero_cuotas = input.numero_cuotas.unwrap_or(1);
            let usado = validar_credito(cliente.limite_credito, cliente.credito_usado, totales.total)?;
            let plan = generar_cuotas(
                totales.total,
                numero_cuotas,
                hoy + Duration::days(INTERVALO_DIAS_DEFECTO),
                INTERVALO_DIAS_DEFECTO,
            )?;
            clientes::set_credito_usado(&mut tx, cliente.id, usado).await?;
            Some(plan)
        } else {
            None
        };

        let secuencia = pedidos::siguiente_secuencia(&mut tx).await?;
        let numero = numero_pedido(hoy, secuencia);
        let fecha_entrega_estimada = cotizacion
            .as_ref()
            .map(|c| config.a_utc(ventana_entrega(ahora, c).1));

        let pedido = pedidos::insertar(
            &mut tx,
            &NuevoPedido {
                numero,
                cliente_id: cliente.id,
                direccion_id: direccion.as_ref().map(|d| d.id),
                zona_reparto_id: cotizacion.as_ref().map(|c| c.zona_reparto_id),
                cupon_id: cupon.as_ref().map(|c| c.id),
                tipo_pago: input.tipo_pago,
                metodo_pago: input.metodo_pago,
                totales,
                numero_cuotas: plan.as_ref().and(input.numero_cuotas),
                observaciones: crate::models::texto_opcional(input.observaciones.as_deref()),
                fecha_entrega_estimada,
            },
        )
        .await?;

        let detalles: Vec<NuevoDetalle> = preparadas.iter().map(|p| p.detalle.clone()).collect();
        pedidos::insertar_detalles(&mut tx, pedido.id, &detalles).await?;
        pedidos::registrar_historial(
            &mut tx,
            pedido.id,
            None,
            EstadoPedido::Pendiente,
            Some(COMENTARIO_CREACION),
        )
        .await?;

        if let Some(cupon) = &cupon {
            cupones::registrar_uso(&mut tx, cupon.id, pedido.id, cliente.id, totales.descuento)
                .await?;
        }
        if let Some(plan) = &plan {
            cuotas::insertar_plan(&mut tx, pedido.id, plan).await?;
        }

        let motivo = format!("Pedido {}", pedido.numero);
        for (i, preparada) in preparadas.iter().enumerate() {
            registrar_movimiento(
                &mut tx,
                preparada.existencia,
                Some(pedido.id),
                TipoMovimiento::Salida,
                preparada.linea.cantidad,
                Some(&motivo),
            )
            .await
            .map_err(|err| match err {
                AppError::Validation(_) => AppError::invalid(
                    &format!("lineas.{i}.cantidad"),
                    "stock insuficiente",
                ),
                other => other,
            })?;
        }

        tx.commit().await?;

        info!(
            pedido_id = %pedido.id,
            numero = %pedido.numero,
            total = %pedido.totales.total,
            tipo_pago = %pedido.tipo_pago,
            "order placed"
        );

        PedidoRepository::new(self.state.pool())
            .get_completo(pedido.id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("pedido {} not found after commit", pedido.id)))
    }
}

/// Price every input line against the locked catalog rows.
///
/// Collects every problem instead of stopping at the first, keyed by line
/// position (`lineas.2.cantidad`). Stock is checked against the combined
/// demand of all lines drawing from the same product or variation.
fn preparar_lineas(
    lineas: &[LineaInput],
    catalogo: &HashMap<ProductoId, Producto>,
    variaciones: &HashMap<VariacionId, Variacion>,
    grupos: &HashMap<ProductoId, Vec<GrupoAdicional>>,
) -> Result<Vec<LineaPreparada>, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut preparadas = Vec::with_capacity(lineas.len());
    let mut demanda: HashMap<Existencia, (usize, i32)> = HashMap::new();

    for (i, entrada) in lineas.iter().enumerate() {
        let Some(producto) = catalogo.get(&entrada.producto_id).filter(|p| p.activo) else {
            errors.add(&format!("lineas.{i}.producto_id"), "el producto no está disponible");
            continue;
        };

        let variacion = match entrada.variacion_id {
            Some(id) => match variaciones
                .get(&id)
                .filter(|v| v.producto_id == producto.id && v.activo)
            {
                Some(variacion) => Some(variacion),
                None => {
                    errors.add(
                        &format!("lineas.{i}.variacion_id"),
                        "la variación no está disponible para este producto",
                    );
                    continue;
                }
            },
            None => None,
        };

        let grupos_producto = grupos.get(&producto.id).map_or(&[][..], Vec::as_slice);
        let Some(adicionales) = elegir_adicionales(i, entrada, grupos_producto, &mut errors) else {
            continue;
        };

        let existencia = Existencia {
            producto_id: producto.id,
            variacion_id: variacion.map(|v| v.id),
        };
        let acumulado = demanda.entry(existencia).or_insert((i, 0));
        let Some(demandado) = acumulado.1.checked_add(entrada.cantidad) else {
            errors.add(&format!("lineas.{i}.cantidad"), "cantidad fuera de rango");
            continue;
        };
        acumulado.1 = demandado;
        let stock = variacion.map_or(producto.stock, |v| v.stock);
        if !es_stock_suficiente(stock, acumulado.1) {
            errors.add(
                &format!("lineas.{}.cantidad", acumulado.0),
                format!("stock insuficiente para {}: disponible {stock}", producto.nombre),
            );
            continue;
        }

        let linea = LineaPedido {
            precio_unitario: producto.precio_vigente(),
            recargo_variacion: variacion.map_or(Decimal::ZERO, |v| v.precio_adicional),
            adicionales: adicionales
                .iter()
                .map(|a| AdicionalLinea {
                    precio_unitario: a.precio_unitario,
                    cantidad: a.cantidad,
                })
                .collect(),
            cantidad: entrada.cantidad,
        };
        let detalle = NuevoDetalle {
            producto_id: producto.id,
            variacion_id: existencia.variacion_id,
            nombre_producto: producto.nombre.clone(),
            nombre_variacion: variacion.map(|v| v.nombre.clone()),
            cantidad: entrada.cantidad,
            precio_unitario: linea.precio_final_unitario(),
            subtotal: linea.subtotal(),
            adicionales,
        };
        preparadas.push(LineaPreparada {
            existencia,
            linea,
            detalle,
        });
    }

    if errors.is_empty() {
        Ok(preparadas)
    } else {
        Err(errors)
    }
}

/// Resolve a line's additionals against its product's groups and check each
/// group's selection rules. Returns `None` after recording errors.
fn elegir_adicionales(
    i: usize,
    entrada: &LineaInput,
    grupos: &[GrupoAdicional],
    errors: &mut ValidationErrors,
) -> Option<Vec<DetalleAdicional>> {
    let mut elegidos = Vec::with_capacity(entrada.adicionales.len());
    let mut por_grupo: HashMap<GrupoAdicionalId, i32> = HashMap::new();
    let mut valido = true;

    for (j, pedido) in entrada.adicionales.iter().enumerate() {
        let encontrado = grupos.iter().find_map(|g| {
            g.adicionales
                .iter()
                .find(|a| a.id == pedido.adicional_id)
                .map(|a| (g.id, a))
        });
        match encontrado {
            Some((grupo_id, adicional)) => {
                *por_grupo.entry(grupo_id).or_default() += 1;
                elegidos.push(DetalleAdicional {
                    adicional_id: Some(adicional.id),
                    nombre: adicional.nombre.clone(),
                    precio_unitario: adicional.precio,
                    cantidad: pedido.cantidad,
                });
            }
            None => {
                errors.add(
                    &format!("lineas.{i}.adicionales.{j}.adicional_id"),
                    "el adicional no está disponible para este producto",
                );
                valido = false;
            }
        }
    }

    for grupo in grupos {
        let seleccionados = por_grupo.get(&grupo.id).copied().unwrap_or(0);
        if let Err(err) = grupo.regla().validar_seleccion(seleccionados) {
            errors.add(&format!("lineas.{i}.adicionales"), err.to_string());
            valido = false;
        }
    }

    valido.then_some(elegidos)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::catalogo::Adicional;
    use crate::models::pedido::AdicionalInput;
    use rust_decimal_macros::dec;
    use tienda_core::{AdicionalId, CategoriaId};

    fn producto(id: i32, precio: Decimal, oferta: Option<Decimal>, stock: i32) -> Producto {
        Producto {
            id: ProductoId::new(id),
            categoria_id: CategoriaId::new(1),
            nombre: format!("Producto {id}"),
            slug: format!("producto-{id}"),
            sku: None,
            descripcion: None,
            precio,
            precio_oferta: oferta,
            stock,
            stock_minimo: 0,
            imagen_principal: None,
            destacado: false,
            activo: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn salsas(producto_id: i32, obligatorio: bool) -> HashMap<ProductoId, Vec<GrupoAdicional>> {
        let grupo_id = GrupoAdicionalId::new(1);
        let adicional = |id: i32, precio: Decimal| Adicional {
            id: AdicionalId::new(id),
            grupo_adicional_id: grupo_id,
            nombre: format!("Salsa {id}"),
            precio,
            orden: id,
            activo: true,
        };
        HashMap::from([(
            ProductoId::new(producto_id),
            vec![GrupoAdicional {
                id: grupo_id,
                nombre: "Salsas".to_owned(),
                descripcion: None,
                seleccion_minima: 1,
                seleccion_maxima: Some(2),
                obligatorio,
                orden: 0,
                activo: true,
                adicionales: vec![
                    adicional(10, dec!(1.50)),
                    adicional(11, dec!(2.00)),
                    adicional(12, Decimal::ZERO),
                ],
            }],
        )])
    }

    fn linea(producto_id: i32, cantidad: i32) -> LineaInput {
        LineaInput {
            producto_id: ProductoId::new(producto_id),
            variacion_id: None,
            cantidad,
            adicionales: Vec::new(),
        }
    }

    fn con_adicionales(mut linea: LineaInput, ids: &[i32]) -> LineaInput {
        linea.adicionales = ids
            .iter()
            .map(|id| AdicionalInput {
                adicional_id: AdicionalId::new(*id),
                cantidad: 1,
            })
            .collect();
        linea
    }

    #[test]
    fn test_prices_line_with_offer_variation_and_additionals() {
        let catalogo = HashMap::from([(ProductoId::new(1), producto(1, dec!(30), Some(dec!(25)), 10))]);
        let variaciones = HashMap::from([(
            VariacionId::new(5),
            Variacion {
                id: VariacionId::new(5),
                producto_id: ProductoId::new(1),
                nombre: "Familiar".to_owned(),
                sku: None,
                precio_adicional: dec!(8),
                stock: 4,
                activo: true,
            },
        )]);
        let mut entrada = con_adicionales(linea(1, 2), &[10, 11]);
        entrada.variacion_id = Some(VariacionId::new(5));

        let preparadas =
            preparar_lineas(&[entrada], &catalogo, &variaciones, &salsas(1, true)).unwrap();

        let detalle = &preparadas[0].detalle;
        assert_eq!(detalle.precio_unitario, dec!(36.50));
        assert_eq!(detalle.subtotal, dec!(73.00));
        assert_eq!(detalle.nombre_variacion.as_deref(), Some("Familiar"));
        assert_eq!(detalle.adicionales.len(), 2);
        assert_eq!(preparadas[0].existencia.variacion_id, Some(VariacionId::new(5)));
    }

    #[test]
    fn test_rejects_unknown_and_inactive_products_by_position() {
        let mut inactivo = producto(2, dec!(10), None, 10);
        inactivo.activo = false;
        let catalogo = HashMap::from([(ProductoId::new(2), inactivo)]);

        let errors = preparar_lineas(
            &[linea(1, 1), linea(2, 1)],
            &catalogo,
            &HashMap::new(),
            &HashMap::new(),
        )
        .unwrap_err();

        assert!(errors.get("lineas.0.producto_id").is_some());
        assert!(errors.get("lineas.1.producto_id").is_some());
    }

    #[test]
    fn test_stock_checked_against_combined_demand() {
        let catalogo = HashMap::from([(ProductoId::new(1), producto(1, dec!(10), None, 5))]);

        let errors = preparar_lineas(
            &[linea(1, 3), linea(1, 3)],
            &catalogo,
            &HashMap::new(),
            &HashMap::new(),
        )
        .unwrap_err();

        assert!(errors.get("lineas.0.cantidad").is_some());
        assert!(errors.get("lineas.1.cantidad").is_none());
    }

    #[test]
    fn test_combined_demand_overflow_is_a_line_error() {
        let catalogo = HashMap::from([(ProductoId::new(1), producto(1, dec!(10), None, 5))]);

        let errors = preparar_lineas(
            &[linea(1, i32::MAX), linea(1, i32::MAX)],
            &catalogo,
            &HashMap::new(),
            &HashMap::new(),
        )
        .unwrap_err();

        assert!(errors.get("lineas.0.cantidad").is_some());
        assert_eq!(
            errors.get("lineas.1.cantidad").unwrap(),
            ["cantidad fuera de rango"]
        );
    }

    #[test]
    fn test_variation_must_belong_to_product() {
        let catalogo = HashMap::from([(ProductoId::new(1), producto(1, dec!(10), None, 5))]);
        let variaciones = HashMap::from([(
            VariacionId::new(9),
            Variacion {
                id: VariacionId::new(9),
                producto_id: ProductoId::new(2),
                nombre: "Otra".to_owned(),
                sku: None,
                precio_adicional: Decimal::ZERO,
                stock: 5,
                activo: true,
            },
        )]);
        let mut entrada = linea(1, 1);
        entrada.variacion_id = Some(VariacionId::new(9));

        let errors =
            preparar_lineas(&[entrada], &catalogo, &variaciones, &HashMap::new()).unwrap_err();
        assert!(errors.get("lineas.0.variacion_id").is_some());
    }

    #[test]
    fn test_additional_group_rules() {
        let catalogo = HashMap::from([(ProductoId::new(1), producto(1, dec!(10), None, 5))]);

        let sin_salsa =
            preparar_lineas(&[linea(1, 1)], &catalogo, &HashMap::new(), &salsas(1, true))
                .unwrap_err();
        assert!(sin_salsa.get("lineas.0.adicionales").is_some());

        let demasiadas = preparar_lineas(
            &[con_adicionales(linea(1, 1), &[10, 11, 12])],
            &catalogo,
            &HashMap::new(),
            &salsas(1, true),
        )
        .unwrap_err();
        assert!(demasiadas.get("lineas.0.adicionales").is_some());

        let ajena = preparar_lineas(
            &[con_adicionales(linea(1, 1), &[99])],
            &catalogo,
            &HashMap::new(),
            &salsas(1, false),
        )
        .unwrap_err();
        assert!(ajena.get("lineas.0.adicionales.0.adicional_id").is_some());

        let opcional =
            preparar_lineas(&[linea(1, 1)], &catalogo, &HashMap::new(), &salsas(1, false));
        assert!(opcional.is_ok());
    }
}
