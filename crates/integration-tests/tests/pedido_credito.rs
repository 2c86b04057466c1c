//! One order followed from pricing to its last installment.
//!
//! Prices a mixed cart with a coupon, finances it on the customer's credit
//! line, pays the installments down and walks the product's stock ledger,
//! checking the money and stock identities hold at every step.

#![allow(clippy::unwrap_used)]

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tienda_core::credito::{
    CreditoRechazo, CuotaCredito, CuotaProgramada, INTERVALO_DIAS_DEFECTO, generar_cuotas,
    liberar_credito, validar_credito,
};
use tienda_core::cupon::{Cupon, CuponRechazo};
use tienda_core::inventario::{MovimientoInventario, MovimientoRechazo};
use tienda_core::pedido::{
    AdicionalLinea, LineaPedido, calcular_totales, numero_pedido, saldo_pendiente, transicionar,
};
use tienda_core::{
    CuotaCreditoId, CuponId, EstadoCuota, EstadoPago, EstadoPedido, PedidoId, TipoCupon,
    TipoMovimiento,
};

fn fecha(mes: u32, dia: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, mes, dia).unwrap()
}

/// Two family pizzas with extra cheese and three bottles of chicha.
fn carrito() -> Vec<LineaPedido> {
    vec![
        LineaPedido {
            precio_unitario: dec!(32.90),
            recargo_variacion: dec!(5.00),
            adicionales: vec![AdicionalLinea {
                precio_unitario: dec!(3.50),
                cantidad: 1,
            }],
            cantidad: 2,
        },
        LineaPedido {
            precio_unitario: dec!(8.50),
            recargo_variacion: Decimal::ZERO,
            adicionales: Vec::new(),
            cantidad: 3,
        },
    ]
}

fn bienvenida() -> Cupon {
    Cupon {
        id: CuponId::new(1),
        codigo: "BIENVENIDA10".to_string(),
        tipo: TipoCupon::Porcentaje,
        valor: dec!(10),
        monto_minimo: Some(dec!(40)),
        descuento_maximo: Some(dec!(15)),
        fecha_inicio: None,
        fecha_fin: Some(Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap()),
        limite_uso: Some(100),
        usos: 12,
        activo: true,
    }
}

fn almacenar(pedido: PedidoId, cuotas: &[CuotaProgramada]) -> Vec<CuotaCredito> {
    cuotas
        .iter()
        .zip(1..)
        .map(|(programada, id)| CuotaCredito {
            id: CuotaCreditoId::new(id),
            pedido_id: pedido,
            numero_cuota: programada.numero_cuota,
            monto_cuota: programada.monto_cuota,
            monto_pagado: Decimal::ZERO,
            fecha_vencimiento: programada.fecha_vencimiento,
            fecha_pago: None,
            estado: EstadoCuota::Pendiente,
        })
        .collect()
}

#[test]
fn test_cart_with_coupon_prices_consistently() {
    let lineas = carrito();
    assert_eq!(lineas[0].precio_final_unitario(), dec!(41.40));

    let cupon = bienvenida();
    let subtotal: Decimal = lineas.iter().map(LineaPedido::subtotal).sum();
    let ahora = Utc.with_ymd_and_hms(2026, 10, 15, 19, 0, 0).unwrap();
    cupon.puede_usarse(ahora, subtotal).unwrap();
    let descuento = cupon.calcular_descuento(subtotal);
    assert_eq!(descuento, dec!(10.83));

    let totales = calcular_totales(&lineas, dec!(5.00), descuento);
    assert_eq!(totales.subtotal, dec!(108.30));
    assert_eq!(totales.igv, dec!(19.49));
    assert_eq!(totales.total, dec!(121.96));
    assert!(totales.es_consistente());
}

#[test]
fn test_coupon_rejections_follow_its_rules() {
    let mut cupon = bienvenida();
    let ahora = Utc.with_ymd_and_hms(2026, 10, 15, 19, 0, 0).unwrap();

    assert_eq!(
        cupon.puede_usarse(ahora, dec!(25)),
        Err(CuponRechazo::MontoMinimo { minimo: dec!(40) })
    );

    let despues = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(cupon.puede_usarse(despues, dec!(80)), Err(CuponRechazo::Expirado));

    cupon.usos = 100;
    assert_eq!(cupon.usos_restantes(), Some(0));
    assert_eq!(
        cupon.puede_usarse(ahora, dec!(80)),
        Err(CuponRechazo::LimiteAlcanzado)
    );

    // A big cart hits the percentage cap.
    assert_eq!(bienvenida().calcular_descuento(dec!(400)), dec!(15));
}

#[test]
fn test_discount_never_reaches_shipping() {
    let totales = calcular_totales(&carrito(), dec!(5.00), dec!(500));
    assert_eq!(totales.descuento, dec!(127.79));
    assert_eq!(totales.total, dec!(5.00));
    assert!(totales.es_consistente());
}

#[test]
fn test_credit_order_lifecycle() {
    let limite = dec!(500.00);
    let total = dec!(121.96);

    let mut usado = validar_credito(limite, Decimal::ZERO, total).unwrap();
    assert_eq!(usado, total);

    let programadas = generar_cuotas(total, 3, fecha(11, 14), INTERVALO_DIAS_DEFECTO).unwrap();
    let montos: Vec<Decimal> = programadas.iter().map(|c| c.monto_cuota).collect();
    assert_eq!(montos, vec![dec!(40.65), dec!(40.65), dec!(40.66)]);
    assert_eq!(montos.iter().copied().sum::<Decimal>(), total);
    assert_eq!(
        programadas[2].fecha_vencimiento,
        NaiveDate::from_ymd_opt(2027, 1, 13).unwrap()
    );

    let mut cuotas = almacenar(PedidoId::new(7), &programadas);

    // First installment paid on time and in full.
    let pago = cuotas[0].aplicar_pago(dec!(40.65), fecha(11, 10)).unwrap();
    assert_eq!(pago.estado, EstadoCuota::Pagado);
    usado = liberar_credito(usado, pago.aplicado);
    assert_eq!(usado, dec!(81.31));

    // Second installment paid in part, then left overdue.
    let pago = cuotas[1].aplicar_pago(dec!(20.00), fecha(12, 1)).unwrap();
    assert_eq!(pago.estado, EstadoCuota::Parcial);
    usado = liberar_credito(usado, pago.aplicado);
    assert_eq!(cuotas[1].saldo(), dec!(20.65));

    let tarde = fecha(12, 24);
    assert_eq!(cuotas[1].estado_en(tarde), EstadoCuota::Vencido);
    assert_eq!(cuotas[1].dias_vencida(tarde), 10);
    assert_eq!(cuotas[1].calcular_mora(tarde, dec!(0.001)), dec!(0.21));

    // Paying more than the last installment owes leaves an excess.
    let pago = cuotas[2].aplicar_pago(dec!(50.00), fecha(12, 24)).unwrap();
    assert_eq!(pago.aplicado, dec!(40.66));
    assert_eq!(pago.excedente, dec!(9.34));
    usado = liberar_credito(usado, pago.aplicado);

    let pendiente: Decimal = cuotas.iter().map(CuotaCredito::saldo).sum();
    assert_eq!(usado, pendiente);
    assert_eq!(
        cuotas[0].aplicar_pago(dec!(1), fecha(12, 24)),
        Err(CreditoRechazo::CuotaPagada)
    );
}

#[test]
fn test_credit_line_refuses_what_it_cannot_cover() {
    assert_eq!(
        validar_credito(dec!(500), dec!(450), dec!(121.96)),
        Err(CreditoRechazo::LimiteExcedido {
            disponible: dec!(50)
        })
    );
    assert_eq!(
        generar_cuotas(dec!(121.96), 25, fecha(11, 14), INTERVALO_DIAS_DEFECTO),
        Err(CreditoRechazo::NumeroCuotasInvalido)
    );
    assert_eq!(liberar_credito(dec!(10), dec!(25)), Decimal::ZERO);
}

#[test]
fn test_stock_ledger_chains_movements() {
    let pasos = [
        (TipoMovimiento::Salida, 2),
        (TipoMovimiento::Salida, 3),
        (TipoMovimiento::Devolucion, 2),
        (TipoMovimiento::Ajuste, -7),
    ];

    let inicial = 10;
    let mut stock = inicial;
    let mut neto = 0;
    for (tipo, cantidad) in pasos {
        let movimiento = MovimientoInventario::registrar(stock, tipo, cantidad).unwrap();
        assert!(movimiento.es_consistente());
        assert_eq!(movimiento.stock_anterior, stock);
        stock = movimiento.stock_nuevo;
        neto += movimiento.cantidad;
    }
    assert_eq!(stock, 0);
    assert_eq!(stock - inicial, neto);

    assert_eq!(
        MovimientoInventario::registrar(stock, TipoMovimiento::Salida, 1),
        Err(MovimientoRechazo::StockInsuficiente {
            disponible: 0,
            solicitado: 1
        })
    );
}

#[test]
fn test_order_state_and_balance() {
    assert_eq!(
        transicionar(EstadoPedido::Pendiente, EstadoPedido::Confirmado),
        Ok(EstadoPedido::Confirmado)
    );
    assert!(transicionar(EstadoPedido::Entregado, EstadoPedido::Cancelado).is_err());
    assert!(transicionar(EstadoPedido::EnCamino, EstadoPedido::Cancelado).is_err());

    let pagos = [
        (EstadoPago::Completado, dec!(50.00)),
        (EstadoPago::Pendiente, dec!(71.96)),
        (EstadoPago::Fallido, dec!(10.00)),
    ];
    assert_eq!(saldo_pendiente(dec!(121.96), &pagos), dec!(71.96));

    assert_eq!(numero_pedido(fecha(10, 15), 123), "PED-20261015-000123");
}
