//! Customer credit lines and installment schedules.
//!
//! A customer's `credito_usado` always stays within `0..=limite_credito`.
//! Financing an order consumes credit; every installment payment and every
//! cancellation releases it again.

use chrono::{Duration, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CuotaCreditoId, EstadoCuota, PedidoId, format_soles, round_money};

/// Maximum number of installments for one order.
pub const MAX_CUOTAS: i32 = 24;

/// Default days between installments.
pub const INTERVALO_DIAS_DEFECTO: i64 = 30;

/// Why a credit operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreditoRechazo {
    #[error("el monto debe ser mayor a cero")]
    MontoInvalido,
    #[error("límite de crédito excedido, disponible: {}", format_soles(*disponible))]
    LimiteExcedido { disponible: Decimal },
    #[error("el número de cuotas debe estar entre 1 y {MAX_CUOTAS}")]
    NumeroCuotasInvalido,
    #[error("el monto no alcanza para {numero_cuotas} cuotas de al menos S/ 0.01")]
    CuotaMinima { numero_cuotas: i32 },
    #[error("la cuota ya está pagada")]
    CuotaPagada,
}

/// Credit still available to a customer.
#[must_use]
pub fn credito_disponible(limite: Decimal, usado: Decimal) -> Decimal {
    (limite - usado).max(Decimal::ZERO)
}

/// Validate that `monto` fits in the customer's credit line.
///
/// Returns the new `credito_usado`.
///
/// # Errors
///
/// Returns [`CreditoRechazo::MontoInvalido`] for non-positive amounts and
/// [`CreditoRechazo::LimiteExcedido`] when the line cannot cover `monto`.
pub fn validar_credito(
    limite: Decimal,
    usado: Decimal,
    monto: Decimal,
) -> Result<Decimal, CreditoRechazo> {
    if monto <= Decimal::ZERO {
        return Err(CreditoRechazo::MontoInvalido);
    }
    let disponible = credito_disponible(limite, usado);
    if monto > disponible {
        return Err(CreditoRechazo::LimiteExcedido { disponible });
    }
    Ok(usado + monto)
}

/// Release `monto` from a customer's used credit, never below zero.
#[must_use]
pub fn liberar_credito(usado: Decimal, monto: Decimal) -> Decimal {
    (usado - monto.max(Decimal::ZERO)).max(Decimal::ZERO)
}

/// One installment of a generated schedule, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuotaProgramada {
    pub numero_cuota: i32,
    pub monto_cuota: Decimal,
    pub fecha_vencimiento: NaiveDate,
}

/// Split `total` into `numero_cuotas` installments.
///
/// Installments are truncated to cents and the last one absorbs the
/// remainder, so the schedule always sums to `total`.
///
/// # Errors
///
/// Returns [`CreditoRechazo::NumeroCuotasInvalido`] outside `1..=MAX_CUOTAS`,
/// [`CreditoRechazo::MontoInvalido`] for non-positive totals and
/// [`CreditoRechazo::CuotaMinima`] when an installment would be under one
/// cent.
pub fn generar_cuotas(
    total: Decimal,
    numero_cuotas: i32,
    primera_fecha: NaiveDate,
    intervalo_dias: i64,
) -> Result<Vec<CuotaProgramada>, CreditoRechazo> {
    if !(1..=MAX_CUOTAS).contains(&numero_cuotas) {
        return Err(CreditoRechazo::NumeroCuotasInvalido);
    }
    let total = round_money(total);
    if total <= Decimal::ZERO {
        return Err(CreditoRechazo::MontoInvalido);
    }

    let n = Decimal::from(numero_cuotas);
    let base = (total / n).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    if base < Decimal::new(1, 2) {
        return Err(CreditoRechazo::CuotaMinima { numero_cuotas });
    }
    let ultima = total - base * (n - Decimal::ONE);

    Ok((1..=numero_cuotas)
        .map(|numero| CuotaProgramada {
            numero_cuota: numero,
            monto_cuota: if numero == numero_cuotas { ultima } else { base },
            fecha_vencimiento: primera_fecha
                + Duration::days(intervalo_dias * i64::from(numero - 1)),
        })
        .collect())
}

/// A stored installment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuotaCredito {
    pub id: CuotaCreditoId,
    pub pedido_id: PedidoId,
    pub numero_cuota: i32,
    pub monto_cuota: Decimal,
    pub monto_pagado: Decimal,
    pub fecha_vencimiento: NaiveDate,
    pub fecha_pago: Option<NaiveDate>,
    pub estado: EstadoCuota,
}

/// Result of applying a payment to an installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AplicacionPago {
    /// Amount credited to the installment.
    pub aplicado: Decimal,
    /// Amount that exceeded the installment balance.
    pub excedente: Decimal,
    pub estado: EstadoCuota,
}

impl CuotaCredito {
    /// Outstanding balance.
    #[must_use]
    pub fn saldo(&self) -> Decimal {
        (self.monto_cuota - self.monto_pagado).max(Decimal::ZERO)
    }

    #[must_use]
    pub fn esta_pagada(&self) -> bool {
        self.saldo().is_zero()
    }

    /// Unpaid and past its due date.
    #[must_use]
    pub fn esta_vencida(&self, hoy: NaiveDate) -> bool {
        !self.esta_pagada() && hoy > self.fecha_vencimiento
    }

    /// Days past due, zero when not overdue.
    #[must_use]
    pub fn dias_vencida(&self, hoy: NaiveDate) -> i64 {
        if self.esta_vencida(hoy) {
            (hoy - self.fecha_vencimiento).num_days()
        } else {
            0
        }
    }

    /// Late fee: outstanding balance times daily rate times days overdue.
    #[must_use]
    pub fn calcular_mora(&self, hoy: NaiveDate, tasa_diaria: Decimal) -> Decimal {
        round_money(self.saldo() * tasa_diaria * Decimal::from(self.dias_vencida(hoy)))
    }

    /// State derived from balance and due date.
    #[must_use]
    pub fn estado_en(&self, hoy: NaiveDate) -> EstadoCuota {
        if self.esta_pagada() {
            EstadoCuota::Pagado
        } else if self.esta_vencida(hoy) {
            EstadoCuota::Vencido
        } else if self.monto_pagado > Decimal::ZERO {
            EstadoCuota::Parcial
        } else {
            EstadoCuota::Pendiente
        }
    }

    /// Apply a payment, updating `monto_pagado`, `fecha_pago` and `estado`.
    ///
    /// # Errors
    ///
    /// Returns [`CreditoRechazo::MontoInvalido`] for non-positive amounts and
    /// [`CreditoRechazo::CuotaPagada`] when nothing is owed.
    pub fn aplicar_pago(
        &mut self,
        monto: Decimal,
        hoy: NaiveDate,
    ) -> Result<AplicacionPago, CreditoRechazo> {
        if monto <= Decimal::ZERO {
            return Err(CreditoRechazo::MontoInvalido);
        }
        if self.esta_pagada() {
            return Err(CreditoRechazo::CuotaPagada);
        }
        let aplicado = monto.min(self.saldo());
        self.monto_pagado += aplicado;
        self.fecha_pago = Some(hoy);
        self.estado = self.estado_en(hoy);
        Ok(AplicacionPago {
            aplicado,
            excedente: monto - aplicado,
            estado: self.estado,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fecha(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, d).unwrap()
    }

    fn cuota(monto: Decimal) -> CuotaCredito {
        CuotaCredito {
            id: CuotaCreditoId::new(1),
            pedido_id: PedidoId::new(1),
            numero_cuota: 1,
            monto_cuota: monto,
            monto_pagado: Decimal::ZERO,
            fecha_vencimiento: fecha(15),
            fecha_pago: None,
            estado: EstadoCuota::Pendiente,
        }
    }

    #[test]
    fn test_credit_limit_bounds() {
        assert_eq!(validar_credito(dec!(500), dec!(300), dec!(200)), Ok(dec!(500)));
        assert_eq!(
            validar_credito(dec!(500), dec!(300), dec!(200.01)),
            Err(CreditoRechazo::LimiteExcedido {
                disponible: dec!(200)
            })
        );
        assert_eq!(
            validar_credito(dec!(500), dec!(0), dec!(0)),
            Err(CreditoRechazo::MontoInvalido)
        );
    }

    #[test]
    fn test_credito_disponible_never_negative() {
        assert_eq!(credito_disponible(dec!(100), dec!(150)), dec!(0));
        assert_eq!(liberar_credito(dec!(50), dec!(80)), dec!(0));
        assert_eq!(liberar_credito(dec!(50), dec!(20)), dec!(30));
    }

    #[test]
    fn test_schedule_sums_to_total() {
        let cuotas = generar_cuotas(dec!(100), 3, fecha(1), 30).unwrap();
        let montos: Vec<_> = cuotas.iter().map(|c| c.monto_cuota).collect();
        assert_eq!(montos, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
        assert_eq!(montos.iter().copied().sum::<Decimal>(), dec!(100));
        assert_eq!(cuotas[2].fecha_vencimiento, fecha(1) + Duration::days(60));
        assert_eq!(cuotas[0].numero_cuota, 1);
    }

    #[test]
    fn test_schedule_single_installment() {
        let cuotas = generar_cuotas(dec!(59.90), 1, fecha(1), 30).unwrap();
        assert_eq!(cuotas.len(), 1);
        assert_eq!(cuotas[0].monto_cuota, dec!(59.90));
    }

    #[test]
    fn test_schedule_rejects_bad_input() {
        assert_eq!(
            generar_cuotas(dec!(100), 0, fecha(1), 30),
            Err(CreditoRechazo::NumeroCuotasInvalido)
        );
        assert_eq!(
            generar_cuotas(dec!(100), 25, fecha(1), 30),
            Err(CreditoRechazo::NumeroCuotasInvalido)
        );
        assert_eq!(
            generar_cuotas(dec!(0), 2, fecha(1), 30),
            Err(CreditoRechazo::MontoInvalido)
        );
    }

    #[test]
    fn test_schedule_rejects_installments_under_a_cent() {
        assert_eq!(
            generar_cuotas(dec!(0.10), 24, fecha(1), 30),
            Err(CreditoRechazo::CuotaMinima { numero_cuotas: 24 })
        );

        let cuotas = generar_cuotas(dec!(0.24), 24, fecha(1), 30).unwrap();
        assert!(cuotas.iter().all(|c| c.monto_cuota == dec!(0.01)));

        let cuotas = generar_cuotas(dec!(0.30), 24, fecha(1), 30).unwrap();
        assert_eq!(cuotas[23].monto_cuota, dec!(0.07));
    }

    #[test]
    fn test_overdue_and_late_fee() {
        let c = cuota(dec!(100));
        assert!(!c.esta_vencida(fecha(15)));
        assert!(c.esta_vencida(fecha(16)));
        assert_eq!(c.dias_vencida(fecha(25)), 10);
        assert_eq!(c.calcular_mora(fecha(25), dec!(0.001)), dec!(1.00));
        assert_eq!(c.estado_en(fecha(25)), EstadoCuota::Vencido);
    }

    #[test]
    fn test_partial_then_full_payment() {
        let mut c = cuota(dec!(100));
        let r = c.aplicar_pago(dec!(40), fecha(10)).unwrap();
        assert_eq!(r.aplicado, dec!(40));
        assert_eq!(r.estado, EstadoCuota::Parcial);
        assert_eq!(c.saldo(), dec!(60));

        let r = c.aplicar_pago(dec!(75), fecha(12)).unwrap();
        assert_eq!(r.aplicado, dec!(60));
        assert_eq!(r.excedente, dec!(15));
        assert_eq!(r.estado, EstadoCuota::Pagado);
        assert_eq!(c.fecha_pago, Some(fecha(12)));
        assert!(!c.esta_vencida(fecha(30)));

        assert_eq!(
            c.aplicar_pago(dec!(1), fecha(13)),
            Err(CreditoRechazo::CuotaPagada)
        );
    }
}
