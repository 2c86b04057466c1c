//! Coupon eligibility and discount calculation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CuponId, TipoCupon, format_soles, round_money};

/// A discount coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cupon {
    pub id: CuponId,
    pub codigo: String,
    pub tipo: TipoCupon,
    /// Percentage (0-100) or fixed amount, depending on `tipo`.
    pub valor: Decimal,
    pub monto_minimo: Option<Decimal>,
    /// Cap for percentage coupons.
    pub descuento_maximo: Option<Decimal>,
    pub fecha_inicio: Option<DateTime<Utc>>,
    pub fecha_fin: Option<DateTime<Utc>>,
    /// `None` means unlimited uses.
    pub limite_uso: Option<i32>,
    pub usos: i32,
    pub activo: bool,
}

/// Why a coupon cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CuponRechazo {
    #[error("el cupón no está activo")]
    Inactivo,
    #[error("el cupón aún no está vigente")]
    NoIniciado,
    #[error("el cupón ha expirado")]
    Expirado,
    #[error("el cupón alcanzó su límite de usos")]
    LimiteAlcanzado,
    #[error("el cupón requiere un monto mínimo de {}", format_soles(*minimo))]
    MontoMinimo { minimo: Decimal },
}

impl Cupon {
    /// Normalize a code as typed by a customer.
    #[must_use]
    pub fn normalizar_codigo(codigo: &str) -> String {
        codigo.trim().to_uppercase()
    }

    /// Uses left before the limit, `None` when unlimited.
    #[must_use]
    pub fn usos_restantes(&self) -> Option<i32> {
        self.limite_uso.map(|limite| (limite - self.usos).max(0))
    }

    /// Check whether the coupon can be applied to an order.
    ///
    /// # Errors
    ///
    /// Returns the first [`CuponRechazo`] rule the coupon fails.
    pub fn puede_usarse(&self, ahora: DateTime<Utc>, subtotal: Decimal) -> Result<(), CuponRechazo> {
        if !self.activo {
            return Err(CuponRechazo::Inactivo);
        }
        if self.fecha_inicio.is_some_and(|inicio| ahora < inicio) {
            return Err(CuponRechazo::NoIniciado);
        }
        if self.fecha_fin.is_some_and(|fin| ahora > fin) {
            return Err(CuponRechazo::Expirado);
        }
        if self.limite_uso.is_some_and(|limite| self.usos >= limite) {
            return Err(CuponRechazo::LimiteAlcanzado);
        }
        if let Some(minimo) = self.monto_minimo.filter(|m| subtotal < *m) {
            return Err(CuponRechazo::MontoMinimo { minimo });
        }
        Ok(())
    }

    /// Discount this coupon grants on `subtotal`, never more than the subtotal.
    #[must_use]
    pub fn calcular_descuento(&self, subtotal: Decimal) -> Decimal {
        if subtotal <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let descuento = match self.tipo {
            TipoCupon::Porcentaje => {
                let pct = self.valor.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
                let bruto = round_money(subtotal * pct / Decimal::ONE_HUNDRED);
                self.descuento_maximo.map_or(bruto, |tope| bruto.min(tope))
            }
            TipoCupon::MontoFijo => self.valor.max(Decimal::ZERO),
        };
        descuento.min(subtotal)
    }
}
