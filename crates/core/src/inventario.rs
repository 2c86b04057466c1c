//! Stock movements.
//!
//! Every movement records `stock_anterior`, `stock_nuevo` and a signed
//! `cantidad` such that `stock_nuevo - stock_anterior = cantidad`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::TipoMovimiento;

/// Why a stock movement cannot be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MovimientoRechazo {
    #[error("la cantidad debe ser mayor a cero")]
    CantidadInvalida,
    #[error("el ajuste no puede ser cero")]
    AjusteVacio,
    #[error("stock insuficiente: disponible {disponible}, solicitado {solicitado}")]
    StockInsuficiente { disponible: i32, solicitado: i32 },
}

/// A computed stock movement, ready to be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovimientoInventario {
    pub tipo: TipoMovimiento,
    /// Signed change applied to stock.
    pub cantidad: i32,
    pub stock_anterior: i32,
    pub stock_nuevo: i32,
}

impl MovimientoInventario {
    /// Compute the movement of `cantidad` units against `stock_actual`.
    ///
    /// `entrada` and `devolucion` take a positive quantity and add it,
    /// `salida` takes a positive quantity and subtracts it, and `ajuste`
    /// takes a signed delta.
    ///
    /// # Errors
    ///
    /// Returns a [`MovimientoRechazo`] for non-positive quantities, zero
    /// adjustments, or any movement that would leave stock below zero.
    pub fn registrar(
        stock_actual: i32,
        tipo: TipoMovimiento,
        cantidad: i32,
    ) -> Result<Self, MovimientoRechazo> {
        let delta = match tipo {
            TipoMovimiento::Entrada | TipoMovimiento::Devolucion => {
                if cantidad <= 0 {
                    return Err(MovimientoRechazo::CantidadInvalida);
                }
                cantidad
            }
            TipoMovimiento::Salida => {
                if cantidad <= 0 {
                    return Err(MovimientoRechazo::CantidadInvalida);
                }
                -cantidad
            }
            TipoMovimiento::Ajuste => {
                if cantidad == 0 {
                    return Err(MovimientoRechazo::AjusteVacio);
                }
                cantidad
            }
        };

        let stock_nuevo = stock_actual
            .checked_add(delta)
            .filter(|nuevo| *nuevo >= 0)
            .ok_or(MovimientoRechazo::StockInsuficiente {
                disponible: stock_actual,
                solicitado: delta.saturating_abs(),
            })?;

        Ok(Self {
            tipo,
            cantidad: delta,
            stock_anterior: stock_actual,
            stock_nuevo,
        })
    }

    /// Whether the recorded figures satisfy the stock identity.
    #[must_use]
    pub const fn es_consistente(&self) -> bool {
        self.stock_nuevo - self.stock_anterior == self.cantidad && self.stock_nuevo >= 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_entrada_and_devolucion_add() {
        let m = MovimientoInventario::registrar(10, TipoMovimiento::Entrada, 5).unwrap();
        assert_eq!((m.stock_anterior, m.stock_nuevo, m.cantidad), (10, 15, 5));
        assert!(m.es_consistente());

        let m = MovimientoInventario::registrar(0, TipoMovimiento::Devolucion, 2).unwrap();
        assert_eq!(m.stock_nuevo, 2);
    }

    #[test]
    fn test_salida_is_negative_and_checked() {
        let m = MovimientoInventario::registrar(10, TipoMovimiento::Salida, 10).unwrap();
        assert_eq!(m.cantidad, -10);
        assert_eq!(m.stock_nuevo, 0);
        assert!(m.es_consistente());

        assert_eq!(
            MovimientoInventario::registrar(3, TipoMovimiento::Salida, 4),
            Err(MovimientoRechazo::StockInsuficiente {
                disponible: 3,
                solicitado: 4
            })
        );
    }

    #[test]
    fn test_ajuste_is_signed() {
        let m = MovimientoInventario::registrar(10, TipoMovimiento::Ajuste, -3).unwrap();
        assert_eq!((m.cantidad, m.stock_nuevo), (-3, 7));
        assert!(m.es_consistente());

        assert!(MovimientoInventario::registrar(2, TipoMovimiento::Ajuste, -3).is_err());
        assert_eq!(
            MovimientoInventario::registrar(2, TipoMovimiento::Ajuste, 0),
            Err(MovimientoRechazo::AjusteVacio)
        );
    }

    #[test]
    fn test_rejects_non_positive_quantities() {
        for tipo in [
            TipoMovimiento::Entrada,
            TipoMovimiento::Salida,
            TipoMovimiento::Devolucion,
        ] {
            assert_eq!(
                MovimientoInventario::registrar(5, tipo, 0),
                Err(MovimientoRechazo::CantidadInvalida)
            );
        }
    }

    #[test]
    fn test_overflow_is_rejected() {
        assert!(MovimientoInventario::registrar(i32::MAX, TipoMovimiento::Entrada, 1).is_err());
    }
}
