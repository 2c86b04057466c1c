//! Status and kind enums for orders, payments, credit and delivery zones.
//!
//! Every enum is stored as a Postgres `ENUM` type (see the `api` migrations)
//! and travels over the wire in `snake_case`.

use serde::{Deserialize, Serialize};

/// Implements `Display` and `FromStr` from a fixed variant/string table.
macro_rules! wire_strings {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $name {
            /// All variants, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire/database representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", stringify!($name), ": {}"), s)),
                }
            }
        }
    };
}

/// Order lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "estado_pedido", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum EstadoPedido {
    #[default]
    Pendiente,
    Confirmado,
    Preparando,
    EnCamino,
    Entregado,
    Cancelado,
}

wire_strings!(EstadoPedido {
    Pendiente => "pendiente",
    Confirmado => "confirmado",
    Preparando => "preparando",
    EnCamino => "en_camino",
    Entregado => "entregado",
    Cancelado => "cancelado",
});

impl EstadoPedido {
    /// Whether an order in this state may move to `next`.
    ///
    /// Orders only move forward; cancellation is allowed until the order
    /// leaves the store.
    #[must_use]
    pub const fn puede_transicionar_a(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pendiente, Self::Confirmado | Self::Cancelado)
                | (Self::Confirmado, Self::Preparando | Self::Cancelado)
                | (Self::Preparando, Self::EnCamino | Self::Cancelado)
                | (Self::EnCamino, Self::Entregado)
        )
    }

    /// Terminal states accept no further transitions.
    #[must_use]
    pub const fn es_final(self) -> bool {
        matches!(self, Self::Entregado | Self::Cancelado)
    }

    /// Label shown to customers.
    #[must_use]
    pub const fn etiqueta(self) -> &'static str {
        match self {
            Self::Pendiente => "Pendiente",
            Self::Confirmado => "Confirmado",
            Self::Preparando => "En preparación",
            Self::EnCamino => "En camino",
            Self::Entregado => "Entregado",
            Self::Cancelado => "Cancelado",
        }
    }
}

/// Payment record state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "estado_pago", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum EstadoPago {
    #[default]
    Pendiente,
    Completado,
    Fallido,
    Reembolsado,
}

wire_strings!(EstadoPago {
    Pendiente => "pendiente",
    Completado => "completado",
    Fallido => "fallido",
    Reembolsado => "reembolsado",
});

impl EstadoPago {
    #[must_use]
    pub const fn etiqueta(self) -> &'static str {
        match self {
            Self::Pendiente => "Pendiente",
            Self::Completado => "Completado",
            Self::Fallido => "Fallido",
            Self::Reembolsado => "Reembolsado",
        }
    }
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "metodo_pago", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MetodoPago {
    Efectivo,
    Tarjeta,
    Transferencia,
    Yape,
    Plin,
    Credito,
}

wire_strings!(MetodoPago {
    Efectivo => "efectivo",
    Tarjeta => "tarjeta",
    Transferencia => "transferencia",
    Yape => "yape",
    Plin => "plin",
    Credito => "credito",
});

/// Whether an order is paid upfront or financed with installments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "tipo_pago", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TipoPago {
    #[default]
    Contado,
    Credito,
}

wire_strings!(TipoPago {
    Contado => "contado",
    Credito => "credito",
});

/// Installment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "estado_cuota", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum EstadoCuota {
    #[default]
    Pendiente,
    Parcial,
    Pagado,
    Vencido,
}

wire_strings!(EstadoCuota {
    Pendiente => "pendiente",
    Parcial => "parcial",
    Pagado => "pagado",
    Vencido => "vencido",
});

impl EstadoCuota {
    #[must_use]
    pub const fn etiqueta(self) -> &'static str {
        match self {
            Self::Pendiente => "Pendiente",
            Self::Parcial => "Pago parcial",
            Self::Pagado => "Pagado",
            Self::Vencido => "Vencido",
        }
    }
}

/// Inventory movement kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "tipo_movimiento", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TipoMovimiento {
    Entrada,
    Salida,
    Ajuste,
    Devolucion,
}

wire_strings!(TipoMovimiento {
    Entrada => "entrada",
    Salida => "salida",
    Ajuste => "ajuste",
    Devolucion => "devolucion",
});

/// Coupon discount kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "tipo_cupon", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TipoCupon {
    Porcentaje,
    MontoFijo,
}

wire_strings!(TipoCupon {
    Porcentaje => "porcentaje",
    MontoFijo => "monto_fijo",
});

/// What a zone exception overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "tipo_excepcion", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TipoExcepcion {
    /// Zone closed (holiday, strike, weather).
    NoDisponible,
    /// Replace the shipping cost.
    CostoEspecial,
    /// Replace the opening hours for the affected dates.
    HorarioEspecial,
    /// Replace the delivery time window.
    TiempoEspecial,
}

wire_strings!(TipoExcepcion {
    NoDisponible => "no_disponible",
    CostoEspecial => "costo_especial",
    HorarioEspecial => "horario_especial",
    TiempoEspecial => "tiempo_especial",
});

/// Identity document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "tipo_documento", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TipoDocumento {
    #[default]
    Dni,
    Ruc,
    Ce,
    Pasaporte,
}

wire_strings!(TipoDocumento {
    Dni => "dni",
    Ruc => "ruc",
    Ce => "ce",
    Pasaporte => "pasaporte",
});

impl TipoDocumento {
    /// Short uppercase label.
    #[must_use]
    pub const fn etiqueta(self) -> &'static str {
        match self {
            Self::Dni => "DNI",
            Self::Ruc => "RUC",
            Self::Ce => "CE",
            Self::Pasaporte => "PASAPORTE",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_estado_pedido_forward_transitions() {
        use EstadoPedido::{Confirmado, EnCamino, Entregado, Pendiente, Preparando};
        assert!(Pendiente.puede_transicionar_a(Confirmado));
        assert!(Confirmado.puede_transicionar_a(Preparando));
        assert!(Preparando.puede_transicionar_a(EnCamino));
        assert!(EnCamino.puede_transicionar_a(Entregado));
    }

    #[test]
    fn test_estado_pedido_rejects_backwards_and_skips() {
        use EstadoPedido::{Cancelado, Confirmado, EnCamino, Entregado, Pendiente};
        assert!(!Confirmado.puede_transicionar_a(Pendiente));
        assert!(!Pendiente.puede_transicionar_a(Entregado));
        assert!(!EnCamino.puede_transicionar_a(Cancelado));
        assert!(!Entregado.puede_transicionar_a(Cancelado));
        assert!(!Cancelado.puede_transicionar_a(Pendiente));
    }

    #[test]
    fn test_final_states_have_no_exits() {
        for from in EstadoPedido::ALL.iter().filter(|e| e.es_final()) {
            for to in EstadoPedido::ALL {
                assert!(!from.puede_transicionar_a(*to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_wire_strings_roundtrip() {
        for estado in EstadoPedido::ALL {
            assert_eq!(estado.to_string().parse::<EstadoPedido>().unwrap(), *estado);
        }
        for tipo in TipoExcepcion::ALL {
            assert_eq!(tipo.as_str().parse::<TipoExcepcion>().unwrap(), *tipo);
        }
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        let err = "enviado".parse::<EstadoPedido>().unwrap_err();
        assert_eq!(err, "invalid EstadoPedido: enviado");
    }

    #[test]
    fn test_serde_matches_display() {
        let json = serde_json::to_string(&EstadoPedido::EnCamino).unwrap();
        assert_eq!(json, "\"en_camino\"");
        let json = serde_json::to_string(&TipoCupon::MontoFijo).unwrap();
        assert_eq!(json, "\"monto_fijo\"");
    }
}
