//! Newtype IDs for type-safe entity references.
//!
//! Every table in the schema uses a `SERIAL` primary key. The `define_id!`
//! macro wraps those `i32` keys so a `ProductoId` can never be passed where a
//! `VariacionId` is expected.

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i32` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `Ord`
/// - Conversion methods: `new()`, `as_i32()`
/// - `From<i32>` and `Into<i32>` implementations
/// - `sqlx` `Type`, `Encode`, `Decode` and array support (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use tienda_core::define_id;
/// define_id!(TiendaId);
/// define_id!(RepartidorId);
///
/// let tienda = TiendaId::new(1);
/// let repartidor = RepartidorId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: TiendaId = repartidor;
/// # assert_eq!(tienda.as_i32(), repartidor.as_i32());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::postgres::PgHasArrayType for $name {
            fn array_type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i32 as ::sqlx::postgres::PgHasArrayType>::array_type_info()
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <i32 as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <i32 as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

// Catalog
define_id!(CategoriaId);
define_id!(ProductoId);
define_id!(ProductoImagenId);
define_id!(VariacionId);
define_id!(GrupoAdicionalId);
define_id!(AdicionalId);

// Customers and addresses
define_id!(ClienteId);
define_id!(DireccionId);
define_id!(DistritoId);
define_id!(DireccionValidadaId);

// Delivery zones
define_id!(ZonaRepartoId);
define_id!(ZonaDistritoId);
define_id!(CostoEnvioDinamicoId);
define_id!(HorarioZonaId);
define_id!(ExcepcionZonaId);

// Orders, payments and credit
define_id!(CuponId);
define_id!(PedidoId);
define_id!(DetallePedidoId);
define_id!(PagoId);
define_id!(CuotaCreditoId);
define_id!(MovimientoInventarioId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrips_through_i32() {
        let id = PedidoId::new(42);
        assert_eq!(id.as_i32(), 42);
        assert_eq!(i32::from(id), 42);
        assert_eq!(PedidoId::from(42), id);
    }

    #[test]
    fn test_id_serializes_transparently() {
        let json = serde_json::to_string(&ZonaRepartoId::new(7)).unwrap();
        assert_eq!(json, "7");

        let parsed: ProductoId = serde_json::from_str("15").unwrap();
        assert_eq!(parsed, ProductoId::new(15));
    }

    #[test]
    fn test_id_display() {
        assert_eq!(ClienteId::new(3).to_string(), "3");
    }
}
