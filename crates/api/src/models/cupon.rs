//! Coupon request bodies.

use rust_decimal::Decimal;
use serde::Deserialize;

use tienda_core::cupon::Cupon;

use super::catalogo::validar_monto;
use crate::error::{AppError, ValidationErrors};

/// Body of `POST /api/cupones/validar`.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidarCuponInput {
    pub codigo: String,
    pub subtotal: Decimal,
}

impl ValidarCuponInput {
    /// Validate the input and return the normalized code.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] listing every invalid field.
    pub fn validate(&self) -> Result<String, AppError> {
        let mut errors = ValidationErrors::new();
        let codigo = Cupon::normalizar_codigo(&self.codigo);
        errors.check(!codigo.is_empty(), "codigo", "el código es obligatorio");
        validar_monto(&mut errors, "subtotal", self.subtotal);
        errors.into_result()?;
        Ok(codigo)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_code_is_normalized() {
        let input = ValidarCuponInput {
            codigo: " bienvenida10 ".to_string(),
            subtotal: dec!(80),
        };
        assert_eq!(input.validate().unwrap(), "BIENVENIDA10");
    }

    #[test]
    fn test_blank_code_is_rejected() {
        let input = ValidarCuponInput {
            codigo: "  ".to_string(),
            subtotal: dec!(80),
        };
        assert!(matches!(input.validate(), Err(AppError::Validation(_))));
    }
}
