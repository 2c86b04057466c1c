//! Customer identity documents (DNI, RUC, carné de extranjería, pasaporte).

use core::fmt;

use serde::{Deserialize, Serialize};

use super::status::TipoDocumento;

/// Errors that can occur when parsing a [`Documento`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentoError {
    /// The number is empty after trimming.
    #[error("el número de documento es obligatorio")]
    Empty,
    /// The number has the wrong length for its type.
    #[error("el {tipo} debe tener {esperado} caracteres")]
    Length {
        /// Document type being validated.
        tipo: TipoDocumento,
        /// Human readable expected length.
        esperado: &'static str,
    },
    /// The number contains characters not allowed for its type.
    #[error("el {tipo} contiene caracteres no válidos")]
    InvalidCharacters {
        /// Document type being validated.
        tipo: TipoDocumento,
    },
    /// A RUC must start with 10, 15, 17 or 20.
    #[error("el RUC debe iniciar con 10, 15, 17 o 20")]
    RucPrefix,
}

/// A validated identity document.
///
/// ## Constraints
///
/// - DNI: exactly 8 digits
/// - RUC: exactly 11 digits, prefix 10, 15, 17 or 20
/// - Carné de extranjería: 9-12 alphanumerics
/// - Pasaporte: 6-12 alphanumerics
///
/// ## Examples
///
/// ```
/// use tienda_core::{Documento, TipoDocumento};
///
/// assert!(Documento::parse(TipoDocumento::Dni, "45678912").is_ok());
/// assert!(Documento::parse(TipoDocumento::Ruc, "20123456789").is_ok());
/// assert!(Documento::parse(TipoDocumento::Dni, "4567891").is_err());
/// assert!(Documento::parse(TipoDocumento::Ruc, "30123456789").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Documento {
    tipo: TipoDocumento,
    numero: String,
}

impl Documento {
    /// Parse and normalize a document number (trimmed, uppercased).
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentoError`] describing the first rule the number breaks.
    pub fn parse(tipo: TipoDocumento, numero: &str) -> Result<Self, DocumentoError> {
        let numero = numero.trim().to_uppercase();
        if numero.is_empty() {
            return Err(DocumentoError::Empty);
        }

        match tipo {
            TipoDocumento::Dni => {
                check_digits(tipo, &numero)?;
                check_length(tipo, &numero, 8..=8, "8")?;
            }
            TipoDocumento::Ruc => {
                check_digits(tipo, &numero)?;
                check_length(tipo, &numero, 11..=11, "11")?;
                if !["10", "15", "17", "20"].iter().any(|p| numero.starts_with(p)) {
                    return Err(DocumentoError::RucPrefix);
                }
            }
            TipoDocumento::Ce => {
                check_alphanumeric(tipo, &numero)?;
                check_length(tipo, &numero, 9..=12, "entre 9 y 12")?;
            }
            TipoDocumento::Pasaporte => {
                check_alphanumeric(tipo, &numero)?;
                check_length(tipo, &numero, 6..=12, "entre 6 y 12")?;
            }
        }

        Ok(Self { tipo, numero })
    }

    /// Document type.
    #[must_use]
    pub const fn tipo(&self) -> TipoDocumento {
        self.tipo
    }

    /// Normalized document number.
    #[must_use]
    pub fn numero(&self) -> &str {
        &self.numero
    }

    /// Whether the document identifies a company (RUC starting with 20).
    #[must_use]
    pub fn es_empresa(&self) -> bool {
        self.tipo == TipoDocumento::Ruc && self.numero.starts_with("20")
    }
}

impl fmt::Display for Documento {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tipo.etiqueta(), self.numero)
    }
}

fn check_digits(tipo: TipoDocumento, numero: &str) -> Result<(), DocumentoError> {
    if numero.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(DocumentoError::InvalidCharacters { tipo })
    }
}

fn check_alphanumeric(tipo: TipoDocumento, numero: &str) -> Result<(), DocumentoError> {
    if numero.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(DocumentoError::InvalidCharacters { tipo })
    }
}

fn check_length(
    tipo: TipoDocumento,
    numero: &str,
    range: std::ops::RangeInclusive<usize>,
    esperado: &'static str,
) -> Result<(), DocumentoError> {
    if range.contains(&numero.len()) {
        Ok(())
    } else {
        Err(DocumentoError::Length { tipo, esperado })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_documents() {
        assert!(Documento::parse(TipoDocumento::Dni, "12345678").is_ok());
        assert!(Documento::parse(TipoDocumento::Ruc, "10456789123").is_ok());
        assert!(Documento::parse(TipoDocumento::Ruc, "20601234567").is_ok());
        assert!(Documento::parse(TipoDocumento::Ce, "001234567").is_ok());
        assert!(Documento::parse(TipoDocumento::Pasaporte, "ab12345").is_ok());
    }

    #[test]
    fn test_parse_trims_and_uppercases() {
        let doc = Documento::parse(TipoDocumento::Pasaporte, "  ab12345 ").unwrap();
        assert_eq!(doc.numero(), "AB12345");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(
            Documento::parse(TipoDocumento::Dni, "   "),
            Err(DocumentoError::Empty)
        );
    }

    #[test]
    fn test_dni_rejects_letters_and_bad_length() {
        assert!(matches!(
            Documento::parse(TipoDocumento::Dni, "1234567A"),
            Err(DocumentoError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            Documento::parse(TipoDocumento::Dni, "123456789"),
            Err(DocumentoError::Length { .. })
        ));
    }

    #[test]
    fn test_ruc_prefix() {
        assert_eq!(
            Documento::parse(TipoDocumento::Ruc, "30123456789"),
            Err(DocumentoError::RucPrefix)
        );
    }

    #[test]
    fn test_es_empresa() {
        let empresa = Documento::parse(TipoDocumento::Ruc, "20601234567").unwrap();
        let persona = Documento::parse(TipoDocumento::Ruc, "10456789123").unwrap();
        assert!(empresa.es_empresa());
        assert!(!persona.es_empresa());
    }

    #[test]
    fn test_display() {
        let doc = Documento::parse(TipoDocumento::Dni, "12345678").unwrap();
        assert_eq!(doc.to_string(), "DNI 12345678");
    }

    #[test]
    fn test_error_message_mentions_type() {
        let err = Documento::parse(TipoDocumento::Dni, "123").unwrap_err();
        assert_eq!(err.to_string(), "el dni debe tener 8 caracteres");
    }
}
