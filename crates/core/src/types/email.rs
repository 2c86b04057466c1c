//! Customer email addresses.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why an email address was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("el correo es obligatorio")]
    Empty,
    #[error("el correo no puede superar {max} caracteres")]
    TooLong { max: usize },
    #[error("el correo no tiene un formato válido")]
    Malformed,
}

/// A lowercased email address with one `@`, a non-empty local part and a
/// dotted domain.
///
/// ```
/// use tienda_core::Email;
///
/// assert_eq!(Email::parse(" Ana.Quispe@Correo.PE ").unwrap().as_str(), "ana.quispe@correo.pe");
/// assert!(Email::parse("ana@localhost").is_err());
/// assert!(Email::parse("a@b@c.pe").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Column width of `clientes.email`.
    pub const MAX_LENGTH: usize = 255;

    /// Normalize and validate an address.
    ///
    /// # Errors
    ///
    /// Returns an [`EmailError`] for empty, oversized or malformed input.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let s = s.trim().to_lowercase();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let (local, domain) = s.split_once('@').ok_or(EmailError::Malformed)?;
        let domain_ok = !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.');
        if local.is_empty() || !domain_ok || s.chars().any(char::is_whitespace) {
            return Err(EmailError::Malformed);
        }
        Ok(Self(s))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_case_and_whitespace() {
        let email = Email::parse("  Rosa@Bodega.COM.pe ").unwrap();
        assert_eq!(email.as_str(), "rosa@bodega.com.pe");
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(Email::parse(""), Err(EmailError::Empty));
        assert_eq!(Email::parse("sin-arroba"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("@dominio.pe"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("ana@.pe"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("ana@pe."), Err(EmailError::Malformed));
        assert_eq!(Email::parse("ana maria@correo.pe"), Err(EmailError::Malformed));
    }

    #[test]
    fn test_too_long() {
        let long = format!("{}@correo.pe", "a".repeat(250));
        assert!(matches!(Email::parse(&long), Err(EmailError::TooLong { .. })));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<Email, _> = serde_json::from_str("\"Luis@Tienda.pe\"");
        assert_eq!(ok.unwrap().as_str(), "luis@tienda.pe");
        let bad: Result<Email, _> = serde_json::from_str("\"luis\"");
        assert!(bad.is_err());
    }
}
