//! Customers, their addresses and address validations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tienda_core::credito;
use tienda_core::reparto::Coordenadas;
use tienda_core::{
    ClienteId, DireccionId, DireccionValidadaId, DistritoId, Documento, Email, TipoDocumento,
    ZonaRepartoId,
};

use super::catalogo::validar_monto;
use super::texto_opcional;
use crate::error::{AppError, ValidationErrors};

/// A customer with an optional credit line.
#[derive(Debug, Clone, Serialize)]
pub struct Cliente {
    pub id: ClienteId,
    pub nombre: String,
    pub apellidos: Option<String>,
    pub email: Email,
    pub telefono: Option<String>,
    pub documento: Option<Documento>,
    pub limite_credito: Decimal,
    pub credito_usado: Decimal,
    pub activo: bool,
    pub created_at: DateTime<Utc>,
}

impl Cliente {
    #[must_use]
    pub fn nombre_completo(&self) -> String {
        match &self.apellidos {
            Some(apellidos) => format!("{} {apellidos}", self.nombre),
            None => self.nombre.clone(),
        }
    }

    #[must_use]
    pub fn credito_disponible(&self) -> Decimal {
        credito::credito_disponible(self.limite_credito, self.credito_usado)
    }
}

/// A delivery address.
#[derive(Debug, Clone, Serialize)]
pub struct Direccion {
    pub id: DireccionId,
    pub cliente_id: ClienteId,
    pub distrito_id: DistritoId,
    pub alias: Option<String>,
    pub direccion: String,
    pub referencia: Option<String>,
    pub coordenadas: Option<Coordenadas>,
    pub es_principal: bool,
    pub created_at: DateTime<Utc>,
}

/// Stored outcome of resolving an address against the delivery zones.
#[derive(Debug, Clone, Serialize)]
pub struct DireccionValidada {
    pub id: DireccionValidadaId,
    pub direccion_id: DireccionId,
    pub zona_reparto_id: Option<ZonaRepartoId>,
    pub es_valida: bool,
    pub distancia_km: Option<f64>,
    pub costo_envio: Option<Decimal>,
    pub tiempo_entrega_min: Option<i32>,
    pub tiempo_entrega_max: Option<i32>,
    pub mensaje: Option<String>,
    pub validado_en: DateTime<Utc>,
}

// =============================================================================
// Inputs
// =============================================================================

/// Body of `POST /api/clientes`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClienteInput {
    pub nombre: String,
    pub apellidos: Option<String>,
    pub email: String,
    pub telefono: Option<String>,
    pub tipo_documento: Option<TipoDocumento>,
    pub numero_documento: Option<String>,
    #[serde(default)]
    pub limite_credito: Decimal,
}

/// A [`ClienteInput`] whose fields passed validation.
#[derive(Debug, Clone)]
pub struct NuevoCliente {
    pub nombre: String,
    pub apellidos: Option<String>,
    pub email: Email,
    pub telefono: Option<String>,
    pub documento: Option<Documento>,
    pub limite_credito: Decimal,
}

impl ClienteInput {
    /// Validate and normalize the input.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] listing every invalid field.
    pub fn validate(self) -> Result<NuevoCliente, AppError> {
        let mut errors = ValidationErrors::new();

        let nombre = self.nombre.trim().to_string();
        errors.check(!nombre.is_empty(), "nombre", "el nombre es obligatorio");

        let email = Email::parse(&self.email)
            .map_err(|e| errors.add("email", e.to_string()))
            .ok();

        let telefono = texto_opcional(self.telefono.as_deref());
        if let Some(telefono) = &telefono {
            errors.check(
                telefono
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-')),
                "telefono",
                "el teléfono solo admite dígitos, espacios, + y -",
            );
        }

        let documento = match (self.tipo_documento, texto_opcional(self.numero_documento.as_deref())) {
            (Some(tipo), Some(numero)) => match Documento::parse(tipo, &numero) {
                Ok(documento) => Some(documento),
                Err(e) => {
                    errors.add("numero_documento", e.to_string());
                    None
                }
            },
            (None, Some(_)) => {
                errors.add("tipo_documento", "indique el tipo de documento");
                None
            }
            (Some(_), None) => {
                errors.add("numero_documento", "el número de documento es obligatorio");
                None
            }
            (None, None) => None,
        };

        validar_monto(&mut errors, "limite_credito", self.limite_credito);

        errors.into_result()?;
        let Some(email) = email else {
            return Err(AppError::invalid("email", "el correo es obligatorio"));
        };
        Ok(NuevoCliente {
            nombre,
            apellidos: texto_opcional(self.apellidos.as_deref()),
            email,
            telefono,
            documento,
            limite_credito: self.limite_credito,
        })
    }
}

/// Body of `POST /api/direcciones`.
#[derive(Debug, Clone, Deserialize)]
pub struct DireccionInput {
    pub cliente_id: ClienteId,
    pub distrito_id: DistritoId,
    pub alias: Option<String>,
    pub direccion: String,
    pub referencia: Option<String>,
    pub latitud: Option<f64>,
    pub longitud: Option<f64>,
    #[serde(default)]
    pub es_principal: bool,
}

impl DireccionInput {
    /// Validate the input.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] listing every invalid field.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();
        errors.check(
            !self.direccion.trim().is_empty(),
            "direccion",
            "la dirección es obligatoria",
        );
        validar_coordenadas(&mut errors, self.latitud, self.longitud);
        errors.into_result()
    }

    #[must_use]
    pub const fn coordenadas(&self) -> Option<Coordenadas> {
        Coordenadas::from_columns(self.latitud, self.longitud)
    }
}

/// Body of `POST /api/direcciones/{id}/validar`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidarDireccionInput {
    /// Cart subtotal used for minimum-order and free-shipping rules.
    pub subtotal: Option<Decimal>,
}

/// Latitude and longitude come together and within range.
pub(crate) fn validar_coordenadas(
    errors: &mut ValidationErrors,
    latitud: Option<f64>,
    longitud: Option<f64>,
) {
    match (latitud, longitud) {
        (Some(lat), Some(lng)) => {
            if !Coordenadas::new(lat, lng).es_valida() {
                errors.add("latitud", "coordenadas fuera de rango");
            }
        }
        (Some(_), None) => errors.add("longitud", "la longitud es obligatoria con la latitud"),
        (None, Some(_)) => errors.add("latitud", "la latitud es obligatoria con la longitud"),
        (None, None) => {}
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cliente_input() -> ClienteInput {
        ClienteInput {
            nombre: " Rosa ".to_string(),
            apellidos: Some("Quispe Mamani".to_string()),
            email: "Rosa.Quispe@Correo.pe".to_string(),
            telefono: Some("+51 987 654 321".to_string()),
            tipo_documento: Some(TipoDocumento::Dni),
            numero_documento: Some("45678912".to_string()),
            limite_credito: dec!(1500),
        }
    }

    fn validation(err: AppError) -> ValidationErrors {
        match err {
            AppError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_cliente_input_normalizes() {
        let nuevo = cliente_input().validate().unwrap();
        assert_eq!(nuevo.nombre, "Rosa");
        assert_eq!(nuevo.email.as_str(), "rosa.quispe@correo.pe");
        assert_eq!(nuevo.documento.unwrap().numero(), "45678912");
    }

    #[test]
    fn test_cliente_input_collects_every_error() {
        let mut input = cliente_input();
        input.email = "sin-arroba".to_string();
        input.numero_documento = Some("123".to_string());
        input.limite_credito = dec!(-1);
        let errors = validation(input.validate().unwrap_err());
        assert!(errors.get("email").is_some());
        assert!(errors.get("numero_documento").is_some());
        assert!(errors.get("limite_credito").is_some());
    }

    #[test]
    fn test_document_number_needs_type() {
        let mut input = cliente_input();
        input.tipo_documento = None;
        let errors = validation(input.validate().unwrap_err());
        assert!(errors.get("tipo_documento").is_some());
    }

    #[test]
    fn test_cliente_credito_disponible() {
        let cliente = Cliente {
            id: ClienteId::new(1),
            nombre: "Rosa".to_string(),
            apellidos: None,
            email: Email::parse("rosa@correo.pe").unwrap(),
            telefono: None,
            documento: None,
            limite_credito: dec!(500),
            credito_usado: dec!(120.50),
            activo: true,
            created_at: Utc::now(),
        };
        assert_eq!(cliente.credito_disponible(), dec!(379.50));
        assert_eq!(cliente.nombre_completo(), "Rosa");
    }

    #[test]
    fn test_direccion_coordinates_come_in_pairs() {
        let input = DireccionInput {
            cliente_id: ClienteId::new(1),
            distrito_id: DistritoId::new(1),
            alias: None,
            direccion: "Av. Arequipa 1234".to_string(),
            referencia: None,
            latitud: Some(-12.09),
            longitud: None,
            es_principal: true,
        };
        let errors = validation(input.validate().unwrap_err());
        assert!(errors.get("longitud").is_some());

        let input = DireccionInput {
            latitud: Some(-120.0),
            longitud: Some(-77.0),
            ..input
        };
        let errors = validation(input.validate().unwrap_err());
        assert_eq!(errors.get("latitud").unwrap(), ["coordenadas fuera de rango"]);
    }
}
