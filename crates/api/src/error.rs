//! Unified error handling for the API.
//!
//! Every handler returns `Result<_, AppError>`. Validation failures and
//! business-rule rejections become `422` with per-field messages:
//!
//! ```json
//! { "message": "Los datos enviados no son válidos.", "errors": { "cantidad": ["..."] } }
//! ```

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use tienda_core::catalogo::SeleccionInvalida;
use tienda_core::credito::CreditoRechazo;
use tienda_core::cupon::CuponRechazo;
use tienda_core::inventario::MovimientoRechazo;
use tienda_core::pedido::TransicionInvalida;
use tienda_core::reparto::RechazoCobertura;
use tienda_core::DocumentoError;

use crate::db::RepositoryError;

const VALIDATION_MESSAGE: &str = "Los datos enviados no son válidos.";

/// Field name to messages, in stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors with a single message for one field.
    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Add `message` for `field` when `condition` is false.
    pub fn check(&mut self, condition: bool, field: &str, message: impl Into<String>) {
        if !condition {
            self.add(field, message);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] carrying every recorded message.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Request data or a business rule was rejected.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Write conflicts with existing data.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// A 422 for a single field.
    #[must_use]
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::single(field, message))
    }

    /// A 404 naming the missing record.
    #[must_use]
    pub fn not_found(recurso: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{recurso} {id}"))
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a ValidationErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "API request error"
            );
        }

        // Don't expose internal error details to clients
        let body = match &self {
            Self::Validation(errors) => ErrorBody {
                message: VALIDATION_MESSAGE.to_string(),
                errors: Some(errors),
            },
            _ if status.is_server_error() => ErrorBody {
                message: "Internal server error".to_string(),
                errors: None,
            },
            Self::Database(RepositoryError::NotFound) => ErrorBody {
                message: "Not found".to_string(),
                errors: None,
            },
            Self::Database(RepositoryError::Conflict(msg)) => ErrorBody {
                message: msg.clone(),
                errors: None,
            },
            _ => ErrorBody {
                message: self.to_string(),
                errors: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Domain rejections
// =============================================================================

impl From<CuponRechazo> for AppError {
    fn from(err: CuponRechazo) -> Self {
        Self::invalid("cupon", err.to_string())
    }
}

impl From<CreditoRechazo> for AppError {
    fn from(err: CreditoRechazo) -> Self {
        let field = match err {
            CreditoRechazo::NumeroCuotasInvalido | CreditoRechazo::CuotaMinima { .. } => {
                "numero_cuotas"
            }
            CreditoRechazo::MontoInvalido | CreditoRechazo::CuotaPagada => "monto",
            CreditoRechazo::LimiteExcedido { .. } => "credito",
        };
        Self::invalid(field, err.to_string())
    }
}

impl From<RechazoCobertura> for AppError {
    fn from(err: RechazoCobertura) -> Self {
        let field = match err {
            RechazoCobertura::PedidoMinimoNoAlcanzado { .. } => "subtotal",
            _ => "direccion",
        };
        Self::invalid(field, err.to_string())
    }
}

impl From<MovimientoRechazo> for AppError {
    fn from(err: MovimientoRechazo) -> Self {
        Self::invalid("cantidad", err.to_string())
    }
}

impl From<TransicionInvalida> for AppError {
    fn from(err: TransicionInvalida) -> Self {
        Self::invalid("estado", err.to_string())
    }
}

impl From<SeleccionInvalida> for AppError {
    fn from(err: SeleccionInvalida) -> Self {
        Self::invalid("adicionales", err.to_string())
    }
}

impl From<DocumentoError> for AppError {
    fn from(err: DocumentoError) -> Self {
        Self::invalid("numero_documento", err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(RepositoryError::from(err))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use rust_decimal_macros::dec;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::not_found("pedido", 123);
        assert_eq!(err.to_string(), "Not found: pedido 123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict("x".into()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::invalid("nombre", "requerido")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_validation_body_lists_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("nombre", "es obligatorio");
        errors.add("precio", "debe ser mayor o igual a 0");
        errors.add("precio", "debe tener 2 decimales");

        let body = body_json(AppError::Validation(errors).into_response()).await;
        assert_eq!(body["message"], VALIDATION_MESSAGE);
        assert_eq!(body["errors"]["nombre"][0], "es obligatorio");
        assert_eq!(body["errors"]["precio"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let body = body_json(AppError::Internal("pool exhausted".to_string()).into_response()).await;
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get("errors").is_none());
    }

    #[test]
    fn test_domain_rejections_map_to_fields() {
        let err = AppError::from(CreditoRechazo::LimiteExcedido {
            disponible: dec!(20),
        });
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.get("credito").unwrap(),
            ["límite de crédito excedido, disponible: S/ 20.00"]
        );

        let err = AppError::from(CreditoRechazo::CuotaMinima { numero_cuotas: 24 });
        assert!(matches!(&err, AppError::Validation(e) if e.get("numero_cuotas").is_some()));

        let err = AppError::from(RechazoCobertura::PedidoMinimoNoAlcanzado { minimo: dec!(30) });
        assert!(matches!(&err, AppError::Validation(e) if e.get("subtotal").is_some()));
    }

    #[test]
    fn test_validation_errors_into_result() {
        let mut errors = ValidationErrors::new();
        errors.check(true, "a", "never");
        assert!(errors.clone().into_result().is_ok());
        errors.check(false, "b", "always");
        assert_eq!(errors.to_string(), "b: always");
        assert!(errors.into_result().is_err());
    }
}
