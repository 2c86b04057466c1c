//! Shipping quote command.
//!
//! Runs the same quote as `POST /api/envio/cotizar` against the zones in the
//! database and prints the result as JSON.

use rust_decimal::Decimal;
use tracing::info;

use tienda_api::models::reparto::CotizarInput;
use tienda_api::services::RepartoService;
use tienda_api::state::AppState;
use tienda_core::{DistritoId, ZonaRepartoId};

/// Arguments of `tienda-cli cotizar`.
#[derive(Debug, Clone)]
pub struct Consulta {
    pub distrito_id: Option<i32>,
    pub latitud: Option<f64>,
    pub longitud: Option<f64>,
    pub subtotal: Decimal,
    pub zona_reparto_id: Option<i32>,
}

impl Consulta {
    fn input(&self) -> CotizarInput {
        CotizarInput {
            distrito_id: self.distrito_id.map(DistritoId::new),
            latitud: self.latitud,
            longitud: self.longitud,
            subtotal: self.subtotal,
            zona_reparto_id: self.zona_reparto_id.map(ZonaRepartoId::new),
        }
    }
}

/// Quote shipping and print the quote.
///
/// # Errors
///
/// Returns an error if the database is unreachable or no zone can deliver.
pub async fn run(consulta: &Consulta) -> Result<(), Box<dyn std::error::Error>> {
    let (config, pool) = super::connect().await?;
    let state = AppState::new(config, pool);

    let cotizacion = RepartoService::new(&state).cotizar(&consulta.input()).await?;
    info!(
        zona = %cotizacion.cotizacion.zona_nombre,
        costo = %cotizacion.costo_envio_formateado,
        tiempo = %cotizacion.tiempo_entrega_texto,
        "Quote ready"
    );

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&cotizacion)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consulta_builds_typed_input() {
        let consulta = Consulta {
            distrito_id: Some(3),
            latitud: None,
            longitud: None,
            subtotal: Decimal::new(4500, 2),
            zona_reparto_id: None,
        };
        let input = consulta.input();
        assert_eq!(input.distrito_id, Some(DistritoId::new(3)));
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_consulta_without_location_is_rejected() {
        let consulta = Consulta {
            distrito_id: None,
            latitud: None,
            longitud: None,
            subtotal: Decimal::ZERO,
            zona_reparto_id: None,
        };
        assert!(consulta.input().validate().is_err());
    }
}
