//! Shipping quotes, address validation and zone writes.
//!
//! Quotes read zones from the in-memory cache; every zone write drops it.

use tracing::{info, instrument, warn};

use tienda_core::reparto::{
    CotizacionEnvio, ExcepcionZona, RechazoCobertura, SolicitudEnvio, ZonaConfig, cotizar,
    cotizar_mejor, resolver_zona,
};
use tienda_core::{DireccionId, ZonaRepartoId};

use crate::db::clientes::NuevaValidacion;
use crate::db::{DireccionRepository, ZonaRepository};
use crate::error::AppError;
use crate::models::cliente::{DireccionValidada, ValidarDireccionInput};
use crate::models::reparto::{CotizarInput, ExcepcionInput, ZonaInput};
use crate::resources::CotizacionResource;
use crate::state::AppState;

pub struct RepartoService<'a> {
    state: &'a AppState,
}

impl<'a> RepartoService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Quote shipping for a distrito and/or coordinates at the current
    /// store time.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the input is invalid or no zone can
    /// deliver, `NotFound` for an unknown `zona_reparto_id`.
    #[instrument(skip(self, input), fields(distrito_id = ?input.distrito_id))]
    pub async fn cotizar(&self, input: &CotizarInput) -> Result<CotizacionResource, AppError> {
        input.validate()?;

        let momento = self.state.config().ahora_local();
        let solicitud = input.solicitud(momento);
        let zonas = self.state.zonas().todas(self.state.pool()).await?;

        let cotizacion = match input.zona_reparto_id {
            Some(id) => {
                let config = zonas
                    .iter()
                    .find(|z| z.zona.id == id)
                    .ok_or_else(|| AppError::not_found("zona", id))?;
                cotizar(config, &solicitud)?
            }
            None => cotizar_mejor(&zonas, &solicitud)?,
        };

        Ok(CotizacionResource::new(cotizacion, momento))
    }

    /// Resolve the zone serving an address and store the outcome.
    ///
    /// An address is valid when some zone can deliver to it now. Without a
    /// subtotal the zone minimum is assumed, so a fresh address is not
    /// rejected for an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown address.
    #[instrument(skip(self, input))]
    pub async fn validar_direccion(
        &self,
        direccion_id: DireccionId,
        input: &ValidarDireccionInput,
    ) -> Result<DireccionValidada, AppError> {
        let repo = DireccionRepository::new(self.state.pool());
        let direccion = repo
            .get(direccion_id)
            .await?
            .ok_or_else(|| AppError::not_found("dirección", direccion_id))?;

        let zonas = self.state.zonas().todas(self.state.pool()).await?;
        let mut solicitud = SolicitudEnvio {
            distrito_id: Some(direccion.distrito_id),
            coordenadas: direccion.coordenadas,
            subtotal: input.subtotal.unwrap_or_default(),
            momento: self.state.config().ahora_local(),
        };

        let mut resultado = cotizar_mejor(&zonas, &solicitud);
        if input.subtotal.is_none()
            && let Err(RechazoCobertura::PedidoMinimoNoAlcanzado { minimo }) = resultado
        {
            solicitud.subtotal = minimo;
            resultado = cotizar_mejor(&zonas, &solicitud);
        }

        let validacion = match resultado {
            Ok(cotizacion) => validacion_aceptada(direccion_id, &cotizacion),
            Err(rechazo) => {
                warn!(%rechazo, "address cannot be served");
                NuevaValidacion {
                    direccion_id,
                    zona_reparto_id: resolver_zona(&zonas, &solicitud).map(|z| z.zona.id),
                    es_valida: false,
                    distancia_km: None,
                    costo_envio: None,
                    tiempo_entrega_min: None,
                    tiempo_entrega_max: None,
                    mensaje: Some(rechazo.to_string()),
                }
            }
        };

        Ok(repo.registrar_validacion(&validacion).await?)
    }

    /// Create a zone with its distritos, tiers and schedules.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad input and `Conflict` for an
    /// unknown distrito.
    #[instrument(skip(self, input), fields(nombre = %input.nombre))]
    pub async fn crear_zona(&self, input: &ZonaInput) -> Result<ZonaConfig, AppError> {
        input.validate()?;
        let config = ZonaRepository::new(self.state.pool()).create(input).await?;
        self.state.zonas().invalidate().await;
        Ok(config)
    }

    /// Replace a zone's settings, distritos, tiers and schedules.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad input, `NotFound` for an unknown
    /// zone and `Conflict` for an unknown distrito.
    #[instrument(skip(self, input))]
    pub async fn actualizar_zona(
        &self,
        id: ZonaRepartoId,
        input: &ZonaInput,
    ) -> Result<ZonaConfig, AppError> {
        input.validate()?;
        let config = ZonaRepository::new(self.state.pool())
            .update(id, input)
            .await?;
        self.state.zonas().invalidate().await;
        Ok(config)
    }

    /// Add a dated exception to a zone.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad input and `NotFound` for an
    /// unknown zone.
    #[instrument(skip(self, input), fields(tipo = %input.tipo))]
    pub async fn agregar_excepcion(
        &self,
        zona_id: ZonaRepartoId,
        input: &ExcepcionInput,
    ) -> Result<ExcepcionZona, AppError> {
        input.validate()?;
        let excepcion = ZonaRepository::new(self.state.pool())
            .add_excepcion(zona_id, input)
            .await?;
        self.state.zonas().invalidate().await;
        info!(excepcion_id = %excepcion.id, "zone exception added");
        Ok(excepcion)
    }
}

fn validacion_aceptada(direccion_id: DireccionId, cotizacion: &CotizacionEnvio) -> NuevaValidacion {
    NuevaValidacion {
        direccion_id,
        zona_reparto_id: Some(cotizacion.zona_reparto_id),
        es_valida: true,
        distancia_km: cotizacion.distancia_km,
        costo_envio: Some(cotizacion.costo_envio),
        tiempo_entrega_min: Some(cotizacion.tiempo_entrega_min),
        tiempo_entrega_max: Some(cotizacion.tiempo_entrega_max),
        mensaje: Some(format!(
            "{} - envío {}, {}",
            cotizacion.zona_nombre,
            cotizacion.costo_envio_formateado(),
            cotizacion.tiempo_entrega_texto()
        )),
    }
}
