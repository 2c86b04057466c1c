//! Delivery zones: coverage, shipping cost and delivery time resolution.
//!
//! A raw address (distrito plus optional coordinates) is mapped to a
//! [`ZonaConfig`], then priced by [`cotizar`]:
//!
//! 1. The `ZonaDistrito` row for the address's distrito overrides the zone
//!    defaults.
//! 2. The `CostoEnvioDinamico` tier whose `[desde, hasta)` bracket contains
//!    the distance to the zone centre replaces the base cost.
//! 3. `ExcepcionZona` rows active at the request date/time override
//!    availability, cost, opening hours or delivery time.
//!
//! All date/time inputs are local store time; the caller converts from UTC.

mod cotizacion;
mod geo;
mod zona;

pub use cotizacion::{
    CotizacionEnvio, OrigenCosto, RechazoCobertura, SolicitudEnvio, cotizar, cotizar_mejor,
    resolver_zona, tiempo_entrega_texto, ventana_entrega,
};
pub use geo::{Coordenadas, EARTH_RADIUS_KM, distancia_km};
pub use zona::{
    CostoEnvioDinamico, ExcepcionZona, HorarioZona, ZonaConfig, ZonaDistrito, ZonaReparto,
    dia_semana,
};
