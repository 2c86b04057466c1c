//! Delivery zone and shipping quote handlers.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use tienda_core::ZonaRepartoId;

use crate::error::AppError;
use crate::extract::Json;
use crate::models::reparto::{CotizarInput, ExcepcionInput, ZonaInput};
use crate::resources::{CotizacionResource, ZonaResource};
use crate::services::RepartoService;
use crate::state::AppState;

/// Build the delivery router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/zonas", get(list_zonas).post(create_zona))
        .route("/api/zonas/{id}", get(show_zona).put(update_zona))
        .route("/api/zonas/{id}/excepciones", post(create_excepcion))
        .route("/api/envio/cotizar", post(cotizar))
}

async fn list_zonas(State(state): State<AppState>) -> Result<Json<Vec<ZonaResource>>, AppError> {
    let zonas = state.zonas().todas(state.pool()).await?;
    Ok(Json(zonas.iter().cloned().map(Into::into).collect()))
}

async fn show_zona(
    State(state): State<AppState>,
    Path(id): Path<ZonaRepartoId>,
) -> Result<Json<ZonaResource>, AppError> {
    let zonas = state.zonas().todas(state.pool()).await?;
    zonas
        .iter()
        .find(|z| z.zona.id == id)
        .map(|config| Json(config.clone().into()))
        .ok_or_else(|| AppError::not_found("zona", id))
}

async fn create_zona(
    State(state): State<AppState>,
    Json(input): Json<ZonaInput>,
) -> Result<impl IntoResponse, AppError> {
    let config = RepartoService::new(&state).crear_zona(&input).await?;
    Ok((StatusCode::CREATED, Json(ZonaResource::from(config))))
}

async fn update_zona(
    State(state): State<AppState>,
    Path(id): Path<ZonaRepartoId>,
    Json(input): Json<ZonaInput>,
) -> Result<Json<ZonaResource>, AppError> {
    let config = RepartoService::new(&state)
        .actualizar_zona(id, &input)
        .await?;
    Ok(Json(config.into()))
}

async fn create_excepcion(
    State(state): State<AppState>,
    Path(id): Path<ZonaRepartoId>,
    Json(input): Json<ExcepcionInput>,
) -> Result<impl IntoResponse, AppError> {
    let excepcion = RepartoService::new(&state)
        .agregar_excepcion(id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(excepcion)))
}

async fn cotizar(
    State(state): State<AppState>,
    Json(input): Json<CotizarInput>,
) -> Result<Json<CotizacionResource>, AppError> {
    let cotizacion = RepartoService::new(&state).cotizar(&input).await?;
    Ok(Json(cotizacion))
}
