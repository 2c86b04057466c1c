//! Customer and address handlers.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use tienda_core::{ClienteId, DireccionId};

use super::paginado;
use crate::db::{ClienteRepository, DireccionRepository, PedidoRepository};
use crate::error::AppError;
use crate::extract::Json;
use crate::models::Paginacion;
use crate::models::cliente::{
    ClienteInput, Direccion, DireccionInput, DireccionValidada, ValidarDireccionInput,
};
use crate::resources::{ClienteResource, PedidoResource};
use crate::services::RepartoService;
use crate::state::AppState;

/// Build the customer router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/clientes", post(create_cliente))
        .route("/api/clientes/{id}", get(show_cliente))
        .route("/api/clientes/{id}/direcciones", get(list_direcciones))
        .route("/api/clientes/{id}/pedidos", get(list_pedidos))
        .route("/api/direcciones", post(create_direccion))
        .route("/api/direcciones/{id}/validar", post(validar_direccion))
}

async fn create_cliente(
    State(state): State<AppState>,
    Json(input): Json<ClienteInput>,
) -> Result<impl IntoResponse, AppError> {
    let nuevo = input.validate()?;
    let cliente = ClienteRepository::new(state.pool()).create(&nuevo).await?;
    tracing::info!(cliente_id = %cliente.id, "customer created");
    Ok((StatusCode::CREATED, Json(ClienteResource::from(cliente))))
}

async fn show_cliente(
    State(state): State<AppState>,
    Path(id): Path<ClienteId>,
) -> Result<Json<ClienteResource>, AppError> {
    ClienteRepository::new(state.pool())
        .get(id)
        .await?
        .map(|cliente| Json(cliente.into()))
        .ok_or_else(|| AppError::not_found("cliente", id))
}

async fn list_direcciones(
    State(state): State<AppState>,
    Path(id): Path<ClienteId>,
) -> Result<Json<Vec<Direccion>>, AppError> {
    if ClienteRepository::new(state.pool()).get(id).await?.is_none() {
        return Err(AppError::not_found("cliente", id));
    }
    let direcciones = DireccionRepository::new(state.pool())
        .list_by_cliente(id)
        .await?;
    Ok(Json(direcciones))
}

async fn list_pedidos(
    State(state): State<AppState>,
    Path(id): Path<ClienteId>,
    Query(paginacion): Query<Paginacion>,
) -> Result<impl IntoResponse, AppError> {
    if ClienteRepository::new(state.pool()).get(id).await?.is_none() {
        return Err(AppError::not_found("cliente", id));
    }
    let (pedidos, total) = PedidoRepository::new(state.pool())
        .list_by_cliente(id, paginacion)
        .await?;
    let items: Vec<PedidoResource> = pedidos.into_iter().map(Into::into).collect();
    Ok(paginado(items, total))
}

async fn create_direccion(
    State(state): State<AppState>,
    Json(input): Json<DireccionInput>,
) -> Result<impl IntoResponse, AppError> {
    input.validate()?;
    let direccion = DireccionRepository::new(state.pool()).create(&input).await?;
    tracing::info!(
        direccion_id = %direccion.id,
        cliente_id = %direccion.cliente_id,
        "address created"
    );
    Ok((StatusCode::CREATED, Json(direccion)))
}

async fn validar_direccion(
    State(state): State<AppState>,
    Path(id): Path<DireccionId>,
    body: Option<axum::Json<ValidarDireccionInput>>,
) -> Result<Json<DireccionValidada>, AppError> {
    // The body is optional; without one the zone minimum stands in for the cart.
    let input = body.map(|axum::Json(input)| input).unwrap_or_default();
    let validada = RepartoService::new(&state)
        .validar_direccion(id, &input)
        .await?;
    Ok(Json(validada))
}
