//! Checkout, order state, payment and installment handlers.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};

use tienda_core::{CuotaCreditoId, PedidoId};

use crate::db::{CuotaRepository, PagoRepository, PedidoRepository};
use crate::error::AppError;
use crate::extract::Json;
use crate::models::pedido::{CambioEstadoInput, CheckoutInput, PagoCuotaInput, PagoInput};
use crate::resources::{CuotaResource, PagoResource, PedidoCompletoResource, PedidoResource};
use crate::services::credito::PagoCuota;
use crate::services::{CheckoutService, CreditoService, PedidoService};
use crate::state::AppState;

/// Build the order router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/pedidos", post(checkout))
        .route("/api/pedidos/{id}", get(show_pedido))
        .route("/api/pedidos/{id}/estado", patch(cambiar_estado))
        .route(
            "/api/pedidos/{id}/pagos",
            get(list_pagos).post(registrar_pago),
        )
        .route("/api/pedidos/{id}/cuotas", get(list_cuotas))
        .route("/api/cuotas/{id}/pagar", post(pagar_cuota))
}

async fn checkout(
    State(state): State<AppState>,
    Json(input): Json<CheckoutInput>,
) -> Result<impl IntoResponse, AppError> {
    let completo = CheckoutService::new(&state).procesar(&input).await?;
    let config = state.config();
    Ok((
        StatusCode::CREATED,
        Json(PedidoCompletoResource::new(
            completo,
            config.hoy(),
            config.mora_diaria,
        )),
    ))
}

async fn show_pedido(
    State(state): State<AppState>,
    Path(id): Path<PedidoId>,
) -> Result<Json<PedidoCompletoResource>, AppError> {
    let config = state.config();
    PedidoRepository::new(state.pool())
        .get_completo(id)
        .await?
        .map(|completo| {
            Json(PedidoCompletoResource::new(
                completo,
                config.hoy(),
                config.mora_diaria,
            ))
        })
        .ok_or_else(|| AppError::not_found("pedido", id))
}

async fn cambiar_estado(
    State(state): State<AppState>,
    Path(id): Path<PedidoId>,
    Json(input): Json<CambioEstadoInput>,
) -> Result<Json<PedidoResource>, AppError> {
    let pedido = PedidoService::new(&state).cambiar_estado(id, &input).await?;
    Ok(Json(pedido.into()))
}

async fn list_pagos(
    State(state): State<AppState>,
    Path(id): Path<PedidoId>,
) -> Result<Json<Vec<PagoResource>>, AppError> {
    if PedidoRepository::new(state.pool()).get(id).await?.is_none() {
        return Err(AppError::not_found("pedido", id));
    }
    let pagos = PagoRepository::new(state.pool()).list_by_pedido(id).await?;
    Ok(Json(pagos.into_iter().map(Into::into).collect()))
}

async fn registrar_pago(
    State(state): State<AppState>,
    Path(id): Path<PedidoId>,
    Json(input): Json<PagoInput>,
) -> Result<impl IntoResponse, AppError> {
    let pago = PedidoService::new(&state).registrar_pago(id, &input).await?;
    Ok((StatusCode::CREATED, Json(PagoResource::from(pago))))
}

async fn list_cuotas(
    State(state): State<AppState>,
    Path(id): Path<PedidoId>,
) -> Result<Json<Vec<CuotaResource>>, AppError> {
    if PedidoRepository::new(state.pool()).get(id).await?.is_none() {
        return Err(AppError::not_found("pedido", id));
    }
    let config = state.config();
    let hoy = config.hoy();
    let cuotas = CuotaRepository::new(state.pool()).list_by_pedido(id).await?;
    Ok(Json(
        cuotas
            .into_iter()
            .map(|cuota| CuotaResource::new(cuota, hoy, config.mora_diaria))
            .collect(),
    ))
}

/// An installment payment: the updated installment and the payment row.
#[derive(Debug, serde::Serialize)]
struct PagoCuotaResource {
    cuota: CuotaResource,
    pago: PagoResource,
}

async fn pagar_cuota(
    State(state): State<AppState>,
    Path(id): Path<CuotaCreditoId>,
    Json(input): Json<PagoCuotaInput>,
) -> Result<Json<PagoCuotaResource>, AppError> {
    let PagoCuota { cuota, pago } = CreditoService::new(&state).pagar_cuota(id, &input).await?;
    let config = state.config();
    Ok(Json(PagoCuotaResource {
        cuota: CuotaResource::new(cuota, config.hoy(), config.mora_diaria),
        pago: pago.into(),
    }))
}
