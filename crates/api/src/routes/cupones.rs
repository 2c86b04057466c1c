//! Coupon handlers.

use axum::{Router, extract::State, routing::post};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use tienda_core::{TipoCupon, format_soles};

use crate::db::CuponRepository;
use crate::error::AppError;
use crate::extract::Json;
use crate::models::cupon::ValidarCuponInput;
use crate::state::AppState;

/// Build the coupon router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/cupones/validar", post(validar))
}

/// A coupon that applies to the given subtotal.
#[derive(Debug, Serialize)]
pub struct CuponValidado {
    pub codigo: String,
    pub tipo: TipoCupon,
    pub valor: Decimal,
    pub descuento: Decimal,
    pub descuento_formateado: String,
    pub subtotal_con_descuento: Decimal,
}

/// Check a coupon without using it.
///
/// An unknown code is a `422` on `codigo`, like any other coupon that does
/// not apply.
async fn validar(
    State(state): State<AppState>,
    Json(input): Json<ValidarCuponInput>,
) -> Result<Json<CuponValidado>, AppError> {
    let codigo = input.validate()?;
    let cupon = CuponRepository::new(state.pool())
        .get_por_codigo(&codigo)
        .await?
        .ok_or_else(|| AppError::invalid("codigo", "el cupón no existe"))?;

    cupon.puede_usarse(Utc::now(), input.subtotal)?;
    let descuento = cupon.calcular_descuento(input.subtotal);

    Ok(Json(CuponValidado {
        codigo: cupon.codigo,
        tipo: cupon.tipo,
        valor: cupon.valor,
        descuento_formateado: format_soles(descuento),
        subtotal_con_descuento: input.subtotal - descuento,
        descuento,
    }))
}
