//! Category, product and inventory handlers.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use tienda_core::{CategoriaId, ProductoId};

use super::paginado;
use crate::db::{CategoriaRepository, InventarioRepository, ProductoRepository};
use crate::error::AppError;
use crate::extract::Json;
use crate::models::Paginacion;
use crate::models::catalogo::{Categoria, CategoriaInput, ProductoFiltro, ProductoInput};
use crate::models::pedido::{MovimientoInput, MovimientoRegistrado};
use crate::resources::{ProductoDetalleResource, ProductoResource};
use crate::services::{CatalogoService, InventarioService};
use crate::state::AppState;

/// Build the catalog router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categorias", get(list_categorias).post(create_categoria))
        .route(
            "/api/categorias/{id}",
            get(show_categoria)
                .put(update_categoria)
                .delete(delete_categoria),
        )
        .route("/api/productos", get(list_productos).post(create_producto))
        .route(
            "/api/productos/{id}",
            get(show_producto)
                .put(update_producto)
                .delete(delete_producto),
        )
        .route("/api/productos/{id}/movimientos", get(list_movimientos))
        .route("/api/inventario/movimientos", post(create_movimiento))
}

async fn list_categorias(State(state): State<AppState>) -> Result<Json<Vec<Categoria>>, AppError> {
    let categorias = CategoriaRepository::new(state.pool()).list().await?;
    Ok(Json(categorias))
}

async fn show_categoria(
    State(state): State<AppState>,
    Path(id): Path<CategoriaId>,
) -> Result<Json<Categoria>, AppError> {
    CategoriaRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("categoría", id))
}

async fn create_categoria(
    State(state): State<AppState>,
    Json(input): Json<CategoriaInput>,
) -> Result<impl IntoResponse, AppError> {
    input.validate()?;
    let categoria = CategoriaRepository::new(state.pool()).create(&input).await?;
    tracing::info!(categoria_id = %categoria.id, "category created");
    Ok((StatusCode::CREATED, Json(categoria)))
}

async fn update_categoria(
    State(state): State<AppState>,
    Path(id): Path<CategoriaId>,
    Json(input): Json<CategoriaInput>,
) -> Result<Json<Categoria>, AppError> {
    input.validate()?;
    let categoria = CategoriaRepository::new(state.pool())
        .update(id, &input)
        .await?;
    Ok(Json(categoria))
}

async fn delete_categoria(
    State(state): State<AppState>,
    Path(id): Path<CategoriaId>,
) -> Result<StatusCode, AppError> {
    CategoriaRepository::new(state.pool()).soft_delete(id).await?;
    tracing::info!(categoria_id = %id, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_productos(
    State(state): State<AppState>,
    Query(filtro): Query<ProductoFiltro>,
) -> Result<impl IntoResponse, AppError> {
    let (productos, total) = ProductoRepository::new(state.pool()).list(&filtro).await?;
    let items: Vec<ProductoResource> = productos.into_iter().map(Into::into).collect();
    Ok(paginado(items, total))
}

async fn show_producto(
    State(state): State<AppState>,
    Path(id): Path<ProductoId>,
) -> Result<Json<ProductoDetalleResource>, AppError> {
    ProductoRepository::new(state.pool())
        .detalle(id)
        .await?
        .map(|detalle| Json(detalle.into()))
        .ok_or_else(|| AppError::not_found("producto", id))
}

async fn create_producto(
    State(state): State<AppState>,
    Json(input): Json<ProductoInput>,
) -> Result<impl IntoResponse, AppError> {
    let producto = CatalogoService::new(state.pool())
        .crear_producto(&input)
        .await?;
    Ok((StatusCode::CREATED, Json(ProductoResource::from(producto))))
}

async fn update_producto(
    State(state): State<AppState>,
    Path(id): Path<ProductoId>,
    Json(input): Json<ProductoInput>,
) -> Result<Json<ProductoResource>, AppError> {
    input.validate()?;
    let producto = ProductoRepository::new(state.pool())
        .update(id, &input)
        .await?;
    Ok(Json(producto.into()))
}

async fn delete_producto(
    State(state): State<AppState>,
    Path(id): Path<ProductoId>,
) -> Result<StatusCode, AppError> {
    ProductoRepository::new(state.pool()).soft_delete(id).await?;
    tracing::info!(producto_id = %id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_movimientos(
    State(state): State<AppState>,
    Path(id): Path<ProductoId>,
    Query(paginacion): Query<Paginacion>,
) -> Result<Json<Vec<MovimientoRegistrado>>, AppError> {
    if ProductoRepository::new(state.pool()).get(id).await?.is_none() {
        return Err(AppError::not_found("producto", id));
    }
    let movimientos = InventarioRepository::new(state.pool())
        .list_by_producto(id, paginacion)
        .await?;
    Ok(Json(movimientos))
}

async fn create_movimiento(
    State(state): State<AppState>,
    Json(input): Json<MovimientoInput>,
) -> Result<impl IntoResponse, AppError> {
    let movimiento = InventarioService::new(state.pool())
        .registrar(&input)
        .await?;
    Ok((StatusCode::CREATED, Json(movimiento)))
}
