//! Database operations for products, variations, images and additionals.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use tienda_core::{
    AdicionalId, CategoriaId, GrupoAdicionalId, ProductoId, ProductoImagenId, VariacionId,
};

use super::RepositoryError;
use super::categorias::{CATEGORIA_COLUMNS, CategoriaRow};
use crate::models::catalogo::{
    Adicional, GrupoAdicional, Producto, ProductoDetalle, ProductoFiltro, ProductoImagen,
    ProductoInput, Variacion,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductoRow {
    id: i32,
    categoria_id: i32,
    nombre: String,
    slug: String,
    sku: Option<String>,
    descripcion: Option<String>,
    precio: Decimal,
    precio_oferta: Option<Decimal>,
    stock: i32,
    stock_minimo: i32,
    imagen_principal: Option<String>,
    destacado: bool,
    activo: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductoRow> for Producto {
    fn from(row: ProductoRow) -> Self {
        Self {
            id: ProductoId::new(row.id),
            categoria_id: CategoriaId::new(row.categoria_id),
            nombre: row.nombre,
            slug: row.slug,
            sku: row.sku,
            descripcion: row.descripcion,
            precio: row.precio,
            precio_oferta: row.precio_oferta,
            stock: row.stock,
            stock_minimo: row.stock_minimo,
            imagen_principal: row.imagen_principal,
            destacado: row.destacado,
            activo: row.activo,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VariacionRow {
    id: i32,
    producto_id: i32,
    nombre: String,
    sku: Option<String>,
    precio_adicional: Decimal,
    stock: i32,
    activo: bool,
}

impl From<VariacionRow> for Variacion {
    fn from(row: VariacionRow) -> Self {
        Self {
            id: VariacionId::new(row.id),
            producto_id: ProductoId::new(row.producto_id),
            nombre: row.nombre,
            sku: row.sku,
            precio_adicional: row.precio_adicional,
            stock: row.stock,
            activo: row.activo,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ImagenRow {
    id: i32,
    producto_id: i32,
    url: String,
    alt: Option<String>,
    orden: i32,
}

impl From<ImagenRow> for ProductoImagen {
    fn from(row: ImagenRow) -> Self {
        Self {
            id: ProductoImagenId::new(row.id),
            producto_id: ProductoId::new(row.producto_id),
            url: row.url,
            alt: row.alt,
            orden: row.orden,
        }
    }
}

/// A group as attached to one product through the pivot table.
#[derive(Debug, sqlx::FromRow)]
struct GrupoRow {
    producto_id: i32,
    id: i32,
    nombre: String,
    descripcion: Option<String>,
    seleccion_minima: i32,
    seleccion_maxima: Option<i32>,
    obligatorio: bool,
    orden: i32,
    activo: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct AdicionalRow {
    id: i32,
    grupo_adicional_id: i32,
    nombre: String,
    precio: Decimal,
    orden: i32,
    activo: bool,
}

impl From<AdicionalRow> for Adicional {
    fn from(row: AdicionalRow) -> Self {
        Self {
            id: AdicionalId::new(row.id),
            grupo_adicional_id: GrupoAdicionalId::new(row.grupo_adicional_id),
            nombre: row.nombre,
            precio: row.precio,
            orden: row.orden,
            activo: row.activo,
        }
    }
}

const PRODUCTO_COLUMNS: &str = "id, categoria_id, nombre, slug, sku, descripcion, precio, \
     precio_oferta, stock, stock_minimo, imagen_principal, destacado, activo, created_at, updated_at";

const VARIACION_COLUMNS: &str = "id, producto_id, nombre, sku, precio_adicional, stock, activo";

const LISTADO_FILTRO: &str = "deleted_at IS NULL AND activo \
     AND ($1::int IS NULL OR categoria_id = $1) \
     AND ($2::text IS NULL OR nombre ILIKE $2 OR descripcion ILIKE $2 OR sku ILIKE $2) \
     AND ($3::bool IS NULL OR destacado = $3)";

fn map_write_error(err: sqlx::Error) -> RepositoryError {
    match RepositoryError::unique_or_database(err, "ya existe un producto con ese slug o sku") {
        RepositoryError::Database(err) => {
            RepositoryError::foreign_key_or_database(err, "la categoría no existe")
        }
        other => other,
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
pub struct ProductoRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductoRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List active products matching `filtro`, with the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filtro: &ProductoFiltro,
    ) -> Result<(Vec<Producto>, i64), RepositoryError> {
        let patron = filtro.patron_busqueda();
        let paginacion = filtro.paginacion();

        let (total,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM productos WHERE {LISTADO_FILTRO}"))
                .bind(filtro.categoria_id)
                .bind(patron.as_deref())
                .bind(filtro.destacado)
                .fetch_one(self.pool)
                .await?;

        let rows = sqlx::query_as::<_, ProductoRow>(&format!(
            "SELECT {PRODUCTO_COLUMNS} FROM productos WHERE {LISTADO_FILTRO} \
             ORDER BY destacado DESC, nombre, id \
             LIMIT $4 OFFSET $5"
        ))
        .bind(filtro.categoria_id)
        .bind(patron.as_deref())
        .bind(filtro.destacado)
        .bind(paginacion.limit())
        .bind(paginacion.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductoId) -> Result<Option<Producto>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductoRow>(&format!(
            "SELECT {PRODUCTO_COLUMNS} FROM productos WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get a product with its category, variations, images and additional groups.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn detalle(&self, id: ProductoId) -> Result<Option<ProductoDetalle>, RepositoryError> {
        let Some(producto) = self.get(id).await? else {
            return Ok(None);
        };

        let categoria = sqlx::query_as::<_, CategoriaRow>(&format!(
            "SELECT {CATEGORIA_COLUMNS} FROM categorias WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(producto.categoria_id)
        .fetch_optional(self.pool)
        .await?
        .map(Into::into);

        let variaciones = sqlx::query_as::<_, VariacionRow>(&format!(
            "SELECT {VARIACION_COLUMNS} FROM variaciones \
             WHERE producto_id = $1 AND activo ORDER BY id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        let imagenes = sqlx::query_as::<_, ImagenRow>(
            "SELECT id, producto_id, url, alt, orden FROM producto_imagenes \
             WHERE producto_id = $1 ORDER BY orden, id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        let mut conn = self.pool.acquire().await?;
        let grupos = grupos_por_producto(&mut conn, &[id])
            .await?
            .remove(&id)
            .unwrap_or_default();

        Ok(Some(ProductoDetalle {
            producto,
            categoria,
            variaciones,
            imagenes,
            grupos,
        }))
    }

    /// Update a product. Stock is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist and
    /// `RepositoryError::Conflict` for a duplicate slug or sku.
    pub async fn update(
        &self,
        id: ProductoId,
        input: &ProductoInput,
    ) -> Result<Producto, RepositoryError> {
        let row = sqlx::query_as::<_, ProductoRow>(&format!(
            "UPDATE productos SET \
                 categoria_id = $2, nombre = $3, slug = $4, sku = $5, descripcion = $6, \
                 precio = $7, precio_oferta = $8, stock_minimo = $9, imagen_principal = $10, \
                 destacado = $11, activo = $12 \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {PRODUCTO_COLUMNS}"
        ))
        .bind(id)
        .bind(input.categoria_id)
        .bind(input.nombre.trim())
        .bind(input.slug())
        .bind(input.sku())
        .bind(input.descripcion())
        .bind(input.precio)
        .bind(input.precio_oferta)
        .bind(input.stock_minimo)
        .bind(input.imagen_principal.as_deref())
        .bind(input.destacado)
        .bind(input.activo)
        .fetch_optional(self.pool)
        .await
        .map_err(map_write_error)?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Soft-delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn soft_delete(&self, id: ProductoId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE productos SET deleted_at = NOW(), activo = FALSE \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

// =============================================================================
// Transactional operations
// =============================================================================

/// Insert a product with zero stock.
///
/// Initial stock is added afterwards as an `entrada` movement so that the
/// stock ledger explains every unit.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` for a duplicate slug or sku or an
/// unknown category.
pub async fn insertar(
    conn: &mut PgConnection,
    input: &ProductoInput,
) -> Result<Producto, RepositoryError> {
    let row = sqlx::query_as::<_, ProductoRow>(&format!(
        "INSERT INTO productos ( \
             categoria_id, nombre, slug, sku, descripcion, precio, precio_oferta, \
             stock, stock_minimo, imagen_principal, destacado, activo \
         ) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $9, $10, $11) \
         RETURNING {PRODUCTO_COLUMNS}"
    ))
    .bind(input.categoria_id)
    .bind(input.nombre.trim())
    .bind(input.slug())
    .bind(input.sku())
    .bind(input.descripcion())
    .bind(input.precio)
    .bind(input.precio_oferta)
    .bind(input.stock_minimo)
    .bind(input.imagen_principal.as_deref())
    .bind(input.destacado)
    .bind(input.activo)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_write_error)?;

    Ok(row.into())
}

/// Load live products and lock their rows until the transaction ends.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_productos(
    conn: &mut PgConnection,
    ids: &[ProductoId],
) -> Result<HashMap<ProductoId, Producto>, RepositoryError> {
    let rows = sqlx::query_as::<_, ProductoRow>(&format!(
        "SELECT {PRODUCTO_COLUMNS} FROM productos \
         WHERE id = ANY($1) AND deleted_at IS NULL \
         ORDER BY id FOR UPDATE"
    ))
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let producto = Producto::from(row);
            (producto.id, producto)
        })
        .collect())
}

/// Load variations and lock their rows until the transaction ends.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_variaciones(
    conn: &mut PgConnection,
    ids: &[VariacionId],
) -> Result<HashMap<VariacionId, Variacion>, RepositoryError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, VariacionRow>(&format!(
        "SELECT {VARIACION_COLUMNS} FROM variaciones \
         WHERE id = ANY($1) ORDER BY id FOR UPDATE"
    ))
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let variacion = Variacion::from(row);
            (variacion.id, variacion)
        })
        .collect())
}

/// Additional groups attached to each product, each with its active options.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn grupos_por_producto(
    conn: &mut PgConnection,
    ids: &[ProductoId],
) -> Result<HashMap<ProductoId, Vec<GrupoAdicional>>, RepositoryError> {
    let grupos = sqlx::query_as::<_, GrupoRow>(
        "SELECT pga.producto_id, g.id, g.nombre, g.descripcion, g.seleccion_minima, \
                g.seleccion_maxima, g.obligatorio, g.orden, g.activo \
         FROM producto_grupo_adicional pga \
         JOIN grupos_adicionales g ON g.id = pga.grupo_adicional_id \
         WHERE pga.producto_id = ANY($1) AND g.activo \
         ORDER BY pga.producto_id, pga.orden, g.orden, g.id",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    let grupo_ids: Vec<i32> = grupos.iter().map(|g| g.id).collect();
    let adicionales = sqlx::query_as::<_, AdicionalRow>(
        "SELECT id, grupo_adicional_id, nombre, precio, orden, activo FROM adicionales \
         WHERE grupo_adicional_id = ANY($1) AND activo \
         ORDER BY orden, id",
    )
    .bind(&grupo_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut por_grupo: HashMap<GrupoAdicionalId, Vec<Adicional>> = HashMap::new();
    for row in adicionales {
        let adicional = Adicional::from(row);
        por_grupo
            .entry(adicional.grupo_adicional_id)
            .or_default()
            .push(adicional);
    }

    let mut resultado: HashMap<ProductoId, Vec<GrupoAdicional>> = HashMap::new();
    for row in grupos {
        let id = GrupoAdicionalId::new(row.id);
        resultado
            .entry(ProductoId::new(row.producto_id))
            .or_default()
            .push(GrupoAdicional {
                id,
                nombre: row.nombre,
                descripcion: row.descripcion,
                seleccion_minima: row.seleccion_minima,
                seleccion_maxima: row.seleccion_maxima,
                obligatorio: row.obligatorio,
                orden: row.orden,
                activo: row.activo,
                adicionales: por_grupo.get(&id).cloned().unwrap_or_default(),
            });
    }
    Ok(resultado)
}
