//! Database operations for categories.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use tienda_core::CategoriaId;

use super::RepositoryError;
use crate::models::catalogo::{Categoria, CategoriaInput};

const SLUG_DUPLICADO: &str = "ya existe una categoría con ese slug";

/// Internal row type for category queries.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CategoriaRow {
    id: i32,
    parent_id: Option<i32>,
    nombre: String,
    slug: String,
    descripcion: Option<String>,
    imagen: Option<String>,
    orden: i32,
    activo: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoriaRow> for Categoria {
    fn from(row: CategoriaRow) -> Self {
        Self {
            id: CategoriaId::new(row.id),
            parent_id: row.parent_id.map(CategoriaId::new),
            nombre: row.nombre,
            slug: row.slug,
            descripcion: row.descripcion,
            imagen: row.imagen,
            orden: row.orden,
            activo: row.activo,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub(crate) const CATEGORIA_COLUMNS: &str = "id, parent_id, nombre, slug, descripcion, imagen, \
     orden, activo, created_at, updated_at";

/// Repository for category database operations.
pub struct CategoriaRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoriaRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List categories that are not deleted, in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Categoria>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoriaRow>(&format!(
            "SELECT {CATEGORIA_COLUMNS} FROM categorias \
             WHERE deleted_at IS NULL \
             ORDER BY orden, nombre"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoriaId) -> Result<Option<Categoria>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoriaRow>(&format!(
            "SELECT {CATEGORIA_COLUMNS} FROM categorias WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` for a duplicate slug or an
    /// unknown parent.
    pub async fn create(&self, input: &CategoriaInput) -> Result<Categoria, RepositoryError> {
        let row = sqlx::query_as::<_, CategoriaRow>(&format!(
            "INSERT INTO categorias (parent_id, nombre, slug, descripcion, imagen, orden, activo) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {CATEGORIA_COLUMNS}"
        ))
        .bind(input.parent_id)
        .bind(input.nombre.trim())
        .bind(input.slug())
        .bind(input.descripcion())
        .bind(input.imagen.as_deref())
        .bind(input.orden)
        .bind(input.activo)
        .fetch_one(self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(row.into())
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist,
    /// `RepositoryError::Conflict` for a duplicate slug or a self parent.
    pub async fn update(
        &self,
        id: CategoriaId,
        input: &CategoriaInput,
    ) -> Result<Categoria, RepositoryError> {
        if input.parent_id == Some(id) {
            return Err(RepositoryError::Conflict(
                "una categoría no puede ser su propia categoría padre".to_owned(),
            ));
        }

        let row = sqlx::query_as::<_, CategoriaRow>(&format!(
            "UPDATE categorias SET \
                 parent_id = $2, nombre = $3, slug = $4, descripcion = $5, \
                 imagen = $6, orden = $7, activo = $8 \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {CATEGORIA_COLUMNS}"
        ))
        .bind(id)
        .bind(input.parent_id)
        .bind(input.nombre.trim())
        .bind(input.slug())
        .bind(input.descripcion())
        .bind(input.imagen.as_deref())
        .bind(input.orden)
        .bind(input.activo)
        .fetch_optional(self.pool)
        .await
        .map_err(map_write_error)?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Soft-delete a category.
    ///
    /// A category that still has live products cannot be deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist and
    /// `RepositoryError::Conflict` if it still has products.
    pub async fn soft_delete(&self, id: CategoriaId) -> Result<(), RepositoryError> {
        let (productos,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM productos WHERE categoria_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        if productos > 0 {
            return Err(RepositoryError::Conflict(format!(
                "la categoría tiene {productos} productos"
            )));
        }

        let result = sqlx::query(
            "UPDATE categorias SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
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

fn map_write_error(err: sqlx::Error) -> RepositoryError {
    match RepositoryError::unique_or_database(err, SLUG_DUPLICADO) {
        RepositoryError::Database(err) => {
            RepositoryError::foreign_key_or_database(err, "la categoría padre no existe")
        }
        other => other,
    }
}
