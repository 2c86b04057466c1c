//! Catalog models: categories, products, variations and additionals.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tienda_core::catalogo::{self, ReglaGrupo};
use tienda_core::{
    AdicionalId, CategoriaId, GrupoAdicionalId, ProductoId, ProductoImagenId, VariacionId,
};

use super::{Paginacion, texto_opcional};
use crate::error::{AppError, ValidationErrors};

/// A product category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Categoria {
    pub id: CategoriaId,
    pub parent_id: Option<CategoriaId>,
    pub nombre: String,
    pub slug: String,
    pub descripcion: Option<String>,
    pub imagen: Option<String>,
    pub orden: i32,
    pub activo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sellable product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producto {
    pub id: ProductoId,
    pub categoria_id: CategoriaId,
    pub nombre: String,
    pub slug: String,
    pub sku: Option<String>,
    pub descripcion: Option<String>,
    pub precio: Decimal,
    pub precio_oferta: Option<Decimal>,
    pub stock: i32,
    pub stock_minimo: i32,
    pub imagen_principal: Option<String>,
    pub destacado: bool,
    pub activo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Producto {
    #[must_use]
    pub fn precio_vigente(&self) -> Decimal {
        catalogo::precio_vigente(self.precio, self.precio_oferta)
    }

    #[must_use]
    pub fn en_oferta(&self) -> bool {
        catalogo::en_oferta(self.precio, self.precio_oferta)
    }

    #[must_use]
    pub const fn stock_bajo(&self) -> bool {
        catalogo::stock_bajo(self.stock, self.stock_minimo)
    }
}

/// Gallery image of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductoImagen {
    pub id: ProductoImagenId,
    pub producto_id: ProductoId,
    pub url: String,
    pub alt: Option<String>,
    pub orden: i32,
}

/// A product variation (size, flavour...) with its own stock and surcharge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variacion {
    pub id: VariacionId,
    pub producto_id: ProductoId,
    pub nombre: String,
    pub sku: Option<String>,
    pub precio_adicional: Decimal,
    pub stock: i32,
    pub activo: bool,
}

/// One option inside an additional group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adicional {
    pub id: AdicionalId,
    pub grupo_adicional_id: GrupoAdicionalId,
    pub nombre: String,
    pub precio: Decimal,
    pub orden: i32,
    pub activo: bool,
}

/// A group of additionals with its selection rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrupoAdicional {
    pub id: GrupoAdicionalId,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub seleccion_minima: i32,
    pub seleccion_maxima: Option<i32>,
    pub obligatorio: bool,
    pub orden: i32,
    pub activo: bool,
    pub adicionales: Vec<Adicional>,
}

impl GrupoAdicional {
    /// Selection rules for validation.
    #[must_use]
    pub fn regla(&self) -> ReglaGrupo {
        ReglaGrupo {
            id: self.id,
            nombre: self.nombre.clone(),
            seleccion_minima: self.seleccion_minima,
            seleccion_maxima: self.seleccion_maxima,
            obligatorio: self.obligatorio,
        }
    }
}

/// A product with everything shown on its detail page.
#[derive(Debug, Clone, Serialize)]
pub struct ProductoDetalle {
    pub producto: Producto,
    pub categoria: Option<Categoria>,
    pub variaciones: Vec<Variacion>,
    pub imagenes: Vec<ProductoImagen>,
    pub grupos: Vec<GrupoAdicional>,
}

// =============================================================================
// Inputs
// =============================================================================

/// Body of `POST /api/categorias` and `PUT /api/categorias/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoriaInput {
    pub nombre: String,
    pub slug: Option<String>,
    pub descripcion: Option<String>,
    pub imagen: Option<String>,
    pub parent_id: Option<CategoriaId>,
    #[serde(default)]
    pub orden: i32,
    #[serde(default = "activo_por_defecto")]
    pub activo: bool,
}

const fn activo_por_defecto() -> bool {
    true
}

impl CategoriaInput {
    /// Validate the input.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] listing every invalid field.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();
        validar_nombre(&mut errors, &self.nombre, 120);
        errors.check(!self.slug().is_empty(), "slug", "el slug no puede quedar vacío");
        errors.into_result()
    }

    /// Explicit slug, or one derived from the name.
    #[must_use]
    pub fn slug(&self) -> String {
        catalogo::slugify(self.slug.as_deref().unwrap_or(&self.nombre))
    }

    #[must_use]
    pub fn descripcion(&self) -> Option<String> {
        texto_opcional(self.descripcion.as_deref())
    }
}

/// Body of `POST /api/productos` and `PUT /api/productos/{id}`.
///
/// `stock` is only read on creation; later changes go through inventory
/// movements so the stock ledger stays complete.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductoInput {
    pub categoria_id: CategoriaId,
    pub nombre: String,
    pub slug: Option<String>,
    pub sku: Option<String>,
    pub descripcion: Option<String>,
    pub precio: Decimal,
    pub precio_oferta: Option<Decimal>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub stock_minimo: i32,
    pub imagen_principal: Option<String>,
    #[serde(default)]
    pub destacado: bool,
    #[serde(default = "activo_por_defecto")]
    pub activo: bool,
}

impl ProductoInput {
    /// Validate the input.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] listing every invalid field.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();
        validar_nombre(&mut errors, &self.nombre, 200);
        errors.check(!self.slug().is_empty(), "slug", "el slug no puede quedar vacío");
        validar_monto(&mut errors, "precio", self.precio);
        if let Some(oferta) = self.precio_oferta {
            validar_monto(&mut errors, "precio_oferta", oferta);
            errors.check(
                oferta < self.precio,
                "precio_oferta",
                "el precio de oferta debe ser menor al precio",
            );
        }
        errors.check(self.stock >= 0, "stock", "el stock no puede ser negativo");
        errors.check(
            self.stock_minimo >= 0,
            "stock_minimo",
            "el stock mínimo no puede ser negativo",
        );
        if let Some(sku) = &self.sku {
            errors.check(sku.trim().len() <= 64, "sku", "el sku no puede superar 64 caracteres");
        }
        errors.into_result()
    }

    #[must_use]
    pub fn slug(&self) -> String {
        catalogo::slugify(self.slug.as_deref().unwrap_or(&self.nombre))
    }

    #[must_use]
    pub fn sku(&self) -> Option<String> {
        texto_opcional(self.sku.as_deref()).map(|s| s.to_uppercase())
    }

    #[must_use]
    pub fn descripcion(&self) -> Option<String> {
        texto_opcional(self.descripcion.as_deref())
    }
}

/// Query of `GET /api/productos`.
///
/// Paging fields are spelled out rather than flattened: query strings only
/// deserialize typed values at the top level.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductoFiltro {
    pub categoria_id: Option<CategoriaId>,
    pub buscar: Option<String>,
    pub destacado: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductoFiltro {
    #[must_use]
    pub const fn paginacion(&self) -> Paginacion {
        Paginacion {
            page: self.page,
            per_page: self.per_page,
        }
    }

    /// `ILIKE` pattern for the search term, `None` without one.
    #[must_use]
    pub fn patron_busqueda(&self) -> Option<String> {
        texto_opcional(self.buscar.as_deref()).map(|term| {
            let escaped = term
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
    }
}

fn validar_nombre(errors: &mut ValidationErrors, nombre: &str, max: usize) {
    let nombre = nombre.trim();
    if nombre.is_empty() {
        errors.add("nombre", "el nombre es obligatorio");
    } else if nombre.chars().count() > max {
        errors.add("nombre", format!("el nombre no puede superar {max} caracteres"));
    }
}

/// Money fields are non-negative with at most two decimals.
pub(crate) fn validar_monto(errors: &mut ValidationErrors, field: &str, monto: Decimal) {
    if monto.is_sign_negative() {
        errors.add(field, "el monto no puede ser negativo");
    }
    if monto.normalize().scale() > 2 {
        errors.add(field, "el monto admite como máximo 2 decimales");
    }
}
