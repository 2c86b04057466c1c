//! Catalog rules: offer prices, stock checks and additional-group selection.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{GrupoAdicionalId, round_money};

/// Price a customer pays for a product: the offer when it undercuts the list price.
#[must_use]
pub fn precio_vigente(precio: Decimal, precio_oferta: Option<Decimal>) -> Decimal {
    match precio_oferta {
        Some(oferta) if oferta > Decimal::ZERO && oferta < precio => oferta,
        _ => precio,
    }
}

/// Whether an offer price is in effect.
#[must_use]
pub fn en_oferta(precio: Decimal, precio_oferta: Option<Decimal>) -> bool {
    precio_vigente(precio, precio_oferta) < precio
}

/// Whole-number discount percentage of an offer, `0` without one.
#[must_use]
pub fn porcentaje_descuento(precio: Decimal, precio_oferta: Option<Decimal>) -> Decimal {
    if precio <= Decimal::ZERO || !en_oferta(precio, precio_oferta) {
        return Decimal::ZERO;
    }
    let vigente = precio_vigente(precio, precio_oferta);
    ((precio - vigente) / precio * Decimal::ONE_HUNDRED).round()
}

/// Whether `stock` covers `cantidad` units.
#[must_use]
pub const fn es_stock_suficiente(stock: i32, cantidad: i32) -> bool {
    cantidad > 0 && stock >= cantidad
}

/// Whether stock has reached the reorder threshold.
#[must_use]
pub const fn stock_bajo(stock: i32, stock_minimo: i32) -> bool {
    stock <= stock_minimo
}

/// Unit price of a variation: the product price plus the variation surcharge.
#[must_use]
pub fn precio_con_variacion(precio_producto: Decimal, precio_adicional: Decimal) -> Decimal {
    round_money(precio_producto + precio_adicional)
}

/// Selection rules of an additional group (e.g. "Elige tu salsa").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReglaGrupo {
    pub id: GrupoAdicionalId,
    pub nombre: String,
    pub seleccion_minima: i32,
    /// `None` means unlimited.
    pub seleccion_maxima: Option<i32>,
    pub obligatorio: bool,
}

/// Why a selection of additionals breaks its group's rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeleccionInvalida {
    #[error("el grupo '{grupo}' es obligatorio")]
    Obligatorio { grupo: String },
    #[error("el grupo '{grupo}' requiere al menos {minimo} opciones")]
    Insuficiente { grupo: String, minimo: i32 },
    #[error("el grupo '{grupo}' permite como máximo {maximo} opciones")]
    Excedida { grupo: String, maximo: i32 },
}

impl ReglaGrupo {
    /// Validate the number of options chosen in this group.
    ///
    /// # Errors
    ///
    /// Returns a [`SeleccionInvalida`] when the count violates the group rules.
    pub fn validar_seleccion(&self, cantidad: i32) -> Result<(), SeleccionInvalida> {
        if cantidad == 0 {
            if self.obligatorio {
                return Err(SeleccionInvalida::Obligatorio {
                    grupo: self.nombre.clone(),
                });
            }
            return Ok(());
        }
        if cantidad < self.seleccion_minima {
            return Err(SeleccionInvalida::Insuficiente {
                grupo: self.nombre.clone(),
                minimo: self.seleccion_minima,
            });
        }
        if let Some(maximo) = self.seleccion_maxima.filter(|m| cantidad > *m) {
            return Err(SeleccionInvalida::Excedida {
                grupo: self.nombre.clone(),
                maximo,
            });
        }
        Ok(())
    }
}

/// Build a URL slug from a product or category name.
///
/// Lowercases, folds common Spanish accents and joins words with `-`.
#[must_use]
pub fn slugify(nombre: &str) -> String {
    let mut slug = String::with_capacity(nombre.len());
    let mut pending_dash = false;
    for ch in nombre.chars().flat_map(char::to_lowercase) {
        let ch = match ch {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            'ñ' => 'n',
            c => c,
        };
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}
