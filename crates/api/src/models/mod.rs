//! Domain models and request inputs for the API.
//!
//! Entities here are what repositories return. Pricing, delivery and credit
//! rules live in `tienda-core`; these types carry rows to and from them.
//! Request inputs validate themselves and report every failing field at once.

pub mod catalogo;
pub mod cliente;
pub mod cupon;
pub mod pedido;
pub mod reparto;

use serde::Deserialize;

/// Page size when `per_page` is omitted.
pub const PER_PAGE_DEFECTO: u32 = 15;
/// Largest accepted `per_page`.
pub const PER_PAGE_MAXIMO: u32 = 100;

/// `page`/`per_page` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Paginacion {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl Paginacion {
    /// 1-based page number.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    #[must_use]
    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(PER_PAGE_DEFECTO)
            .clamp(1, PER_PAGE_MAXIMO)
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page())
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * self.limit()
    }
}

/// Trim an optional string, mapping blanks to `None`.
#[must_use]
pub fn texto_opcional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}
