//! Business logic services for the API.
//!
//! Services own the multi-step writes: each one opens a transaction, locks
//! the rows it depends on, applies the `tienda_core` rules and commits.
//! Plain reads and single-statement writes go straight to `crate::db`.
//!
//! # Services
//!
//! - `catalogo` - Product creation with its opening stock
//! - `checkout` - Order placement
//! - `credito` - Installment payments
//! - `inventario` - Stock movements
//! - `pedidos` - Order state changes and payments
//! - `reparto` - Shipping quotes, address validation and zone writes

pub mod catalogo;
pub mod checkout;
pub mod credito;
pub mod inventario;
pub mod pedidos;
pub mod reparto;

pub use catalogo::CatalogoService;
pub use checkout::CheckoutService;
pub use credito::CreditoService;
pub use inventario::InventarioService;
pub use pedidos::PedidoService;
pub use reparto::RepartoService;
