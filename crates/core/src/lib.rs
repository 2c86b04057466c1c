//! Tienda Core - Domain types and business rules.
//!
//! This crate provides the types and rules shared by all Tienda components:
//! - `api` - JSON API server (catalog, checkout, delivery zones, credit)
//! - `cli` - Command-line tools for migrations, seeding and shipping quotes
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. Every rule that decides a price, a delivery window or a
//! credit limit lives here so it can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money helpers, identity documents, status enums
//! - [`reparto`] - Delivery zone coverage, shipping cost and time resolution
//! - [`catalogo`] - Offer prices, stock checks, additional-group selection
//! - [`pedido`] - Order line pricing, totals and state transitions
//! - [`cupon`] - Coupon eligibility and discount calculation
//! - [`credito`] - Customer credit limits and installment schedules
//! - [`inventario`] - Inventory movements

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalogo;
pub mod credito;
pub mod cupon;
pub mod inventario;
pub mod pedido;
pub mod reparto;
pub mod types;

pub use types::*;
