//! Tienda API library.
//!
//! This crate provides the JSON API as a library, allowing it to be tested
//! and reused by the CLI.
//!
//! # Layers
//!
//! - `routes` - Axum handlers, one module per resource
//! - `services` - Transactional writes (checkout, payments, stock, zones)
//! - `db` - `PostgreSQL` repositories
//! - `resources` - JSON views with derived fields
//!
//! Business rules live in `tienda-core`; this crate only moves rows in and
//! out of them.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod resources;
pub mod routes;
pub mod services;
pub mod state;
