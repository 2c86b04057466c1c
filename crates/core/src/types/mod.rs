//! Core types for Tienda.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod documento;
pub mod email;
pub mod id;
pub mod money;
pub mod status;

pub use documento::{Documento, DocumentoError};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{IGV_RATE, format_soles, round_money};
pub use status::*;
