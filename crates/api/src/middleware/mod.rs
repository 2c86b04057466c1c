//! HTTP middleware stack for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (`http_request` span with status and latency)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (origins from `TIENDA_CORS_ORIGINS`)
//! 5. Path normalization (trailing slashes)

pub mod request_id;

pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
