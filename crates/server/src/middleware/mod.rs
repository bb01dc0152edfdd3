//! HTTP middleware for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction)
//! 2. `TraceLayer` (request span with `request_id` and `account_id` fields)
//! 3. Request ID (fills the span field, tags Sentry, echoes the header)
//! 4. CORS
//!
//! Authentication is an extractor ([`RequireAuth`]) rather than a layer, so
//! public and protected routes share one router.

pub mod auth;
pub mod request_id;

pub use auth::RequireAuth;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
