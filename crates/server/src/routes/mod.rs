//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                      - Readiness (database ping)
//! GET    /health/live                 - Liveness
//! GET    /uploads/{file}              - Stored product images
//!
//! # Auth
//! POST   /v1/signup                   - Register, returns a bearer token
//! POST   /v1/signin                   - Login, returns a bearer token
//!
//! # Catalog
//! GET    /v1/products                 - List (?category=&active_only=)
//! POST   /v1/products                 - Create, JSON or multipart (auth)
//! GET    /v1/products/{id}            - Detail
//! POST   /v1/products/{id}/deactivate - Withdraw from sale (auth)
//!
//! # Cart (auth)
//! GET    /v1/cart                     - Current cart with live total
//! POST   /v1/cart/add                 - Add units
//! PUT    /v1/cart/update              - Set quantity
//! DELETE /v1/cart/remove              - Remove line
//!
//! # Checkout (auth)
//! POST   /v1/create-payment-intent    - Pending order + client secret
//! POST   /v1/confirm-payment          - Settle a pending order
//! POST   /v1/checkout                 - Legacy direct checkout
//! GET    /v1/orders                   - Order history
//! GET    /v1/orders/{id}              - One order
//! ```

pub mod auth;
pub mod cart;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;

use std::str::FromStr;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, Method, header},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::middleware::request_id_middleware;
use crate::services::PaymentBridge;
use crate::services::uploads::PUBLIC_PREFIX;
use crate::state::AppState;

/// Create the versioned API router.
pub fn api_routes<S: Store, P: PaymentBridge>(max_image_bytes: usize) -> Router<AppState<S, P>> {
    Router::new()
        .merge(auth::router())
        .merge(products::router(max_image_bytes))
        .merge(cart::router())
        .merge(payments::router())
        .merge(orders::router())
}

/// Build the complete application with its middleware stack.
pub fn app<S: Store, P: PaymentBridge>(state: AppState<S, P>, cors_origins: &[String]) -> Router {
    let uploads = ServeDir::new(state.images().dir());
    let max_image_bytes = state.images().max_bytes();

    Router::new()
        .merge(health::router())
        .nest("/v1", api_routes(max_image_bytes))
        .nest_service(PUBLIC_PREFIX, uploads)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                // Sentry layers (outermost for full request coverage)
                .layer(sentry_tower::NewSentryLayer::new_from_top())
                .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        account_id = tracing::field::Empty,
                    )
                }))
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(cors_layer(cors_origins)),
        )
}

/// CORS for browser clients. No configured origins means any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins.iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| tracing::warn!(origin = %origin, "Ignoring invalid CORS origin"))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Parse an ID from a path segment or body field.
pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid {what}")))
}
