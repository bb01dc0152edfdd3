//! Checkout route handlers.
//!
//! ```text
//! POST /v1/create-payment-intent   cart → pending order + client secret
//! POST /v1/confirm-payment         pending order → completed | failed
//! POST /v1/checkout                cart → completed order (no provider)
//! ```

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use bazaar_core::OrderId;

use crate::db::Store;
use crate::error::{AppError, JsonBody, Result};
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::services::PaymentBridge;
use crate::state::AppState;

pub fn router<S: Store, P: PaymentBridge>() -> Router<AppState<S, P>> {
    Router::new()
        .route("/create-payment-intent", post(create_payment_intent::<S, P>))
        .route("/confirm-payment", post(confirm_payment::<S, P>))
        .route("/checkout", post(checkout::<S, P>))
}

#[derive(Debug, Serialize)]
pub struct IntentResponse {
    pub client_secret: String,
    pub order_id: OrderId,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order: Order,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub message: &'static str,
    pub order: Order,
}

pub async fn create_payment_intent<S: Store, P: PaymentBridge>(
    RequireAuth(account): RequireAuth,
    State(state): State<AppState<S, P>>,
) -> Result<Json<IntentResponse>> {
    let created = state.checkout().create_payment_intent(account.id).await?;
    Ok(Json(IntentResponse {
        client_secret: created.client_secret,
        order_id: created.order_id,
    }))
}

pub async fn confirm_payment<S: Store, P: PaymentBridge>(
    RequireAuth(account): RequireAuth,
    State(state): State<AppState<S, P>>,
    JsonBody(body): JsonBody<ConfirmRequest>,
) -> Result<Json<OrderResponse>> {
    let reference = body
        .payment_intent_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("payment_intent_id is required".to_string()))?;

    let order = state
        .checkout()
        .confirm_payment(account.id, reference.trim())
        .await?;
    Ok(Json(OrderResponse { order }))
}

/// Legacy direct checkout without a payment provider.
pub async fn checkout<S: Store, P: PaymentBridge>(
    RequireAuth(account): RequireAuth,
    State(state): State<AppState<S, P>>,
) -> Result<Json<CheckoutResponse>> {
    let order = state.checkout().checkout(account.id).await?;
    Ok(Json(CheckoutResponse {
        message: "Checkout successful",
        order,
    }))
}
