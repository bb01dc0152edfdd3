//! Order history.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use serde::Serialize;

use bazaar_core::OrderId;

use super::parse_id;
use super::payments::OrderResponse;
use crate::db::Store;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::services::PaymentBridge;
use crate::state::AppState;

pub fn router<S: Store, P: PaymentBridge>() -> Router<AppState<S, P>> {
    Router::new()
        .route("/orders", get(index::<S, P>))
        .route("/orders/{id}", get(show::<S, P>))
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<Order>,
}

/// The account's orders, newest first.
pub async fn index<S: Store, P: PaymentBridge>(
    RequireAuth(account): RequireAuth,
    State(state): State<AppState<S, P>>,
) -> Result<Json<OrdersResponse>> {
    let orders = state.checkout().list_orders(account.id).await?;
    Ok(Json(OrdersResponse { orders }))
}

pub async fn show<S: Store, P: PaymentBridge>(
    RequireAuth(account): RequireAuth,
    State(state): State<AppState<S, P>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>> {
    let id: OrderId = parse_id(&id, "order id")?;
    let order = state.checkout().order(account.id, id).await?;
    Ok(Json(OrderResponse { order }))
}
