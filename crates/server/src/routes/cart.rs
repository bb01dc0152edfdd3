//! Cart route handlers.
//!
//! Every mutation responds with the whole cart so clients never need a
//! follow-up read.

use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get, post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bazaar_core::{Price, ProductId, Quantity};

use super::parse_id;
use crate::db::Store;
use crate::error::{AppError, JsonBody, Result};
use crate::middleware::RequireAuth;
use crate::models::{CartEntry, CartView};
use crate::services::{PaymentBridge, ShopError};
use crate::state::AppState;

pub fn router<S: Store, P: PaymentBridge>() -> Router<AppState<S, P>> {
    Router::new()
        .route("/cart", get(show::<S, P>))
        .route("/cart/add", post(add::<S, P>))
        .route("/cart/update", put(update::<S, P>))
        .route("/cart/remove", delete(remove::<S, P>))
}

/// Body of add, update and remove. `quantity` is parsed by hand so numeric
/// strings are accepted and fractions are rejected with a clear message.
#[derive(Debug, Deserialize)]
pub struct CartRequest {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<Value>,
}

impl CartRequest {
    fn product_id(&self) -> Result<ProductId> {
        let raw = self
            .product_id
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("product_id is required".to_string()))?;
        parse_id(raw, "product_id")
    }

    fn quantity(&self) -> Result<Option<Quantity>> {
        self.quantity
            .as_ref()
            .filter(|v| !v.is_null())
            .map(|v| Quantity::from_json(v).map_err(|e| AppError::from(ShopError::from(e))))
            .transpose()
    }
}

#[derive(Debug, Serialize)]
pub struct CartItemResponse {
    pub id: String,
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub quantity: Quantity,
    pub line_total: Price,
    pub image_url: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl From<&CartEntry> for CartItemResponse {
    fn from(entry: &CartEntry) -> Self {
        Self {
            id: entry.line.id.to_string(),
            product_id: entry.product.id,
            name: entry.product.name.clone(),
            price: entry.product.price,
            quantity: entry.line.quantity,
            line_total: entry.line_total(),
            image_url: entry.product.image_url.clone(),
            added_at: entry.line.added_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub cart_items: Vec<CartItemResponse>,
    pub cart_total: Price,
}

impl From<CartView> for CartResponse {
    fn from(view: CartView) -> Self {
        Self {
            cart_items: view.entries.iter().map(CartItemResponse::from).collect(),
            cart_total: view.total,
        }
    }
}

pub async fn show<S: Store, P: PaymentBridge>(
    RequireAuth(account): RequireAuth,
    State(state): State<AppState<S, P>>,
) -> Result<Json<CartResponse>> {
    let view = state.cart().view(account.id).await?;
    Ok(Json(view.into()))
}

/// Add units of a product; `quantity` defaults to 1.
pub async fn add<S: Store, P: PaymentBridge>(
    RequireAuth(account): RequireAuth,
    State(state): State<AppState<S, P>>,
    JsonBody(body): JsonBody<CartRequest>,
) -> Result<Json<CartResponse>> {
    let product_id = body.product_id()?;
    let quantity = body.quantity()?.unwrap_or(Quantity::ONE);
    let view = state.cart().add(account.id, product_id, quantity).await?;
    Ok(Json(view.into()))
}

/// Set a line's quantity.
pub async fn update<S: Store, P: PaymentBridge>(
    RequireAuth(account): RequireAuth,
    State(state): State<AppState<S, P>>,
    JsonBody(body): JsonBody<CartRequest>,
) -> Result<Json<CartResponse>> {
    let product_id = body.product_id()?;
    let quantity = body
        .quantity()?
        .ok_or_else(|| AppError::BadRequest("quantity is required".to_string()))?;
    let view = state.cart().update(account.id, product_id, quantity).await?;
    Ok(Json(view.into()))
}

pub async fn remove<S: Store, P: PaymentBridge>(
    RequireAuth(account): RequireAuth,
    State(state): State<AppState<S, P>>,
    JsonBody(body): JsonBody<CartRequest>,
) -> Result<Json<CartResponse>> {
    let product_id = body.product_id()?;
    let view = state.cart().remove(account.id, product_id).await?;
    Ok(Json(view.into()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(body: Value) -> CartRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_quantity_is_optional() {
        let body = request(json!({ "product_id": ProductId::new() }));
        assert_eq!(body.quantity().unwrap(), None);
    }

    #[test]
    fn test_quantity_rejects_fractions_and_zero() {
        let id = ProductId::new();
        assert!(request(json!({ "product_id": id, "quantity": 1.5 })).quantity().is_err());
        assert!(request(json!({ "product_id": id, "quantity": 0 })).quantity().is_err());
        assert_eq!(
            request(json!({ "product_id": id, "quantity": "4" }))
                .quantity()
                .unwrap()
                .map(|q| q.get()),
            Some(4)
        );
    }

    #[test]
    fn test_product_id_required_and_parsed() {
        assert!(request(json!({})).product_id().is_err());
        assert!(request(json!({ "product_id": "not-a-uuid" })).product_id().is_err());

        let id = ProductId::new();
        assert_eq!(
            request(json!({ "product_id": id.to_string() })).product_id().unwrap(),
            id
        );
    }
}
