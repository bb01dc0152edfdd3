//! Integration tests for the payment-backed checkout and order history.
//!
//! The scripted payment provider stands in for Stripe: tests decide what
//! status each intent reports before confirming.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use serde_json::{Value, json};

use bazaar_integration_tests::TestApp;
use bazaar_server::services::IntentStatus;

struct Shop {
    app: TestApp,
    token: String,
    product_id: String,
}

impl Shop {
    /// One account with `quantity` units of a 10.00 product (stock 5) in its cart.
    async fn with_cart(quantity: u32) -> Self {
        let app = TestApp::new();
        let token = app.signup("buyer@example.com").await;
        let product = app.create_product(&token, "Desk Lamp", "10.00", 5).await;
        let product_id = product["id"].as_str().unwrap().to_string();
        app.add_to_cart(&token, &product_id, quantity).await;
        Self {
            app,
            token,
            product_id,
        }
    }

    async fn create_intent(&self) -> (StatusCode, Value) {
        let response = self
            .app
            .post("/v1/create-payment-intent", Some(&self.token), json!({}))
            .await;
        (response.status, response.json())
    }

    async fn confirm(&self, reference: &str) -> (StatusCode, Value) {
        let response = self
            .app
            .post(
                "/v1/confirm-payment",
                Some(&self.token),
                json!({ "payment_intent_id": reference }),
            )
            .await;
        (response.status, response.json())
    }

    async fn stock(&self) -> i64 {
        self.app
            .get(&format!("/v1/products/{}", self.product_id), None)
            .await
            .json()["product"]["stock_quantity"]
            .as_i64()
            .unwrap()
    }

    async fn cart_len(&self) -> usize {
        self.app.get("/v1/cart", Some(&self.token)).await.json()["cart_items"]
            .as_array()
            .unwrap()
            .len()
    }

    async fn orders(&self) -> Vec<Value> {
        self.app.get("/v1/orders", Some(&self.token)).await.json()["orders"]
            .as_array()
            .unwrap()
            .clone()
    }
}

// =============================================================================
// Payment-backed checkout
// =============================================================================

#[tokio::test]
async fn test_purchase_end_to_end() {
    let shop = Shop::with_cart(2).await;

    let (status, intent) = shop.create_intent().await;
    assert_eq!(status, StatusCode::OK);
    let reference = shop.app.payments.created().pop().unwrap();
    assert_eq!(intent["client_secret"], format!("{reference}_secret"));
    assert_eq!(shop.app.payments.request(&reference).unwrap().amount, 2000);

    let pending = shop.orders().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["id"], intent["order_id"]);
    assert_eq!(pending[0]["status"], "pending");
    assert_eq!(pending[0]["total_amount"], "20.00");
    assert_eq!(shop.stock().await, 5);
    assert_eq!(shop.cart_len().await, 1);

    shop.app.payments.succeed(&reference);
    let (status, body) = shop.confirm(&reference).await;
    assert_eq!(status, StatusCode::OK);

    let order = &body["order"];
    assert_eq!(order["status"], "completed");
    assert_eq!(order["payment_reference"], reference);
    assert_eq!(order["items"][0]["quantity"], 2);
    assert_eq!(order["items"][0]["unit_price"], "10.00");
    assert_eq!(shop.stock().await, 3);
    assert_eq!(shop.cart_len().await, 0);

    let fetched = shop
        .app
        .get(
            &format!("/v1/orders/{}", order["id"].as_str().unwrap()),
            Some(&shop.token),
        )
        .await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(&fetched.json()["order"], order);
}

#[tokio::test]
async fn test_empty_cart_intent() {
    let app = TestApp::new();
    let token = app.signup("idle@example.com").await;

    let response = app
        .post("/v1/create-payment-intent", Some(&token), json!({}))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json(), json!({ "error": "cart is empty" }));
    assert!(app.payments.created().is_empty());
}

#[tokio::test]
async fn test_provider_outage_is_bad_gateway() {
    let shop = Shop::with_cart(1).await;
    shop.app.payments.fail_next_create();

    let (status, body) = shop.create_intent().await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, json!({ "error": "Payment provider unavailable" }));
    assert!(shop.orders().await.is_empty());
}

#[tokio::test]
async fn test_declined_payment_keeps_cart() {
    let shop = Shop::with_cart(2).await;
    shop.create_intent().await;
    let reference = shop.app.payments.created().pop().unwrap();
    shop.app
        .payments
        .set_status(&reference, IntentStatus::RequiresPaymentMethod);

    let (status, body) = shop.confirm(&reference).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("payment failed"));
    assert_eq!(shop.orders().await[0]["status"], "failed");
    assert_eq!(shop.cart_len().await, 1);
    assert_eq!(shop.stock().await, 5);
}

#[tokio::test]
async fn test_confirm_twice_decrements_once() {
    let shop = Shop::with_cart(2).await;
    shop.create_intent().await;
    let reference = shop.app.payments.created().pop().unwrap();
    shop.app.payments.succeed(&reference);

    let (first, _) = shop.confirm(&reference).await;
    let (second, body) = shop.confirm(&reference).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(body["order"]["status"], "completed");
    assert_eq!(shop.stock().await, 3);
}

#[tokio::test]
async fn test_confirm_requires_known_reference() {
    let shop = Shop::with_cart(1).await;

    let missing = shop
        .app
        .post("/v1/confirm-payment", Some(&shop.token), json!({}))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        missing.json(),
        json!({ "error": "payment_intent_id is required" })
    );

    let (status, body) = shop.confirm("pi_does_not_exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Order not found" }));
}

#[tokio::test]
async fn test_other_accounts_cannot_confirm_or_view() {
    let shop = Shop::with_cart(1).await;
    let (_, intent) = shop.create_intent().await;
    let reference = shop.app.payments.created().pop().unwrap();
    shop.app.payments.succeed(&reference);

    let intruder = shop.app.signup("intruder@example.com").await;
    let confirm = shop
        .app
        .post(
            "/v1/confirm-payment",
            Some(&intruder),
            json!({ "payment_intent_id": reference }),
        )
        .await;
    assert_eq!(confirm.status, StatusCode::NOT_FOUND);

    let view = shop
        .app
        .get(
            &format!("/v1/orders/{}", intent["order_id"].as_str().unwrap()),
            Some(&intruder),
        )
        .await;
    assert_eq!(view.status, StatusCode::NOT_FOUND);
    assert_eq!(shop.stock().await, 5);
}

#[tokio::test]
async fn test_snapshot_survives_later_changes() {
    let shop = Shop::with_cart(2).await;
    shop.create_intent().await;
    let reference = shop.app.payments.created().pop().unwrap();
    shop.app.payments.succeed(&reference);
    shop.confirm(&reference).await;

    // Refill the cart and withdraw the product after the purchase
    shop.app.add_to_cart(&shop.token, &shop.product_id, 1).await;
    shop.app
        .post(
            &format!("/v1/products/{}/deactivate", shop.product_id),
            Some(&shop.token),
            json!({}),
        )
        .await;

    let orders = shop.orders().await;
    let items = &orders[0]["items"];
    assert_eq!(items.as_array().unwrap().len(), 1);
    assert_eq!(items[0]["name"], "Desk Lamp");
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["line_total"], "20.00");
}

// =============================================================================
// Legacy checkout and history
// =============================================================================

#[tokio::test]
async fn test_legacy_checkout() {
    let shop = Shop::with_cart(2).await;

    let response = shop
        .app
        .post("/v1/checkout", Some(&shop.token), json!({}))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["message"], "Checkout successful");
    assert_eq!(body["order"]["status"], "completed");
    assert_eq!(body["order"]["total_amount"], "20.00");
    assert_eq!(body["order"]["payment_reference"], json!(null));
    assert_eq!(shop.cart_len().await, 0);
    assert_eq!(shop.stock().await, 5);
    assert!(shop.app.payments.created().is_empty());

    let again = shop
        .app
        .post("/v1/checkout", Some(&shop.token), json!({}))
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_orders_listed_newest_first() {
    let shop = Shop::with_cart(1).await;
    let first = shop
        .app
        .post("/v1/checkout", Some(&shop.token), json!({}))
        .await
        .json();

    shop.app.add_to_cart(&shop.token, &shop.product_id, 3).await;
    let second = shop
        .app
        .post("/v1/checkout", Some(&shop.token), json!({}))
        .await
        .json();

    let ids: Vec<Value> = shop.orders().await.iter().map(|o| o["id"].clone()).collect();
    assert_eq!(ids, [second["order"]["id"].clone(), first["order"]["id"].clone()]);
}
