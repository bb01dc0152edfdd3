//! Integration tests for product listing, creation and image uploads.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};

use bazaar_integration_tests::{MAX_UPLOAD_BYTES, TestApp};

fn multipart(token: &str, fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Request<Body> {
    const BOUNDARY: &str = "bazaar-test-boundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/v1/products")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn create_in(app: &TestApp, token: &str, name: &str, category: &str) -> Value {
    let response = app
        .post(
            "/v1/products",
            Some(token),
            json!({ "name": name, "price": "5.00", "category": category }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    response.json()["product"].clone()
}

// =============================================================================
// JSON creation and listing
// =============================================================================

#[tokio::test]
async fn test_create_and_fetch_product() {
    let app = TestApp::new();
    let token = app.signup("seller@example.com").await;

    let product = app.create_product(&token, "Desk Lamp", "10.00", 5).await;
    assert_eq!(product["name"], "Desk Lamp");
    assert_eq!(product["price"], "10.00");
    assert_eq!(product["stock_quantity"], 5);
    assert_eq!(product["is_active"], true);

    let id = product["id"].as_str().unwrap();
    let fetched = app.get(&format!("/v1/products/{id}"), None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.json()["product"], product);
}

#[tokio::test]
async fn test_create_product_validation() {
    let app = TestApp::new();
    let token = app.signup("seller@example.com").await;

    let missing = app
        .post("/v1/products", Some(&token), json!({ "name": "Lamp" }))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        missing.json(),
        json!({ "error": "Product name and price are required" })
    );

    for price in [json!(0), json!("-1"), json!("1.005"), json!("ten")] {
        let response = app
            .post(
                "/v1/products",
                Some(&token),
                json!({ "name": "Lamp", "price": price }),
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "price {price}");
    }

    let negative_stock = app
        .post(
            "/v1/products",
            Some(&token),
            json!({ "name": "Lamp", "price": "1.00", "stock_quantity": -1 }),
        )
        .await;
    assert_eq!(negative_stock.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_filters_and_orders_newest_first() {
    let app = TestApp::new();
    let token = app.signup("seller@example.com").await;

    create_in(&app, &token, "Lamp", "lighting").await;
    create_in(&app, &token, "Mug", "kitchen").await;
    let bulb = create_in(&app, &token, "Bulb", "lighting").await;

    let deactivated = app
        .post(
            &format!("/v1/products/{}/deactivate", bulb["id"].as_str().unwrap()),
            Some(&token),
            json!({}),
        )
        .await;
    assert_eq!(deactivated.status, StatusCode::OK);
    assert_eq!(deactivated.json()["product"]["is_active"], false);

    let names = |body: Value| -> Vec<String> {
        body["products"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap().to_string())
            .collect()
    };

    let all_active = app.get("/v1/products", None).await;
    assert_eq!(names(all_active.json()), ["Mug", "Lamp"]);

    let lighting = app
        .get("/v1/products?category=lighting&active_only=false", None)
        .await;
    assert_eq!(names(lighting.json()), ["Bulb", "Lamp"]);

    let bad_flag = app.get("/v1/products?active_only=sometimes", None).await;
    assert_eq!(bad_flag.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_and_malformed_product_ids() {
    let app = TestApp::new();

    let unknown = app
        .get(&format!("/v1/products/{}", uuid::Uuid::new_v4()), None)
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.json(), json!({ "error": "Product not found" }));

    let malformed = app.get("/v1/products/42", None).await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Multipart creation
// =============================================================================

#[tokio::test]
async fn test_multipart_product_with_image() {
    let app = TestApp::new();
    let token = app.signup("seller@example.com").await;

    let response = app
        .send(multipart(
            &token,
            &[("name", "Poster"), ("price", "12.50"), ("stock_quantity", "3")],
            Some(("poster.PNG", b"\x89PNG fake image".as_slice())),
        ))
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());

    let product = response.json()["product"].clone();
    assert_eq!(product["price"], "12.50");
    let image_url = product["image_url"].as_str().unwrap().to_string();
    assert!(image_url.starts_with("/uploads/") && image_url.ends_with(".png"));

    // The stored file is served back
    let served = app.get(&image_url, None).await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(served.body, b"\x89PNG fake image");

    app.cleanup().await;
}

#[tokio::test]
async fn test_multipart_rejects_bad_images() {
    let app = TestApp::new();
    let token = app.signup("seller@example.com").await;
    let fields = [("name", "Poster"), ("price", "12.50")];

    let wrong_type = app
        .send(multipart(&token, &fields, Some(("poster.svg", b"<svg/>".as_slice()))))
        .await;
    assert_eq!(wrong_type.status, StatusCode::BAD_REQUEST);

    let too_big = vec![0_u8; MAX_UPLOAD_BYTES + 1];
    let oversized = app
        .send(multipart(&token, &fields, Some(("poster.png", too_big.as_slice()))))
        .await;
    assert_eq!(oversized.status, StatusCode::BAD_REQUEST);

    // Nothing was created
    let list = app.get("/v1/products", None).await;
    assert_eq!(list.json()["products"], json!([]));

    app.cleanup().await;
}

#[tokio::test]
async fn test_multipart_without_image() {
    let app = TestApp::new();
    let token = app.signup("seller@example.com").await;

    let response = app
        .send(multipart(
            &token,
            &[("name", "Sticker"), ("price", "1.00")],
            None,
        ))
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.json()["product"]["image_url"], json!(null));
    assert_eq!(response.json()["product"]["stock_quantity"], 0);
}
