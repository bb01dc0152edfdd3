//! Integration tests for Bazaar.
//!
//! Tests drive the full router (middleware, extractors, handlers, services)
//! with `tower::ServiceExt::oneshot`, backed by the in-memory store and the
//! scripted payment provider. No database or network is needed:
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use bazaar_core::CurrencyCode;
use bazaar_server::config::{PaymentConfig, ServerConfig, UploadConfig};
use bazaar_server::db::MemoryStore;
use bazaar_server::routes;
use bazaar_server::services::ScriptedPayments;
use bazaar_server::state::AppState;

/// Largest image accepted by the test app.
pub const MAX_UPLOAD_BYTES: usize = 1024;

/// A response as seen by a client.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Body parsed as JSON (`Null` when it is not JSON).
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    /// Body as UTF-8 text.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The application wired to in-memory collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub payments: ScriptedPayments,
    pub upload_dir: PathBuf,
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let upload_dir =
            std::env::temp_dir().join(format!("bazaar-it-{}", uuid::Uuid::new_v4()));
        let config = test_config(upload_dir.clone());

        let store = MemoryStore::new();
        let payments = ScriptedPayments::new();
        let state = AppState::new(&config, store.clone(), payments.clone());

        Self {
            router: routes::app(state, &config.cors_origins),
            store,
            payments,
            upload_dir,
        }
    }

    /// Send a raw request.
    ///
    /// # Panics
    ///
    /// Panics if the router fails or the body cannot be read.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body")
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Send a request with an optional bearer token and JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).expect("valid request")).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    /// Sign up and return the bearer token.
    ///
    /// # Panics
    ///
    /// Panics if signup does not succeed.
    pub async fn signup(&self, email: &str) -> String {
        let response = self
            .post(
                "/v1/signup",
                None,
                json!({ "email": email, "password": "correct horse" }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.json()["access_token"]
            .as_str()
            .expect("access_token in signup response")
            .to_string()
    }

    /// Create a product through the API and return its JSON.
    ///
    /// # Panics
    ///
    /// Panics if creation does not succeed.
    pub async fn create_product(&self, token: &str, name: &str, price: &str, stock: i32) -> Value {
        let response = self
            .post(
                "/v1/products",
                Some(token),
                json!({ "name": name, "price": price, "stock_quantity": stock }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.json()["product"].clone()
    }

    /// Add a product to the cart and return the cart JSON.
    ///
    /// # Panics
    ///
    /// Panics if the add does not succeed.
    pub async fn add_to_cart(&self, token: &str, product_id: &str, quantity: u32) -> Value {
        let response = self
            .post(
                "/v1/cart/add",
                Some(token),
                json!({ "product_id": product_id, "quantity": quantity }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        response.json()
    }

    /// Remove the upload directory.
    pub async fn cleanup(&self) {
        let _ = tokio::fs::remove_dir_all(&self.upload_dir).await;
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

fn test_config(upload_dir: PathBuf) -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from("postgres://unused"),
        host: [127, 0, 0, 1].into(),
        port: 0,
        token_ttl: chrono::Duration::hours(24),
        uploads: UploadConfig {
            dir: upload_dir,
            max_bytes: MAX_UPLOAD_BYTES,
        },
        payment: PaymentConfig {
            secret_key: SecretString::from("sk_test_unused"),
            api_base: url::Url::parse("http://127.0.0.1:1/v1").expect("valid URL"),
            currency: CurrencyCode::Usd,
            timeout: Duration::from_secs(1),
        },
        cors_origins: Vec::new(),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}
