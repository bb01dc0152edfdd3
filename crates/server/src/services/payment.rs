//! Payment bridge: payment-intent creation and retrieval.
//!
//! Production uses [`StripeBridge`], a thin client for the Stripe
//! `PaymentIntents` REST API. Tests use `ScriptedPayments`, which lets a
//! test decide what each intent's status is.

use std::future::Future;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use bazaar_core::{AccountId, CurrencyCode};

use crate::config::PaymentConfig;

/// Errors that can occur when talking to the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed (includes timeouts).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Status of a payment intent as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    /// Any status this client does not know about.
    #[serde(other)]
    Unknown,
}

impl IntentStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Canceled => "canceled",
            Self::Succeeded => "succeeded",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    /// Provider reference, e.g. `pi_3N...`.
    pub id: String,
    /// Token the client uses to complete payment. Only present on creation.
    #[serde(default)]
    pub client_secret: Option<String>,
    pub status: IntentStatus,
    /// Amount in minor units.
    pub amount: i64,
}

/// Parameters for a new payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    /// Amount in minor units (cents).
    pub amount: i64,
    pub currency: CurrencyCode,
    /// Recorded as intent metadata for reconciliation.
    pub account_id: AccountId,
}

/// Payment-intent operations the checkout needs.
pub trait PaymentBridge: Clone + Send + Sync + 'static {
    /// Create a payment intent.
    fn create_intent(
        &self,
        request: &IntentRequest,
    ) -> impl Future<Output = Result<PaymentIntent, PaymentError>> + Send;

    /// Fetch the authoritative state of a payment intent.
    fn retrieve_intent(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<PaymentIntent, PaymentError>> + Send;
}

/// Stripe REST client.
#[derive(Clone, Debug)]
pub struct StripeBridge {
    client: reqwest::Client,
    api_base: Url,
}

/// Stripe's error envelope.
#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

impl StripeBridge {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the secret key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth_value = HeaderValue::from_str(&auth_value)
            .map_err(|e| PaymentError::Parse(format!("Invalid API key format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
        })
    }

    fn intents_url(&self, id: Option<&str>) -> Result<Url, PaymentError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| PaymentError::Parse("API base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("payment_intents")
            .extend(id);
        Ok(url)
    }

    async fn read_intent(response: reqwest::Response) -> Result<PaymentIntent, PaymentError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(body);
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))
    }
}

impl PaymentBridge for StripeBridge {
    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, PaymentError> {
        let url = self.intents_url(None)?;
        let params = [
            ("amount", request.amount.to_string()),
            ("currency", request.currency.as_str().to_string()),
            ("metadata[account_id]", request.account_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let response = self.client.post(url).form(&params).send().await?;
        let intent = Self::read_intent(response).await?;

        if intent.client_secret.is_none() {
            return Err(PaymentError::Parse(
                "payment intent has no client_secret".to_string(),
            ));
        }
        tracing::info!(payment_reference = %intent.id, amount = intent.amount, "Payment intent created");
        Ok(intent)
    }

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, PaymentError> {
        let url = self.intents_url(Some(id))?;
        let response = self.client.get(url).send().await?;
        Self::read_intent(response).await
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use scripted::ScriptedPayments;

#[cfg(any(test, feature = "test-support"))]
mod scripted {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

    use super::{IntentRequest, IntentStatus, PaymentBridge, PaymentError, PaymentIntent};

    #[derive(Debug, Default)]
    struct Script {
        intents: HashMap<String, (IntentRequest, IntentStatus)>,
        created: Vec<String>,
        fail_next_create: bool,
        omit_next_secret: bool,
        fail_retrieve: bool,
        retrieve_calls: usize,
    }

    /// Payment bridge whose intent statuses are set by the test.
    ///
    /// New intents start in `requires_payment_method`.
    #[derive(Clone, Debug, Default)]
    pub struct ScriptedPayments {
        script: Arc<Mutex<Script>>,
    }

    impl ScriptedPayments {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        fn script(&self) -> MutexGuard<'_, Script> {
            self.script.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Make the next `create_intent` call fail like an outage.
        pub fn fail_next_create(&self) {
            self.script().fail_next_create = true;
        }

        /// Make the next created intent come back without a client secret.
        pub fn omit_next_secret(&self) {
            self.script().omit_next_secret = true;
        }

        /// Make every `retrieve_intent` call fail until reset.
        pub fn fail_retrieve(&self, fail: bool) {
            self.script().fail_retrieve = fail;
        }

        /// Set the status the provider reports for an intent.
        pub fn set_status(&self, id: &str, status: IntentStatus) {
            if let Some((_, current)) = self.script().intents.get_mut(id) {
                *current = status;
            }
        }

        /// Mark an intent as paid.
        pub fn succeed(&self, id: &str) {
            self.set_status(id, IntentStatus::Succeeded);
        }

        /// IDs of every intent created so far, oldest first.
        #[must_use]
        pub fn created(&self) -> Vec<String> {
            self.script().created.clone()
        }

        /// The request an intent was created with.
        #[must_use]
        pub fn request(&self, id: &str) -> Option<IntentRequest> {
            self.script().intents.get(id).map(|(r, _)| r.clone())
        }

        /// Number of `retrieve_intent` calls made.
        #[must_use]
        pub fn retrieve_calls(&self) -> usize {
            self.script().retrieve_calls
        }
    }

    impl PaymentBridge for ScriptedPayments {
        async fn create_intent(
            &self,
            request: &IntentRequest,
        ) -> Result<PaymentIntent, PaymentError> {
            let mut script = self.script();
            if std::mem::take(&mut script.fail_next_create) {
                return Err(PaymentError::Api {
                    status: 503,
                    message: "scripted outage".to_string(),
                });
            }
            let id = format!("pi_scripted_{}", script.created.len() + 1);
            let status = IntentStatus::RequiresPaymentMethod;
            script
                .intents
                .insert(id.clone(), (request.clone(), status));
            script.created.push(id.clone());
            let client_secret =
                (!std::mem::take(&mut script.omit_next_secret)).then(|| format!("{id}_secret"));
            Ok(PaymentIntent {
                client_secret,
                id,
                status,
                amount: request.amount,
            })
        }

        async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, PaymentError> {
            let mut script = self.script();
            script.retrieve_calls += 1;
            if script.fail_retrieve {
                return Err(PaymentError::Api {
                    status: 503,
                    message: "scripted outage".to_string(),
                });
            }
            let (request, status) = script.intents.get(id).ok_or_else(|| PaymentError::Api {
                status: 404,
                message: format!("No such payment_intent: '{id}'"),
            })?;
            Ok(PaymentIntent {
                id: id.to_string(),
                client_secret: None,
                status: *status,
                amount: request.amount,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;

    fn config(api_base: &str) -> PaymentConfig {
        PaymentConfig {
            secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
            api_base: Url::parse(api_base).unwrap(),
            currency: CurrencyCode::Usd,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_intent_status_parses_unknown_values() {
        let status: IntentStatus = serde_json::from_str("\"succeeded\"").unwrap();
        assert_eq!(status, IntentStatus::Succeeded);
        let status: IntentStatus = serde_json::from_str("\"something_new\"").unwrap();
        assert_eq!(status, IntentStatus::Unknown);
    }

    #[test]
    fn test_intent_deserializes_from_stripe_shape() {
        let json = r#"{
            "id": "pi_123",
            "object": "payment_intent",
            "amount": 2000,
            "currency": "usd",
            "client_secret": "pi_123_secret_abc",
            "status": "requires_payment_method"
        }"#;
        let intent: PaymentIntent = serde_json::from_str(json).unwrap();
        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.amount, 2000);
        assert_eq!(intent.client_secret.as_deref(), Some("pi_123_secret_abc"));
        assert_eq!(intent.status, IntentStatus::RequiresPaymentMethod);
    }

    #[test]
    fn test_intents_url() {
        let bridge = StripeBridge::new(&config("https://api.stripe.com/v1")).unwrap();
        assert_eq!(
            bridge.intents_url(None).unwrap().as_str(),
            "https://api.stripe.com/v1/payment_intents"
        );
        assert_eq!(
            bridge.intents_url(Some("pi_1")).unwrap().as_str(),
            "https://api.stripe.com/v1/payment_intents/pi_1"
        );

        let bridge = StripeBridge::new(&config("http://localhost:12111/v1/")).unwrap();
        assert_eq!(
            bridge.intents_url(Some("pi_1")).unwrap().as_str(),
            "http://localhost:12111/v1/payment_intents/pi_1"
        );
    }

    #[tokio::test]
    async fn test_scripted_payments_follow_script() {
        let payments = ScriptedPayments::new();
        let request = IntentRequest {
            amount: 2000,
            currency: CurrencyCode::Usd,
            account_id: AccountId::new(),
        };

        let intent = payments.create_intent(&request).await.unwrap();
        assert_eq!(intent.status, IntentStatus::RequiresPaymentMethod);
        assert!(intent.client_secret.is_some());

        payments.succeed(&intent.id);
        let fetched = payments.retrieve_intent(&intent.id).await.unwrap();
        assert_eq!(fetched.status, IntentStatus::Succeeded);
        assert_eq!(payments.retrieve_calls(), 1);

        payments.fail_next_create();
        assert!(payments.create_intent(&request).await.is_err());
        assert!(payments.create_intent(&request).await.is_ok());
    }
}
