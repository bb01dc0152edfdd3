//! Signup and signin.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::db::Store;
use crate::error::{AppError, JsonBody, Result};
use crate::models::Account;
use crate::services::{AuthSession, PaymentBridge};
use crate::state::AppState;

pub fn router<S: Store, P: PaymentBridge>() -> Router<AppState<S, P>> {
    Router::new()
        .route("/signup", post(signup::<S, P>))
        .route("/signin", post(signin::<S, P>))
}

/// Credentials as submitted. Both fields are checked by hand so a missing
/// one gets the same message as an empty one.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl CredentialsRequest {
    fn into_parts(self) -> Result<(String, String)> {
        match (self.email, self.password) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Ok((email, password))
            }
            _ => Err(AppError::BadRequest(
                "Email and password are required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub message: &'static str,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub account: Account,
}

impl SessionResponse {
    fn new(message: &'static str, session: AuthSession) -> Self {
        Self {
            message,
            access_token: session.access_token.expose_secret().to_string(),
            expires_at: session.expires_at,
            account: session.account,
        }
    }
}

/// Register an account and sign it in.
pub async fn signup<S: Store, P: PaymentBridge>(
    State(state): State<AppState<S, P>>,
    JsonBody(body): JsonBody<CredentialsRequest>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let (email, password) = body.into_parts()?;
    let session = state.auth().register(&email, &password).await?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::new("User created successfully", session)),
    ))
}

/// Exchange credentials for a bearer token.
pub async fn signin<S: Store, P: PaymentBridge>(
    State(state): State<AppState<S, P>>,
    JsonBody(body): JsonBody<CredentialsRequest>,
) -> Result<Json<SessionResponse>> {
    let (email, password) = body.into_parts()?;
    let session = state.auth().login(&email, &password).await?;
    Ok(Json(SessionResponse::new("Login successful", session)))
}
