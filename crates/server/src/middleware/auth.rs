//! Bearer-token authentication extractor.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};

use crate::db::Store;
use crate::error::{AppError, set_sentry_user};
use crate::models::Account;
use crate::services::auth::AuthError;
use crate::services::PaymentBridge;
use crate::state::AppState;

/// Extractor that requires a valid `Authorization: Bearer <token>` header.
///
/// Rejects with 401 `{"error": ...}` when the header is missing or
/// malformed, or the token is unknown or expired.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(account): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", account.email)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub Account);

impl<S: Store, P: PaymentBridge> FromRequestParts<AppState<S, P>> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, P>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Authorization token required".to_string()))?;

        let account = state.auth().authenticate(token).await.map_err(|e| match e {
            AuthError::InvalidToken => {
                AppError::Unauthorized("Invalid or expired token".to_string())
            }
            other => other.into(),
        })?;

        set_sentry_user(&account.id, Some(account.email.as_str()));
        tracing::Span::current().record("account_id", tracing::field::display(account.id));

        Ok(Self(account))
    }
}

/// Token from an `Authorization: Bearer` header, if present and non-empty.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
