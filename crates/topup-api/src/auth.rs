//! # Bearer Token Authentication
//!
//! A single static token guards every `/v1` route. When no token is
//! configured, authentication is disabled.
//!
//! ```text
//! Authorization: Bearer {token}
//! ```

use axum::extract::Request;
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::AppError;

/// Auth configuration injected into request extensions.
///
/// `Debug` redacts the token.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Constant-time token comparison.
fn token_matches(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        // Burn the same work as a real comparison.
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Check the `Authorization` header against `expected`.
fn check_header(value: Option<&str>, expected: &str) -> Result<(), &'static str> {
    let value = value.ok_or("missing authorization header")?;
    let provided = value
        .strip_prefix("Bearer ")
        .ok_or("authorization header must use Bearer scheme")?;
    if token_matches(provided.trim(), expected) {
        Ok(())
    } else {
        Err("invalid bearer token")
    }
}

/// Reject requests that do not carry the configured bearer token.
pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let expected = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|config| config.token.clone());

    let Some(expected) = expected else {
        return next.run(request).await;
    };

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match check_header(header_value, &expected) {
        Ok(()) => next.run(request).await,
        Err(reason) => {
            tracing::warn!(reason, "authentication failed");
            AppError::Unauthorized(reason.to_string()).into_response()
        }
    }
}
