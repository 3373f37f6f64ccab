//! JWT Authentication
//!
//! Two token stages: `getuid` issues a short-lived nonce token carrying
//! only the uid; `login` upgrades it to a session token carrying the
//! wallet and ecosystem. Protected routes require the session stage.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Nonce token lifetime in seconds.
const UID_TOKEN_TTL: i64 = 600;
/// Session token lifetime in seconds.
const SESSION_TOKEN_TTL: i64 = 36_000;

/// JWT claims for both token stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Login nonce; present only before login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Wallet id; present after login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<i64>,
    #[serde(default)]
    pub ecosystem_id: i64,
    pub exp: i64,
    pub iat: i64,
}

pub fn issue_uid_token(secret: &str, uid: &str) -> Result<String, ApiError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        uid: Some(uid.to_string()),
        key_id: None,
        ecosystem_id: 0,
        exp: now + UID_TOKEN_TTL,
        iat: now,
    };
    sign(secret, &claims)
}

pub fn issue_session_token(
    secret: &str,
    key_id: i64,
    ecosystem_id: i64,
) -> Result<String, ApiError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        uid: None,
        key_id: Some(key_id),
        ecosystem_id,
        exp: now + SESSION_TOKEN_TTL,
        iat: now,
    };
    sign(secret, &claims)
}

fn sign(secret: &str, claims: &Claims) -> Result<String, ApiError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::InternalError(e.to_string()))
}

/// Extract the raw token from an Authorization header value.
pub fn extract_token(auth_header: &str) -> Result<&str, ApiError> {
    auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("expected Bearer token".to_string()))
}

pub fn validate_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| ApiError::Unauthorized(e.to_string()))
}

fn bearer_claims(state: &AppState, request: &Request) -> Result<Claims, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Authorization header is required".to_string()))?;
    validate_token(&state.jwt_secret, extract_token(header)?)
}

/// Requires a logged-in session token; stores claims for handlers.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = bearer_claims(&state, &request)?;
    if claims.key_id.is_none() {
        return Err(ApiError::Unauthorized("login required".to_string()));
    }
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Requires at least a nonce token (the login route).
pub async fn require_uid(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = bearer_claims(&state, &request)?;
    if claims.uid.is_none() {
        return Err(ApiError::Unauthorized("uid token required".to_string()));
    }
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret-0123456789abcdef";

    #[test]
    fn uid_token_round_trip() {
        let token = issue_uid_token(SECRET, "nonce-1").unwrap();
        let claims = validate_token(SECRET, &token).unwrap();
        assert_eq!(claims.uid.as_deref(), Some("nonce-1"));
        assert!(claims.key_id.is_none());
    }

    #[test]
    fn session_token_round_trip() {
        let token = issue_session_token(SECRET, -42, 1).unwrap();
        let claims = validate_token(SECRET, &token).unwrap();
        assert_eq!(claims.key_id, Some(-42));
        assert_eq!(claims.ecosystem_id, 1);
    }

    #[test]
    fn extract_token_requires_bearer() {
        assert!(extract_token("Bearer abc").is_ok());
        assert!(extract_token("Basic abc").is_err());
        assert!(extract_token("abc").is_err());
    }

    #[test]
    fn tampered_tokens_fail() {
        let token = issue_session_token(SECRET, 1, 1).unwrap();
        assert!(validate_token("different-secret-0123456789abcdef", &token).is_err());
        assert!(validate_token(SECRET, &format!("{}x", token)).is_err());
    }
}
