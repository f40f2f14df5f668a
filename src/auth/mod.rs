// src/auth/mod.rs
//! Session tokens (HS256 JWT) and password hashing.
//!
//! Verification never errors: a bad token is simply "no session". Handlers
//! that need a user take the [`AuthUser`] extractor, which answers 401.

pub mod password;

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::AppError;
use crate::storage::UserRecord;

pub use password::{hash_password, verify_password};

const ACCESS_TOKEN_TYPE: &str = "access";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not create access token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(rename = "type")]
    pub token_type: String,
}

/// Identity carried by a valid token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: String,
    pub username: String,
    pub email: String,
}

impl From<&UserRecord> for SessionUser {
    fn from(u: &UserRecord) -> Self {
        Self {
            user_id: u.user_id.clone(),
            username: u.username.clone(),
            email: u.email.clone(),
        }
    }
}

pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl AuthKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 5;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::hours(ttl_hours.max(1)),
        }
    }

    pub fn create_access_token(&self, user: &SessionUser) -> Result<String, AuthError> {
        self.create_token_with_ttl(user, self.ttl)
    }

    pub fn create_token_with_ttl(
        &self,
        user: &SessionUser,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user.user_id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// `None` for expired, malformed, foreign-signed or non-access tokens.
    pub fn verify_access_token(&self, token: &str) -> Option<SessionUser> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| debug!(error = %e, "rejected token"))
            .ok()?;
        let c = data.claims;
        if c.token_type != ACCESS_TOKEN_TYPE {
            debug!(token_type = %c.token_type, "rejected token type");
            return None;
        }
        Some(SessionUser {
            user_id: c.user_id,
            username: c.username,
            email: c.email,
        })
    }
}

/// Authenticated caller, from `Authorization: Bearer <token>` (bare tokens are accepted too).
#[derive(Debug, Clone)]
pub struct AuthUser(pub SessionUser);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AuthKeys>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Authorization header required".into()))?
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid authorization header format".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .unwrap_or(header)
            .trim();
        if token.is_empty() {
            return Err(AppError::Unauthorized(
                "Invalid authorization header format".into(),
            ));
        }

        let keys = Arc::<AuthKeys>::from_ref(state);
        keys.verify_access_token(token)
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))
    }
}
