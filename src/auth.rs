use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::{Role, User},
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the HS256 access token issued at login.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id. Role is deliberately absent and re-read from the
    /// database on every request, so a demotion takes effect immediately.
    pub sub: i64,
    pub username: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued at (UTC Unix timestamp).
    pub iat: i64,
}

/// AuthUser
///
/// The resolved identity of an authenticated request: the actor of every workflow
/// operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
        }
    }
}

/// issue_token
///
/// Signs an access token for `user` valid for `config.token_ttl_hours`.
pub fn issue_token(user: &User, config: &AppConfig) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        exp: (now + Duration::hours(config.token_ttl_hours)).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
}

/// decode_token
///
/// Verifies signature and expiry and returns the embedded claims.
pub fn decode_token(token: &str, config: &AppConfig) -> Result<Claims, AppError> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::Unauthorized("Token expired".to_string()),
            _ => AppError::Unauthorized("Invalid token".to_string()),
        })
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument. The process:
/// 1. Dependency Resolution: Repository and AppConfig from the application state.
/// 2. Dev Bypass: only with `auth_dev_bypass`, an `x-user-id` header naming an existing user.
/// 3. Token Validation: Bearer token extraction and JWT decoding.
/// 4. DB Lookup: the user must still exist; the role comes from the row.
///
/// Rejection: `AppError::Unauthorized` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.auth_dev_bypass && config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<i64>().ok());
            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.get_user(user_id).await? {
                    return Ok(AuthUser::from(&user));
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

        let claims = decode_token(token, &config).inspect_err(|e| {
            tracing::warn!(reason = %e, "rejected bearer token");
        })?;

        // A valid token for a user that no longer exists is not a session.
        let user = repo
            .get_user(claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))?;

        Ok(AuthUser::from(&user))
    }
}
