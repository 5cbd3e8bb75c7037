use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    gate::{self, Access, Permission, Requirement},
    repository::RepositoryState,
};

/// Development-only header carrying a user id, honoured in `Env::Local`.
pub const DEV_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of the bearer tokens issued by `/login` and `/register`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id in the `users` table.
    pub sub: i64,
    /// Expiration time (seconds since the epoch).
    pub exp: usize,
    /// Issued at.
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request: who the caller is and what
/// they may do. Handlers call `authorize` before touching the repository.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub access: Access,
}

impl AuthUser {
    pub fn can(&self, permission: Permission) -> bool {
        self.access.can(permission)
    }

    /// Runs the authorization gate for this (already authenticated) identity.
    pub fn authorize(&self, requirement: impl Into<Requirement>) -> Result<(), AppError> {
        let requirement = requirement.into();
        let decision = gate::check(Some(&self.access), requirement);
        if decision != gate::Decision::Allow {
            tracing::warn!(user_id = self.id, ?requirement, "authorization denied");
        }
        decision.into_result()
    }
}

/// True when the caller asked for JSON (API clients); browsers get redirects instead.
pub fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}

/// AuthUser Extractor
///
/// 1. Reuses an identity already resolved by `auth_middleware` for this request.
/// 2. In `Env::Local`, accepts the `x-user-id` bypass header.
/// 3. Otherwise decodes the `Authorization: Bearer` JWT and loads the user and their
///    roles/permissions from the repository, so deleted users lose access at once.
///
/// Rejection: `AppError::AuthenticationRequired`, which redirects to `/login`.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        let unauthenticated = AppError::AuthenticationRequired {
            wants_json: wants_json(&parts.headers),
        };

        let user_id = match dev_bypass_user(&parts.headers, &config) {
            Some(id) => id,
            None => {
                let Some(token) = bearer_token(&parts.headers) else {
                    return Err(unauthenticated);
                };
                match decode_token(token, &config.jwt_secret) {
                    Some(claims) => claims.sub,
                    None => return Err(unauthenticated),
                }
            }
        };

        // A valid token for a user that no longer exists is not an identity.
        if repo.get_user(user_id).await?.is_none() {
            return Err(unauthenticated);
        }
        let access = repo.get_access(user_id).await?;

        let user = AuthUser {
            id: user_id,
            access,
        };
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

fn dev_bypass_user(headers: &HeaderMap, config: &AppConfig) -> Option<i64> {
    if config.env != Env::Local {
        return None;
    }
    headers
        .get(DEV_USER_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Decodes and validates (signature, expiry) a bearer token.
pub fn decode_token(token: &str, secret: &str) -> Option<Claims> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    match decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            tracing::debug!("rejected bearer token: {}", e);
            None
        }
    }
}

/// Signs a token for `user_id` valid for `ttl_secs`.
pub fn issue_token(user_id: i64, secret: &str, ttl_secs: u64) -> Result<String, AppError> {
    let now = Utc::now().timestamp().max(0) as usize;
    let claims = Claims {
        sub: user_id,
        iat: now,
        exp: now + ttl_secs as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
}

/// Argon2id PHC string for `password`.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut rand_core::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!("stored password hash is malformed: {}", e);
            false
        }
    }
}
