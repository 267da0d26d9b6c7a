use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, HeaderValue, header, request::Parts},
};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::AppError,
    models::User,
    repository::{Repository, RepositoryState},
};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Claims
///
/// Payload of a session token. `is_admin` is a snapshot taken at login; it is trusted by
/// the route guard and re-checked against the live record by admin handlers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: Uuid,
    pub is_admin: bool,
    /// Expiration (seconds since epoch).
    pub exp: usize,
    /// Issued at (seconds since epoch).
    pub iat: usize,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp as i64, 0)
            .single()
            .unwrap_or_default()
    }
}

/// A freshly signed token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// SessionKeys
///
/// Signs and verifies session tokens (HS256). Built once from `AppConfig` and shared
/// through the application state.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, config.session_ttl_secs)
    }

    /// Issues a token for `user`, embedding its current admin flag.
    pub fn issue(&self, user: &User) -> Result<IssuedSession, AppError> {
        let now = Utc::now().timestamp() as usize;
        let exp = usize::try_from(self.ttl_secs)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| AppError::Internal("session lifetime out of range".to_string()))?;
        let claims = Claims {
            sub: user.id,
            is_admin: user.is_admin,
            iat: now,
            exp,
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("token signing failed: {}", e)))?;

        Ok(IssuedSession {
            token,
            expires_at: claims.expires_at(),
        })
    }

    /// Decodes and validates `token`. Bad signatures, malformed input and expired tokens
    /// all yield `None`; callers treat that exactly like a missing token.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        // Expiry is exact; no clock-skew grace period.
        validation.leeway = 0;

        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "rejected session token");
                None
            }
        }
    }
}

// --- Password Hashing ---

/// Hashes `password` with Argon2id and a random salt, returning the PHC string.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| AppError::Internal(format!("salt generation failed: {}", e)))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("salt encoding failed: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

/// Checks `password` against a stored PHC hash. An unparseable hash never matches.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Emails are compared case-insensitively and without surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// authenticate
///
/// Resolves `{email, password}` to a user. Unknown email and wrong password both fail
/// with `InvalidCredentials`, so callers cannot tell which one it was.
pub async fn authenticate(
    repo: &dyn Repository,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let user = repo
        .find_user_by_email(&normalize_email(email))
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&user.password_hash, password) {
        tracing::info!(user_id = %user.id, "login rejected: wrong password");
        return Err(AppError::InvalidCredentials);
    }

    Ok(user)
}

// --- Token Transport ---

/// Reads a single cookie value from the `Cookie` header(s).
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Finds the session token: the session cookie first, then an `Authorization: Bearer` header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, SESSION_COOKIE).or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string)
    })
}

/// Verified claims of the request's session, if any.
pub fn session_claims(headers: &HeaderMap, keys: &SessionKeys) -> Option<Claims> {
    session_token(headers).and_then(|token| keys.verify(&token))
}

/// `Set-Cookie` value storing `session`.
pub fn session_cookie(session: &IssuedSession, secure: bool) -> Result<HeaderValue, AppError> {
    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, session.token, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::Internal(format!("invalid cookie header: {}", e)))
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(secure: bool) -> HeaderValue {
    if secure {
        HeaderValue::from_static("session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0; Secure")
    } else {
        HeaderValue::from_static("session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
    }
}

// --- Extractors ---

/// AuthUser
///
/// Resolved identity of an authenticated request. Built from the session token, then
/// confirmed against the live user record so deleted accounts and stale claims are
/// never trusted. The record is loaded once per request: the first extraction caches
/// it in the request extensions and later extractions reuse it.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    /// Live admin flag from the store, not the token snapshot.
    pub is_admin: bool,
    pub claims: Claims,
    pub user: User,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(cached) = parts.extensions.get::<AuthUser>() {
            return Ok(cached.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let keys = SessionKeys::from_ref(state);

        let claims = session_claims(&parts.headers, &keys).ok_or(AppError::Unauthorized)?;

        let user = repo
            .get_user(claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let auth_user = AuthUser {
            id: user.id,
            is_admin: user.is_admin,
            claims,
            user,
        };
        parts.extensions.insert(auth_user.clone());
        Ok(auth_user)
    }
}

/// AdminUser
///
/// An `AuthUser` whose live record currently has the admin flag. Every mutating admin
/// handler takes this extractor, independently of the page-level route guard.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        if !user.is_admin {
            tracing::warn!(user_id = %user.id, token_admin = user.claims.is_admin, "admin action denied");
            return Err(AppError::Unauthorized);
        }

        Ok(AdminUser(user))
    }
}
