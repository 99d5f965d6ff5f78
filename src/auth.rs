use actix_web::{dev::Payload, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use std::future::{ready, Ready};

use crate::error::ApiError;
pub use crate::models::Role;
use crate::models::{Id, User};

pub const ACCESS_TTL_MINUTES: i64 = 60;
pub const REFRESH_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id as a decimal string.
    pub sub: String,
    pub username: String,
    pub role: Role,
    pub token_type: TokenType,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<Id, AuthError> {
        self.sub.parse().map_err(|_| AuthError::Invalid)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("authorization required")]
    Missing,
    #[error("invalid token")]
    Invalid,
    #[error("access token expired, send a refresh token")]
    AccessExpired,
    #[error("all tokens expired, log in again")]
    RefreshExpired,
    #[error("wrong token type")]
    WrongType,
    #[error("JWT_SECRET not set")]
    NoSecret,
    #[error("token encoding failed")]
    Encode,
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::NoSecret | AuthError::Encode => {
                tracing::error!(error = %e, "token machinery misconfigured");
                ApiError::Internal
            }
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

fn secret() -> Result<String, AuthError> {
    env::var("JWT_SECRET").map_err(|_| AuthError::NoSecret)
}

/// Validate a JWT and return its claims.
///
/// Expiry is checked by hand so that the two token kinds get distinct
/// messages.
pub fn decode_jwt(token: &str) -> Result<Claims, AuthError> {
    let secret = secret()?;
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    let claims = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|_| AuthError::Invalid)?
        .claims;
    if (claims.exp as i64) < chrono::Utc::now().timestamp() {
        return Err(match claims.token_type {
            TokenType::Access => AuthError::AccessExpired,
            TokenType::Refresh => AuthError::RefreshExpired,
        });
    }
    Ok(claims)
}

/// Decode and require a specific token type.
pub fn decode_typed(token: &str, expected: TokenType) -> Result<Claims, AuthError> {
    let claims = decode_jwt(token)?;
    if claims.token_type != expected {
        return Err(AuthError::WrongType);
    }
    Ok(claims)
}

/// Extractor yielding validated access-token `Claims`.
pub struct Auth(pub Claims);

impl Auth {
    pub fn user_id(&self) -> Result<Id, ApiError> {
        Ok(self.0.user_id()?)
    }
}

impl FromRequest for Auth {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, actix_web::Error>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        // Delegate to BearerAuth to parse the header.
        let result = match BearerAuth::from_request(req, pl).into_inner() {
            Ok(bearer) => decode_typed(bearer.token(), TokenType::Access).map(Auth),
            Err(_) => Err(AuthError::Missing),
        };
        ready(result.map_err(|e| ApiError::from(e).into()))
    }
}

/// Helper macro for role-guarding handlers.
#[macro_export]
macro_rules! require_role {
    ($auth:expr, $role:pat) => {
        if !matches!($auth.0.role, $role) {
            return Err($crate::error::ApiError::Forbidden("insufficient role".into()));
        }
    };
}

fn create_jwt(user: &User, token_type: TokenType, ttl: chrono::Duration) -> Result<String, AuthError> {
    let secret = secret()?;
    let expiration = chrono::Utc::now()
        .checked_add_signed(ttl)
        .ok_or(AuthError::Encode)?
        .timestamp() as usize;

    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        role: user.role,
        token_type,
        exp: expiration,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|_| AuthError::Encode)
}

pub fn create_access_token(user: &User) -> Result<String, AuthError> {
    create_jwt(user, TokenType::Access, chrono::Duration::minutes(ACCESS_TTL_MINUTES))
}

pub fn create_refresh_token(user: &User) -> Result<String, AuthError> {
    create_jwt(user, TokenType::Refresh, chrono::Duration::days(REFRESH_TTL_DAYS))
}

/// Argon2id PHC string for `password`.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            ApiError::Internal
        })
}

pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}
