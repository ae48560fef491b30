use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::User;
use crate::store::BackendType;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Represents the claims encoded within a JWT (JSON Web Token).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject of the token: the username.
    pub sub: String,
    /// Numeric id of the same user.
    pub uid: i32,
    pub token_type: TokenType,
    /// Issued at, seconds since epoch.
    pub iat: i64,
    /// Expiration, seconds since epoch. The token is valid up to and including this second.
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

/// An access token and the refresh token that can mint more of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues and checks HS256 bearer tokens.
///
/// Tokens are stateless: validation needs nothing but the signing secret and a clock.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    /// With the memory backend, identity ids restart at 1 with every process, so the signing
    /// key gets a per-process nonce and tokens die with the process that issued them.
    pub fn from_config(config: &Config) -> Self {
        match config.storage_backend {
            BackendType::Postgres => Self::new(
                config.jwt_secret.as_bytes(),
                config.access_token_ttl,
                config.refresh_token_ttl,
            ),
            BackendType::Memory => {
                log::info!("memory backend: issued tokens are valid only until this process exits");
                let secret = format!("{}:{}", config.jwt_secret, Uuid::new_v4());
                Self::new(
                    secret.as_bytes(),
                    config.access_token_ttl,
                    config.refresh_token_ttl,
                )
            }
        }
    }

    pub fn issue(&self, user: &User) -> Result<TokenPair, AppError> {
        self.issue_at(user, Utc::now().timestamp())
    }

    pub fn issue_at(&self, user: &User, now: i64) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access: self.sign(&user.username, user.id, TokenType::Access, now)?,
            refresh: self.sign(&user.username, user.id, TokenType::Refresh, now)?,
        })
    }

    /// Redeems a refresh token for a new access token bound to the same user.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, AppError> {
        self.refresh_at(refresh_token, Utc::now().timestamp())
    }

    pub fn refresh_at(&self, refresh_token: &str, now: i64) -> Result<String, AppError> {
        let claims = self.decode_checked(refresh_token, TokenType::Refresh, now)?;
        self.sign(&claims.sub, claims.uid, TokenType::Access, now)
    }

    /// Checks an access token and returns the identity it is bound to.
    pub fn validate(&self, access_token: &str) -> Result<Claims, AppError> {
        self.validate_at(access_token, Utc::now().timestamp())
    }

    pub fn validate_at(&self, access_token: &str, now: i64) -> Result<Claims, AppError> {
        self.decode_checked(access_token, TokenType::Access, now)
    }

    fn sign(&self, username: &str, uid: i32, token_type: TokenType, now: i64) -> Result<String, AppError> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let exp = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|secs| now.checked_add(secs))
            .ok_or_else(|| {
                AppError::Configuration(format!("Token lifetime out of range: {:?}", ttl))
            })?;
        let claims = Claims {
            sub: username.to_string(),
            uid,
            token_type,
            iat: now,
            exp,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Verifies the signature, then expiry against `now` with no leeway, then the token type.
    fn decode_checked(&self, token: &str, expected: TokenType, now: i64) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)?.claims;

        if now > claims.exp {
            log::debug!("{:?} token for {} expired at {}", expected, claims.sub, claims.exp);
            return Err(AppError::Unauthorized("Token is invalid or expired".into()));
        }
        if claims.token_type != expected {
            log::debug!("expected {:?} token, got {:?}", expected, claims.token_type);
            return Err(AppError::Unauthorized("Token is invalid or expired".into()));
        }
        Ok(claims)
    }
}
