//! Google sign-in.
//!
//! The browser obtains an ID token from Google and posts it to `/auth/google/`. The token is
//! checked against Google's published signing keys (RS256, issuer, our client id as
//! audience, expiry), and only a token asserting a verified email address is accepted. The
//! email becomes the local username; an identity is created on first sign-in with no usable
//! password and is reused unchanged afterwards.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::auth::{GoogleLoginResponse, TokenService};
use crate::config::GoogleConfig;
use crate::error::AppError;
use crate::models::NewUser;
use crate::store::UserStore;

/// Both spellings Google uses for the `iss` claim.
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Do not refetch the key set more often than this when an unknown `kid` shows up.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// JSON Web Key as defined in RFC 7517. Only RSA signing keys are used.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,
    pub kid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// RSA modulus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl Jwk {
    pub fn to_decoding_key(&self) -> Result<DecodingKey, AppError> {
        let unusable = |reason: &str| {
            log::warn!("signing key {} is unusable: {}", self.kid, reason);
            AppError::ServiceUnavailable("Identity provider returned an unusable key".into())
        };

        if self.kty != "RSA" {
            return Err(unusable("not an RSA key"));
        }
        let n = self.n.as_deref().ok_or_else(|| unusable("missing 'n'"))?;
        let e = self.e.as_deref().ok_or_else(|| unusable("missing 'e'"))?;
        DecodingKey::from_rsa_components(n, e).map_err(|err| unusable(&err.to_string()))
    }
}

/// JWKS document as served by the issuer.
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// Where the issuer's current signing keys come from.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Looks up a key by id. `Ok(None)` means the issuer does not publish that key.
    async fn find_key(&self, kid: &str) -> Result<Option<Jwk>, AppError>;
}

/// A fixed key set, e.g. loaded from a file.
pub struct StaticJwks {
    keys: Vec<Jwk>,
}

impl StaticJwks {
    pub fn new(keys: Vec<Jwk>) -> Self {
        Self { keys }
    }

    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let set: JwkSet = serde_json::from_str(json)
            .map_err(|e| AppError::Configuration(format!("Invalid JWKS document: {}", e)))?;
        Ok(Self::new(set.keys))
    }
}

#[async_trait]
impl KeySource for StaticJwks {
    async fn find_key(&self, kid: &str) -> Result<Option<Jwk>, AppError> {
        Ok(self.keys.iter().find(|key| key.kid == kid).cloned())
    }
}

struct CachedKeys {
    keys: Vec<Jwk>,
    fetched_at: Instant,
}

/// Google's key set fetched over HTTPS and kept for `ttl`.
///
/// Every fetch is bounded by the client timeout; a failed or timed-out fetch surfaces as
/// `ServiceUnavailable` and is not retried.
pub struct RemoteJwks {
    client: reqwest::Client,
    url: String,
    ttl: Duration,
    refresh_interval: Duration,
    cache: RwLock<Option<CachedKeys>>,
}

impl RemoteJwks {
    pub fn new(url: impl Into<String>, timeout: Duration, ttl: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            ttl,
            refresh_interval: MIN_REFRESH_INTERVAL,
            cache: RwLock::new(None),
        })
    }

    /// Minimum age of the cached set before an unknown `kid` triggers a refetch.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    async fn fetch(&self) -> Result<Vec<Jwk>, AppError> {
        log::info!("fetching signing keys from {}", self.url);
        let set: JwkSet = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(set.keys)
    }
}

#[async_trait]
impl KeySource for RemoteJwks {
    async fn find_key(&self, kid: &str) -> Result<Option<Jwk>, AppError> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            let age = cached.fetched_at.elapsed();
            if age < self.ttl {
                let found = cached.keys.iter().find(|key| key.kid == kid).cloned();
                if found.is_some() || age < self.refresh_interval {
                    return Ok(found);
                }
            }
        }

        let keys = self.fetch().await?;
        let found = keys.iter().find(|key| key.kid == kid).cloned();
        *self.cache.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        Ok(found)
    }
}

/// The subset of ID-token claims this service reads.
#[derive(Debug, Deserialize)]
struct GoogleClaims {
    #[serde(default)]
    email: Option<String>,
    /// Google sends a boolean; some libraries re-encode it as a string.
    #[serde(default)]
    email_verified: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
}

fn is_verified(flag: Option<&Value>) -> bool {
    match flag {
        Some(Value::Bool(verified)) => *verified,
        Some(Value::String(verified)) => verified.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A verified Google identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub email: String,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

impl GoogleIdentity {
    /// The identity to create on first sign-in: username is the email, there is no password,
    /// and the first name falls back to the full name when no given name is present.
    pub fn new_user(&self) -> NewUser {
        NewUser {
            username: self.email.clone(),
            email: Some(self.email.clone()),
            password_hash: None,
            first_name: self
                .given_name
                .clone()
                .or_else(|| self.name.clone())
                .unwrap_or_default(),
            last_name: self.family_name.clone().unwrap_or_default(),
        }
    }
}

fn invalid_token(reason: impl std::fmt::Display) -> AppError {
    log::debug!("Google ID token rejected: {}", reason);
    AppError::Unauthorized("Invalid Google token".into())
}

pub struct GoogleVerifier {
    enabled: bool,
    client_id: Option<String>,
    keys: Arc<dyn KeySource>,
}

impl GoogleVerifier {
    pub fn new(enabled: bool, client_id: Option<String>, keys: Arc<dyn KeySource>) -> Self {
        Self {
            enabled,
            client_id,
            keys,
        }
    }

    pub fn from_config(config: &GoogleConfig) -> Result<Self, AppError> {
        let keys = RemoteJwks::new(config.jwks_url.clone(), config.http_timeout, config.jwks_cache_ttl)?;
        Ok(Self::new(config.enabled, config.client_id.clone(), Arc::new(keys)))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Checks an ID token and returns the identity it asserts.
    ///
    /// Order of checks: availability, presence of the token, configured audience, then
    /// signature/issuer/audience/expiry, then a verified email.
    pub async fn verify(&self, id_token: Option<&str>) -> Result<GoogleIdentity, AppError> {
        if !self.enabled {
            return Err(AppError::ServiceUnavailable(
                "Google auth is not available on server".into(),
            ));
        }

        let token = id_token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::ValidationError("id_token is required".into()))?;

        let client_id = self
            .client_id
            .as_deref()
            .ok_or_else(|| AppError::Configuration("GOOGLE_CLIENT_ID is not set".into()))?;

        let header = decode_header(token).map_err(invalid_token)?;
        if header.alg != Algorithm::RS256 {
            return Err(invalid_token(format!("unexpected algorithm {:?}", header.alg)));
        }
        let kid = header.kid.ok_or_else(|| invalid_token("missing kid"))?;
        let jwk = self
            .keys
            .find_key(&kid)
            .await?
            .ok_or_else(|| invalid_token(format!("unknown kid {}", kid)))?;
        let key = jwk.to_decoding_key()?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[client_id]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = 0;

        let claims = decode::<GoogleClaims>(token, &key, &validation)
            .map_err(invalid_token)?
            .claims;

        let verified = is_verified(claims.email_verified.as_ref());
        let email = match non_blank(claims.email) {
            Some(email) if verified => email,
            _ => {
                log::warn!("Google sign-in rejected: email missing or not verified");
                return Err(AppError::Unauthorized(
                    "Google account email not verified".into(),
                ));
            }
        };

        Ok(GoogleIdentity {
            email,
            name: non_blank(claims.name),
            given_name: non_blank(claims.given_name),
            family_name: non_blank(claims.family_name),
        })
    }

    /// Verifies the token, resolves (or creates) the local identity and issues tokens.
    ///
    /// The verified email is matched against usernames, whatever created them. An account
    /// registered with a password under that email is reused as is and keeps its password.
    pub async fn verify_and_login(
        &self,
        users: &dyn UserStore,
        tokens: &TokenService,
        id_token: Option<&str>,
    ) -> Result<GoogleLoginResponse, AppError> {
        let identity = self.verify(id_token).await?;

        let (user, created) = users.get_or_create_user(identity.new_user()).await?;
        if created {
            log::info!("created user {} (id {}) from Google sign-in", user.username, user.id);
        }

        let pair = tokens.issue(&user)?;
        Ok(GoogleLoginResponse {
            access: pair.access,
            refresh: pair.refresh,
            user: user.profile(),
        })
    }
}
