use actix_web::web;
use bcrypt::{hash, verify};
use validator::Validate;

use crate::auth::{RegisterRequest, TokenPair, TokenService};
use crate::error::AppError;
use crate::models::{NewUser, User};
use crate::store::UserStore;

/// The one message every failed password login gets, whatever the cause.
const INVALID_CREDENTIALS: &str = "No active account found with the given credentials";

/// bcrypt only looks at this many bytes of its input.
pub const BCRYPT_MAX_PASSWORD_BYTES: usize = 72;

pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    if password.len() > BCRYPT_MAX_PASSWORD_BYTES {
        return Err(AppError::ValidationError(
            "Password must be at most 72 bytes".into(),
        ));
    }
    hash(password, cost)
        .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hashed_password: &str) -> Result<bool, AppError> {
    verify(password, hashed_password)
        .map_err(|e| AppError::InternalServerError(format!("Failed to verify password: {}", e)))
}

/// Registers identities with a bcrypt-hashed password and logs them in.
///
/// Hashing runs on the blocking thread pool so it never stalls a request worker.
#[derive(Debug, Clone, Copy)]
pub struct PasswordAuthenticator {
    cost: u32,
}

impl PasswordAuthenticator {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_string();
        let cost = self.cost;
        web::block(move || hash_password(&password, cost))
            .await
            .map_err(|e| AppError::InternalServerError(format!("Hashing task failed: {}", e)))?
    }

    async fn verify(&self, password: &str, hashed_password: &str) -> Result<bool, AppError> {
        let password = password.to_string();
        let hashed_password = hashed_password.to_string();
        web::block(move || verify_password(&password, &hashed_password))
            .await
            .map_err(|e| AppError::InternalServerError(format!("Verification task failed: {}", e)))?
    }

    /// Creates an identity with a hashed password. Does not issue tokens.
    pub async fn register(
        &self,
        users: &dyn UserStore,
        request: RegisterRequest,
    ) -> Result<User, AppError> {
        let request = request.normalized();
        request.validate()?;

        let password_hash = self.hash(&request.password).await?;
        let user = users
            .create_user(NewUser {
                username: request.username,
                email: request.email,
                password_hash: Some(password_hash),
                first_name: request.first_name.unwrap_or_default(),
                last_name: String::new(),
            })
            .await?;

        log::info!("registered user {} (id {})", user.username, user.id);
        Ok(user)
    }

    /// Checks a username and password and mints a token pair.
    ///
    /// Unknown users, accounts without a usable password and wrong passwords all fail with
    /// the same `Unauthorized` message.
    pub async fn authenticate(
        &self,
        users: &dyn UserStore,
        tokens: &TokenService,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, AppError> {
        let found = users.find_user_by_username(username).await?;
        let Some((user, password_hash)) =
            found.and_then(|user| user.password_hash.clone().map(|hash| (user, hash)))
        else {
            log::debug!("password login for {} rejected: no usable password", username);
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        };

        // `verify` would ignore everything past the bcrypt limit.
        if password.len() > BCRYPT_MAX_PASSWORD_BYTES {
            log::debug!("password login for {} rejected: password too long", username);
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
        if !self.verify(password, &password_hash).await? {
            log::debug!("password login for {} rejected: wrong password", username);
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        }

        tokens.issue(&user)
    }
}
