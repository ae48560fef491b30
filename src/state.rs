use crate::auth::{GoogleVerifier, PasswordAuthenticator, TokenService};
use crate::config::Config;
use crate::error::AppError;
use crate::store::Storage;

/// Everything a request handler needs, built once at startup and shared through
/// `web::Data`.
pub struct AppState {
    pub storage: Storage,
    pub tokens: TokenService,
    pub passwords: PasswordAuthenticator,
    pub google: GoogleVerifier,
    /// Tasks per page on the list endpoint.
    pub page_size: u32,
}

impl AppState {
    pub fn from_config(config: &Config, storage: Storage) -> Result<Self, AppError> {
        Ok(Self {
            storage,
            tokens: TokenService::from_config(config),
            passwords: PasswordAuthenticator::new(config.bcrypt_cost),
            google: GoogleVerifier::from_config(&config.google)?,
            page_size: config.page_size.max(1),
        })
    }
}
