//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! Every failure a handler can produce is one of its variants, and each variant maps to a
//! single HTTP status code with a stable, generic message.
//!
//! `AppError` implements `actix_web::error::ResponseError`, rendering as
//! `{"detail": "<message>"}`. Internal causes (database errors, hashing failures, the exact
//! reason a token was rejected) are logged where they occur and never copied into the body.
//! `From` implementations for `sqlx::Error`, `validator::ValidationErrors`,
//! `jsonwebtoken::errors::Error`, `bcrypt::BcryptError` and `reqwest::Error` allow the `?`
//! operator throughout.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum AppError {
    /// Malformed or missing input that failed a validation rule (HTTP 400).
    ValidationError(String),
    /// A request that could not be interpreted at all, e.g. an unparsable body (HTTP 400).
    BadRequest(String),
    /// Bad, missing or expired credential or token (HTTP 401).
    Unauthorized(String),
    /// Authenticated, but not permitted to touch the resource (HTTP 403).
    Forbidden(String),
    /// The requested resource does not exist (HTTP 404).
    NotFound(String),
    /// A unique key is already taken (HTTP 409).
    Conflict(String),
    /// The server is missing required configuration (HTTP 500).
    Configuration(String),
    /// A capability this request depends on is disabled or unreachable (HTTP 500).
    ServiceUnavailable(String),
    /// Any other unexpected server-side failure (HTTP 500).
    InternalServerError(String),
    /// A failure reported by the storage backend (HTTP 500).
    DatabaseError(String),
}

impl AppError {
    /// The message that is safe to show a client.
    fn public_message(&self) -> &str {
        match self {
            AppError::ValidationError(msg)
            | AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::ServiceUnavailable(msg) => msg,
            AppError::Configuration(_) => "Server is not configured for this operation",
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                "Internal server error"
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Configuration(msg) => write!(f, "Configuration Error: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service Unavailable: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Configuration(_)
            | AppError::ServiceUnavailable(_)
            | AppError::InternalServerError(_)
            | AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            log::error!("{}", self);
        }
        HttpResponse::build(self.status_code()).json(json!({
            "detail": self.public_message()
        }))
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` becomes `NotFound` and a unique-constraint violation becomes `Conflict`;
/// everything else is a `DatabaseError`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Not found".into()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("A record with this key already exists".into())
            }
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> AppError {
        AppError::DatabaseError(format!("Migration failed: {}", error))
    }
}

/// Converts `validator::ValidationErrors` into `AppError::ValidationError`.
///
/// The detailed validation messages are preserved; they only ever describe the client's input.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

/// Converts `jsonwebtoken::errors::Error` into a generic `AppError::Unauthorized`.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        log::debug!("token rejected: {}", error);
        AppError::Unauthorized("Token is invalid or expired".into())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(format!("Password hashing failed: {}", error))
    }
}

/// Network failures while talking to an identity provider are never retried here.
impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> AppError {
        log::warn!("identity provider request failed: {}", error);
        AppError::ServiceUnavailable("Identity provider is unavailable".into())
    }
}
