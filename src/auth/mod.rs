pub mod extractors;
pub mod google;
pub mod middleware;
pub mod ownership;
pub mod password;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::UserProfile;

// Re-export necessary items
pub use extractors::AuthenticatedUser;
pub use google::{GoogleVerifier, KeySource, RemoteJwks, StaticJwks};
pub use middleware::AuthMiddleware;
pub use ownership::ensure_owner;
pub use password::{hash_password, verify_password, PasswordAuthenticator};
pub use token::{Claims, TokenPair, TokenService, TokenType};

lazy_static! {
    // Letters, digits and @ . + - _
    static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[\w.@+-]+$").unwrap();
}

/// Represents the payload for a new user registration request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Up to 150 characters: letters, digits and `@ . + - _`.
    #[validate(
        length(min = 1, max = 150),
        regex(
            path = "USERNAME_REGEX",
            message = "Username may only contain letters, digits and @/./+/-/_"
        )
    )]
    pub username: String,
    /// Optional; a blank value counts as absent.
    #[validate(email)]
    #[serde(default)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 128), custom = "password_fits_bcrypt")]
    pub password: String,
    #[validate(length(max = 150))]
    #[serde(default)]
    pub first_name: Option<String>,
}

/// bcrypt ignores everything past its input limit, so longer passwords are refused outright.
fn password_fits_bcrypt(password: &str) -> Result<(), ValidationError> {
    if password.len() > password::BCRYPT_MAX_PASSWORD_BYTES {
        let mut err = ValidationError::new("password_too_long");
        err.message = Some("Password must be at most 72 bytes".into());
        return Err(err);
    }
    Ok(())
}

impl RegisterRequest {
    /// Drops blank optional fields so they are stored as absent.
    pub fn normalized(mut self) -> Self {
        self.email = self
            .email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());
        self.first_name = self.first_name.filter(|name| !name.trim().is_empty());
        self
    }
}

/// Represents the payload for a password login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// The body of a Google sign-in request. A missing token is reported by the verifier.
#[derive(Debug, Default, Deserialize)]
pub struct GoogleLoginRequest {
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Response to a refresh-token redemption.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access: String,
}

/// Response to a successful Google sign-in.
#[derive(Debug, Serialize, Deserialize)]
pub struct GoogleLoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserProfile,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn register(username: &str, email: Option<&str>, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.map(str::to_string),
            password: password.to_string(),
            first_name: None,
        }
    }

    #[test]
    fn test_register_request_validation() {
        assert!(register("alice", Some("alice@example.com"), "password123").validate().is_ok());
        assert!(register("alice@example.com", None, "p").validate().is_ok());
        assert!(register("a.b+c-d_e", None, "password123").validate().is_ok());

        assert!(register("", None, "password123").validate().is_err());
        assert!(register("test user!", None, "password123").validate().is_err());
        assert!(register(&"a".repeat(151), None, "password123").validate().is_err());
        assert!(register("alice", None, "").validate().is_err());
        assert!(register("alice", Some("not-an-email"), "password123").validate().is_err());
    }

    #[test]
    fn test_password_limit_counts_bytes() {
        assert!(register("alice", None, &"a".repeat(72)).validate().is_ok());
        assert!(register("alice", None, &"a".repeat(73)).validate().is_err());
        // 40 characters, 80 bytes
        assert!(register("alice", None, &"é".repeat(40)).validate().is_err());
    }

    #[test]
    fn test_blank_email_counts_as_absent() {
        let request = register("alice", Some("  "), "password123").normalized();
        assert!(request.email.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_login_request_validation() {
        let valid = LoginRequest {
            username: "alice".to_string(),
            password: "password123".to_string(),
        };
        assert!(valid.validate().is_ok());

        let empty_password = LoginRequest {
            username: "alice".to_string(),
            password: String::new(),
        };
        assert!(empty_password.validate().is_err());
    }
}
