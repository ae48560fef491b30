use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored identity.
///
/// `password_hash` is `None` for identities that can never log in with a password,
/// which is always the case for accounts created through Google sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_usable_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// "first last" with surrounding whitespace removed.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Full name if there is one, else the first name, else nothing. Never an empty string.
    pub fn display_name(&self) -> Option<String> {
        let full_name = self.full_name();
        let name = if full_name.is_empty() {
            self.first_name.trim().to_string()
        } else {
            full_name
        };
        (!name.is_empty()).then_some(name)
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            username: self.username.clone(),
            email: self.email.clone(),
            name: self.display_name(),
        }
    }
}

/// The fields needed to insert an identity.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
}

/// The public view of an identity returned by `/auth/me/` and Google sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Returned after a successful registration. The password is never echoed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub id: i32,
    pub username: String,
    pub email: Option<String>,
    pub first_name: String,
}

impl From<&User> for RegisteredUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
        }
    }
}
