use crate::auth::PasswordAuthenticator;
use crate::error::AppError;
use crate::models::NewUser;
use crate::store::UserStore;

pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PASSWORD: &str = "demo12345";
pub const DEMO_EMAIL: &str = "demo@example.com";

/// Makes sure the demo account exists. An existing `demo` account is left as it is.
pub async fn ensure_demo_user(
    users: &dyn UserStore,
    passwords: &PasswordAuthenticator,
) -> Result<(), AppError> {
    let password_hash = passwords.hash(DEMO_PASSWORD).await?;
    let (user, created) = users
        .get_or_create_user(NewUser {
            username: DEMO_USERNAME.to_string(),
            email: Some(DEMO_EMAIL.to_string()),
            password_hash: Some(password_hash),
            first_name: "Demo".to_string(),
            last_name: "User".to_string(),
        })
        .await?;

    if created {
        log::info!("created demo user '{}' (id {})", user.username, user.id);
    } else {
        log::info!("demo user '{}' already exists, leaving it unchanged", user.username);
    }
    Ok(())
}
