use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::models::Task;

/// Allows access to `task` only for its owner; anyone else gets `403 Forbidden`.
pub fn ensure_owner(task: &Task, user: &AuthenticatedUser) -> Result<(), AppError> {
    if task.user_id == user.id {
        Ok(())
    } else {
        log::warn!("user {} denied access to task {}", user.id, task.id);
        Err(AppError::Forbidden(
            "You do not have permission to perform this action.".into(),
        ))
    }
}
