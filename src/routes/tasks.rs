use crate::{
    auth::{ensure_owner, AuthenticatedUser},
    error::AppError,
    models::{Task, TaskFilter, TaskInput, TaskList, TaskPatch, TaskQuery},
    state::AppState,
};
use actix_web::{delete, get, patch, post, put, web, HttpResponse, Responder};
use uuid::Uuid;
use validator::Validate;

/// Loads a task and checks that `user` owns it.
async fn owned_task(state: &AppState, id: Uuid, user: &AuthenticatedUser) -> Result<Task, AppError> {
    let task = state
        .storage
        .tasks
        .find_task(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".into()))?;
    ensure_owner(&task, user)?;
    Ok(task)
}

/// Retrieves a page of the authenticated user's tasks.
///
/// ## Query Parameters:
/// - `status`, `priority` (optional): exact match.
/// - `search` (optional): case-insensitive substring of the title.
/// - `ordering` (optional): comma-separated `due_date`, `priority`, `status`, `created_at`,
///   each optionally prefixed with `-`. Defaults to `-created_at`.
/// - `page` (optional): 1-based page number.
///
/// ## Responses:
/// - `200 OK`: `{count, next, previous, results}`.
/// - `400 Bad Request`: If a parameter cannot be parsed or `page` is 0.
/// - `404 Not Found`: If `page` is past the last page.
#[get("/")]
pub async fn list_tasks(
    state: web::Data<AppState>,
    query_params: web::Query<TaskQuery>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let page = query_params.page.unwrap_or(1);
    if page == 0 {
        return Err(AppError::BadRequest("Invalid page.".into()));
    }

    let page_size = state.page_size;
    let offset = (page - 1)
        .checked_mul(page_size)
        .ok_or_else(|| AppError::NotFound("Invalid page.".into()))?;
    let filter = TaskFilter::new(user.id, &query_params, page_size, offset);

    let found = state.storage.tasks.list_tasks(&filter).await?;
    if found.items.is_empty() && page > 1 {
        return Err(AppError::NotFound("Invalid page.".into()));
    }

    let has_next = u64::from(offset) + (found.items.len() as u64) < found.count;
    Ok(HttpResponse::Ok().json(TaskList {
        count: found.count,
        next: has_next.then_some(page + 1),
        previous: (page > 1).then_some(page - 1),
        results: found.items,
    }))
}

/// Creates a new task owned by the authenticated user.
///
/// Any owner supplied in the body is ignored.
#[post("/")]
pub async fn create_task(
    state: web::Data<AppState>,
    task_data: web::Json<TaskInput>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let task = Task::new(task_data.into_inner(), user.id);
    let task = state.storage.tasks.insert_task(task).await?;
    log::debug!("user {} created task {}", user.id, task.id);

    Ok(HttpResponse::Created().json(task))
}

/// Retrieves a specific task by its ID.
///
/// ## Responses:
/// - `200 OK`: The task.
/// - `403 Forbidden`: If the task belongs to another user.
/// - `404 Not Found`: If no task has this ID.
#[get("/{id}/")]
pub async fn get_task(
    state: web::Data<AppState>,
    task_id: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let task = owned_task(&state, task_id.into_inner(), &user).await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Partially updates a task. `description` and `due_date` are cleared by sending `null`.
#[patch("/{id}/")]
pub async fn patch_task(
    state: web::Data<AppState>,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskPatch>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let mut task = owned_task(&state, task_id.into_inner(), &user).await?;
    task.apply(task_data.into_inner());
    let task = state.storage.tasks.update_task(&task).await?;

    Ok(HttpResponse::Ok().json(task))
}

/// Replaces every writable field of a task. Omitted optional fields are reset.
#[put("/{id}/")]
pub async fn update_task(
    state: web::Data<AppState>,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskInput>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let mut task = owned_task(&state, task_id.into_inner(), &user).await?;
    task.apply(TaskPatch::from(task_data.into_inner()));
    let task = state.storage.tasks.update_task(&task).await?;

    Ok(HttpResponse::Ok().json(task))
}

/// Deletes a task.
///
/// ## Responses:
/// - `204 No Content`: On successful deletion.
/// - `403 Forbidden`: If the task belongs to another user.
/// - `404 Not Found`: If no task has this ID.
#[delete("/{id}/")]
pub async fn delete_task(
    state: web::Data<AppState>,
    task_id: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let task = owned_task(&state, task_id.into_inner(), &user).await?;

    if !state.storage.tasks.delete_task(task.id, user.id).await? {
        return Err(AppError::NotFound("Not found.".into()));
    }

    Ok(HttpResponse::NoContent().finish())
}
