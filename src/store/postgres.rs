//! Postgres storage backend.
//!
//! The schema lives in `migrations/` and is embedded into the binary; `PgStore::migrate`
//! brings a database up to date at startup. Username uniqueness is enforced by a `UNIQUE`
//! constraint, which is what makes `get_or_create_user` safe under concurrent first logins.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{TaskStore, UserStore};
use crate::error::AppError;
use crate::models::{NewUser, Task, TaskFilter, TaskPage, User};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, first_name, last_name, created_at";
const TASK_COLUMNS: &str =
    "id, title, description, priority, status, due_date, user_id, created_at, updated_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Escapes LIKE wildcards so a search term only ever matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Appends the owner scope and the optional filters as a WHERE clause.
fn push_conditions(builder: &mut QueryBuilder<'_, Postgres>, filter: &TaskFilter) {
    builder.push(" WHERE user_id = ").push_bind(filter.owner);
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(priority) = filter.priority {
        builder.push(" AND priority = ").push_bind(priority);
    }
    if let Some(search) = &filter.search {
        builder.push(" AND title ILIKE ").push_bind(like_pattern(search));
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, first_name, last_name) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::Conflict(_) => {
                    AppError::Conflict("A user with that username already exists".into())
                }
                other => other,
            })
    }

    async fn get_or_create_user(&self, user: NewUser) -> Result<(User, bool), AppError> {
        let insert = format!(
            "INSERT INTO users (username, email, password_hash, first_name, last_name) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (username) DO NOTHING RETURNING {}",
            USER_COLUMNS
        );
        let created = sqlx::query_as::<_, User>(&insert)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(created) = created {
            return Ok((created, true));
        }

        let existing = self
            .find_user_by_username(&user.username)
            .await?
            .ok_or_else(|| AppError::DatabaseError("user vanished after conflict".into()))?;
        Ok((existing, false))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(&self, task: Task) -> Result<Task, AppError> {
        let sql = format!(
            "INSERT INTO tasks (id, title, description, priority, status, due_date, user_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            TASK_COLUMNS
        );
        Ok(sqlx::query_as::<_, Task>(&sql)
            .bind(task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.priority)
            .bind(task.status)
            .bind(task.due_date)
            .bind(task.user_id)
            .bind(task.created_at)
            .bind(task.updated_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, AppError> {
        let sql = format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS);
        Ok(sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage, AppError> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks");
        push_conditions(&mut count_query, filter);
        let count: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut list_query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM tasks", TASK_COLUMNS));
        push_conditions(&mut list_query, filter);
        list_query.push(" ORDER BY ");
        for key in &filter.ordering {
            list_query
                .push(key.field.column())
                .push(if key.descending { " DESC, " } else { " ASC, " });
        }
        list_query
            .push("created_at DESC, id ASC LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(filter.offset));

        let items = list_query
            .build_query_as::<Task>()
            .fetch_all(&self.pool)
            .await?;

        Ok(TaskPage {
            count: count.max(0) as u64,
            items,
        })
    }

    async fn update_task(&self, task: &Task) -> Result<Task, AppError> {
        let sql = format!(
            "UPDATE tasks \
             SET title = $1, description = $2, priority = $3, status = $4, due_date = $5, updated_at = $6 \
             WHERE id = $7 AND user_id = $8 RETURNING {}",
            TASK_COLUMNS
        );
        sqlx::query_as::<_, Task>(&sql)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.priority)
            .bind(task.status)
            .bind(task.due_date)
            .bind(task.updated_at)
            .bind(task.id)
            .bind(task.user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".into()))
    }

    async fn delete_task(&self, id: Uuid, owner: i32) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
