//! Storage backends for identities and tasks.
//!
//! Handlers only see the `UserStore` and `TaskStore` traits. Two backends implement them:
//! Postgres (via `sqlx`) for deployments and an in-memory backend for development and tests.

pub mod memory;
pub mod postgres;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{NewUser, Task, TaskFilter, TaskPage, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence of identities. Usernames are unique.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new identity, failing with `AppError::Conflict` if the username is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;

    /// Atomically inserts `user` unless its username already exists.
    ///
    /// Returns the stored identity and whether it was created by this call. An existing
    /// identity is returned unchanged.
    async fn get_or_create_user(&self, user: NewUser) -> Result<(User, bool), AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, AppError>;
}

/// Persistence of tasks. Every list query is scoped to one owner.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: Task) -> Result<Task, AppError>;

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, AppError>;

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage, AppError>;

    /// Persists the writable fields of `task`, matching on both id and owner.
    async fn update_task(&self, task: &Task) -> Result<Task, AppError>;

    /// Returns false when no task with this id belongs to `owner`.
    async fn delete_task(&self, id: Uuid, owner: i32) -> Result<bool, AppError>;
}

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// In-memory storage (for testing and development)
    Memory,
    Postgres,
}

impl FromStr for BackendType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(BackendType::Memory),
            "postgres" | "postgresql" => Ok(BackendType::Postgres),
            _ => Err(AppError::Configuration(format!("Unknown storage backend: {}", s))),
        }
    }
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Memory => "memory",
            BackendType::Postgres => "postgres",
        }
    }
}

/// Both stores, shared by every worker.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserStore>,
    pub tasks: Arc<dyn TaskStore>,
}

impl Storage {
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: store.clone(),
            tasks: store,
        }
    }

    /// Opens the backend selected by `config`. For Postgres, pending migrations are applied.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        match config.storage_backend {
            BackendType::Memory => Ok(Self::memory()),
            BackendType::Postgres => {
                let url = config.database_url.as_deref().ok_or_else(|| {
                    AppError::Configuration("DATABASE_URL must be set".into())
                })?;
                let store = Arc::new(PgStore::connect(url).await?);
                store.migrate().await?;
                Ok(Self {
                    users: store.clone(),
                    tasks: store,
                })
            }
        }
    }
}
