//! In-memory storage backend for testing and development

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{TaskStore, UserStore};
use crate::error::AppError;
use crate::models::task::{SortField, SortKey};
use crate::models::{NewUser, Task, TaskFilter, TaskPage, User};

pub struct MemoryStore {
    users: RwLock<UserTable>,
    tasks: RwLock<HashMap<Uuid, Task>>,
}

#[derive(Default)]
struct UserTable {
    by_username: HashMap<String, User>,
    next_id: i32,
}

impl UserTable {
    fn insert(&mut self, new_user: NewUser) -> User {
        self.next_id += 1;
        let user = User {
            id: self.next_id,
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            created_at: Utc::now(),
        };
        self.by_username.insert(user.username.clone(), user.clone());
        user
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(UserTable::default()),
            tasks: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut table = self.users.write().await;
        if table.by_username.contains_key(&user.username) {
            return Err(AppError::Conflict("A user with that username already exists".into()));
        }
        Ok(table.insert(user))
    }

    async fn get_or_create_user(&self, user: NewUser) -> Result<(User, bool), AppError> {
        let mut table = self.users.write().await;
        if let Some(existing) = table.by_username.get(&user.username) {
            return Ok((existing.clone(), false));
        }
        Ok((table.insert(user), true))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.by_username.get(username).cloned())
    }

    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, AppError> {
        let table = self.users.read().await;
        Ok(table.by_username.values().find(|user| user.id == id).cloned())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, task: Task) -> Result<Task, AppError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(AppError::Conflict("A task with this id already exists".into()));
        }
        tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, AppError> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage, AppError> {
        let tasks = self.tasks.read().await;
        let needle = filter.search.as_ref().map(|term| term.to_lowercase());

        let mut matching: Vec<&Task> = tasks
            .values()
            .filter(|task| task.user_id == filter.owner)
            .filter(|task| filter.status.map_or(true, |status| task.status == status))
            .filter(|task| filter.priority.map_or(true, |priority| task.priority == priority))
            .filter(|task| {
                needle
                    .as_ref()
                    .map_or(true, |needle| task.title.to_lowercase().contains(needle))
            })
            .collect();

        matching.sort_by(|a, b| compare_tasks(a, b, &filter.ordering));

        Ok(TaskPage {
            count: matching.len() as u64,
            items: matching
                .into_iter()
                .skip(filter.offset as usize)
                .take(filter.limit as usize)
                .cloned()
                .collect(),
        })
    }

    async fn update_task(&self, task: &Task) -> Result<Task, AppError> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&task.id) {
            Some(stored) if stored.user_id == task.user_id => {
                stored.title = task.title.clone();
                stored.description = task.description.clone();
                stored.priority = task.priority;
                stored.status = task.status;
                stored.due_date = task.due_date;
                stored.updated_at = task.updated_at;
                Ok(stored.clone())
            }
            _ => Err(AppError::NotFound("Task not found".into())),
        }
    }

    async fn delete_task(&self, id: Uuid, owner: i32) -> Result<bool, AppError> {
        let mut tasks = self.tasks.write().await;
        match tasks.get(&id) {
            Some(task) if task.user_id == owner => {
                tasks.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Mirrors the Postgres ordering: NULL due dates sort last ascending and first descending,
/// ties fall back to newest first, then id.
fn compare_tasks(a: &Task, b: &Task, ordering: &[SortKey]) -> Ordering {
    ordering
        .iter()
        .map(|key| {
            let ord = match key.field {
                SortField::DueDate => match (a.due_date, b.due_date) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Greater,
                    (Some(_), None) => Ordering::Less,
                    (Some(x), Some(y)) => x.cmp(&y),
                },
                SortField::Priority => a.priority.cmp(&b.priority),
                SortField::Status => a.status.cmp(&b.status),
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            if key.descending {
                ord.reverse()
            } else {
                ord
            }
        })
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or_else(|| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)))
}
