use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the priority of a task.
/// Corresponds to the `task_priority` SQL enum; variants are ordered low to high.
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, sqlx::Type,
)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Represents the status of a task.
/// Corresponds to the `task_status` SQL enum.
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, sqlx::Type,
)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

/// Input structure for creating a task or replacing all of its writable fields.
///
/// Unknown fields (including any attempt to set the owner) are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    /// Must be between 1 and 200 characters.
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    /// Maximum length of 1000 characters if provided.
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: TaskPriority,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Partial update. Absent fields are left alone; `description` and `due_date`
/// can be cleared by sending `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TaskPatch {
    #[validate(length(min = 1, max = 200))]
    #[serde(default)]
    pub title: Option<String>,

    #[validate(length(max = 1000))]
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,

    #[serde(default)]
    pub priority: Option<TaskPriority>,

    #[serde(default)]
    pub status: Option<TaskStatus>,

    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<NaiveDate>>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl From<TaskInput> for TaskPatch {
    fn from(input: TaskInput) -> Self {
        Self {
            title: Some(input.title),
            description: Some(input.description),
            priority: Some(input.priority),
            status: Some(input.status),
            due_date: Some(input.due_date),
        }
    }
}

/// Represents a task entity as stored and returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    /// Identifier of the user who owns the task. Fixed at creation.
    #[serde(rename = "owner")]
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new `Task` owned by `owner`, stamped with the current time.
    pub fn new(input: TaskInput, owner: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            priority: input.priority,
            status: input.status,
            due_date: input.due_date,
            user_id: owner,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a partial update in place. The owner is never touched.
    pub fn apply(&mut self, patch: TaskPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        self.updated_at = Utc::now();
    }
}

/// Query parameters accepted by the task list endpoint.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    /// Case-insensitive substring match on the title.
    pub search: Option<String>,
    /// e.g. `-priority,due_date`.
    pub ordering: Option<String>,
    /// 1-based page number.
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    DueDate,
    Priority,
    Status,
    CreatedAt,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::DueDate => "due_date",
            SortField::Priority => "priority",
            SortField::Status => "status",
            SortField::CreatedAt => "created_at",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "due_date" => Some(SortField::DueDate),
            "priority" => Some(SortField::Priority),
            "status" => Some(SortField::Status),
            "created_at" => Some(SortField::CreatedAt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

/// Newest first.
pub const DEFAULT_ORDERING: SortKey = SortKey {
    field: SortField::CreatedAt,
    descending: true,
};

/// Parses a comma-separated ordering expression. Unknown fields are skipped; if nothing
/// usable remains the default ordering applies.
pub fn parse_ordering(raw: Option<&str>) -> Vec<SortKey> {
    let keys: Vec<SortKey> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter_map(|term| {
            let (descending, name) = match term.strip_prefix('-') {
                Some(name) => (true, name),
                None => (false, term),
            };
            SortField::parse(name).map(|field| SortKey { field, descending })
        })
        .collect();

    if keys.is_empty() {
        vec![DEFAULT_ORDERING]
    } else {
        keys
    }
}

/// A fully resolved, owner-scoped list request handed to a `TaskStore`.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    pub owner: i32,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub search: Option<String>,
    pub ordering: Vec<SortKey>,
    pub limit: u32,
    pub offset: u32,
}

impl TaskFilter {
    pub fn new(owner: i32, query: &TaskQuery, limit: u32, offset: u32) -> Self {
        Self {
            owner,
            status: query.status,
            priority: query.priority,
            search: query
                .search
                .as_deref()
                .map(str::trim)
                .filter(|term| !term.is_empty())
                .map(str::to_string),
            ordering: parse_ordering(query.ordering.as_deref()),
            limit,
            offset,
        }
    }
}

/// One page of tasks plus the total number of matching tasks.
#[derive(Debug, Clone)]
pub struct TaskPage {
    pub count: u64,
    pub items: Vec<Task>,
}

/// Paginated list response.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskList {
    pub count: u64,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<Task>,
}
