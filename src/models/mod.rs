pub mod task;
pub mod user;

pub use task::{
    Task, TaskFilter, TaskInput, TaskList, TaskPage, TaskPatch, TaskPriority, TaskQuery,
    TaskStatus,
};
pub use user::{NewUser, RegisteredUser, User, UserProfile};
