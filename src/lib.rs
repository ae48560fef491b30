#![doc = "The `taskdesk` library crate."]
#![doc = ""]
#![doc = "Identity (password and Google sign-in), bearer-token issuance and validation,"]
#![doc = "owner-scoped task storage, routing configuration and error handling for the"]
#![doc = "TaskDesk API. The binary (`main.rs`) wires these into an `HttpServer`."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod seed;
pub mod state;
pub mod store;

pub use crate::config::Config;
pub use crate::error::AppError;
pub use crate::state::AppState;
