pub mod app_context;
pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod services;

pub use app_context::AppContext;
pub use errors::{CoreError, CoreErrorKind, CoreResult};
