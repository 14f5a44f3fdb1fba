// API routes and handlers

pub mod admin;
pub mod coach;
pub mod error;
pub mod health;
pub mod programs;
pub mod routes;
pub mod users;
pub mod webhooks;

pub use error::AppError;
pub use routes::{create_routes, AppState};
