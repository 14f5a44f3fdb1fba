// Data models and request/response types

pub mod ai_config;
pub mod chat;
pub mod configuration;
pub mod exercise;
pub mod program;
pub mod subscription;
pub mod user;
pub mod validation;

pub use ai_config::*;
pub use chat::*;
pub use configuration::*;
pub use exercise::*;
pub use program::*;
pub use subscription::*;
pub use user::*;
pub use validation::*;
