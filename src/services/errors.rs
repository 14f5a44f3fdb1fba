use thiserror::Error;

use crate::services::llm_client::LlmError;
use crate::services::program_builder::BuilderError;

/// Failures of the configuration and coach services, mapped to HTTP
/// responses by the api layer
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    PlanRestricted(String),
    #[error("{0}")]
    DailyLimitReached(String),
    #[error(transparent)]
    Builder(#[from] BuilderError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
