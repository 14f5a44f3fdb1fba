use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Settings for the coach chat model. There is exactly one row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AiConfiguration {
    pub model: String,
    pub system_prompt: String,
    pub temperature: f64,
    pub max_tokens: i32,
    pub history_limit: i32,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for AiConfiguration {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.7,
            max_tokens: 800,
            history_limit: 20,
            updated_by: None,
            updated_at: Utc::now(),
        }
    }
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an experienced strength and hypertrophy coach. \
Give practical, evidence-based advice about training, exercise selection, progression and recovery. \
Keep answers concise, ask for missing context when it matters, and never give medical diagnoses.";

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAiConfigRequest {
    #[validate(length(min = 1, max = 100))]
    pub model: Option<String>,
    #[validate(length(min = 1, max = 20000))]
    pub system_prompt: Option<String>,
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f64>,
    #[validate(range(min = 16, max = 8192))]
    pub max_tokens: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub history_limit: Option<i32>,
}
