use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// A stored coach chat message. Stored roles are only `user` and `assistant`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoachMessage {
    pub id: Uuid,
    pub user_id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl CoachMessage {
    pub fn chat_role(&self) -> ChatRole {
        if self.role == "assistant" {
            ChatRole::Assistant
        } else {
            ChatRole::User
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatHistoryQuery {
    pub limit: Option<i64>,
    pub before: Option<DateTime<Utc>>,
}

impl ChatHistoryQuery {
    pub fn get_limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 200)
    }
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub message: CoachMessage,
    pub reply: CoachMessage,
    /// `None` when the tier has no daily limit
    pub remaining_today: Option<i64>,
}
