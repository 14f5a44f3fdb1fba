use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{
    AiConfiguration, ChatHistoryQuery, ChatReply, ChatRole, CoachMessage, ExperienceLevel,
    FitnessGoal, TierFeatures, User,
};
use crate::services::errors::{ServiceError, ServiceResult};
use crate::services::llm_client::{ChatMessage, CompletionRequest, LlmClient, LlmError};
use crate::services::AiConfigService;

/// The AI coach conversation of each user
#[derive(Clone)]
pub struct CoachChatService {
    db: PgPool,
    ai_config: AiConfigService,
    llm: LlmClient,
}

impl CoachChatService {
    pub fn new(db: PgPool, llm: LlmClient) -> Self {
        Self {
            ai_config: AiConfigService::new(db.clone()),
            db,
            llm,
        }
    }

    /// Send a message to the coach and store both sides of the exchange.
    ///
    /// The user row stays locked from the quota check until the reply is
    /// stored, so concurrent sends of one user are counted one at a time.
    /// When the model call fails nothing is stored.
    pub async fn send_message(
        &self,
        user: &User,
        features: &TierFeatures,
        content: &str,
    ) -> ServiceResult<ChatReply> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError::InvalidInput("Message must not be empty".to_string()));
        }
        if !self.llm.is_configured() {
            return Err(LlmError::NotConfigured.into());
        }

        let config = self.ai_config.get().await?;
        let mut tx = self.db.begin().await?;

        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(&user.id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        let sent_today = messages_sent_since(&mut *tx, &user.id, start_of_utc_day(Utc::now())).await?;
        if features.remaining_chat_messages(sent_today) == Some(0) {
            tracing::info!(user_id = %user.id, sent_today, "Daily coach message limit reached");
            return Err(ServiceError::DailyLimitReached(
                "Daily coach message limit reached; it resets at midnight UTC".to_string(),
            ));
        }

        let history = recent_messages(&mut *tx, &user.id, config.history_limit).await?;
        let message = insert_message(&mut tx, &user.id, ChatRole::User, content, Utc::now()).await?;

        let request = CompletionRequest {
            model: config.model.clone(),
            messages: build_conversation(&config, user, &history, content),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };
        let reply_text = match self.llm.complete(&request).await {
            Ok(text) => text,
            Err(err) => {
                tx.rollback().await?;
                return Err(err.into());
            }
        };

        let reply =
            insert_message(&mut tx, &user.id, ChatRole::Assistant, &reply_text, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %user.id,
            model = %config.model,
            history = history.len(),
            "Coach replied"
        );

        Ok(ChatReply {
            message,
            reply,
            remaining_today: features.remaining_chat_messages(sent_today + 1),
        })
    }

    /// A page of history, oldest first
    pub async fn history(
        &self,
        user_id: &str,
        query: &ChatHistoryQuery,
    ) -> ServiceResult<Vec<CoachMessage>> {
        Ok(fetch_page(&self.db, user_id, query).await?)
    }
}

async fn fetch_page<'e>(
    executor: impl PgExecutor<'e>,
    user_id: &str,
    query: &ChatHistoryQuery,
) -> Result<Vec<CoachMessage>, sqlx::Error> {
    let mut messages = sqlx::query_as::<_, CoachMessage>(
        r#"
        SELECT id, user_id, role, content, created_at
        FROM coach_messages
        WHERE user_id = $1 AND ($2::TIMESTAMPTZ IS NULL OR created_at < $2)
        ORDER BY created_at DESC, id DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(query.before)
    .bind(query.get_limit())
    .fetch_all(executor)
    .await?;

    messages.reverse();
    Ok(messages)
}

async fn recent_messages<'e>(
    executor: impl PgExecutor<'e>,
    user_id: &str,
    limit: i32,
) -> Result<Vec<CoachMessage>, sqlx::Error> {
    if limit <= 0 {
        return Ok(Vec::new());
    }

    fetch_page(
        executor,
        user_id,
        &ChatHistoryQuery {
            limit: Some(i64::from(limit)),
            before: None,
        },
    )
    .await
}

async fn messages_sent_since<'e>(
    executor: impl PgExecutor<'e>,
    user_id: &str,
    since: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM coach_messages WHERE user_id = $1 AND role = 'user' AND created_at >= $2",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(executor)
    .await?;

    Ok(count)
}

async fn insert_message(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: &str,
    role: ChatRole,
    content: &str,
    created_at: DateTime<Utc>,
) -> Result<CoachMessage, sqlx::Error> {
    sqlx::query_as::<_, CoachMessage>(
        r#"
        INSERT INTO coach_messages (id, user_id, role, content, created_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, role, content, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(role.as_str())
    .bind(content)
    .bind(created_at)
    .fetch_one(&mut **tx)
    .await
}

pub fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN))
}

/// Configured system prompt followed by what onboarding told us about the user
pub fn build_system_prompt(config: &AiConfiguration, user: &User) -> String {
    let mut prompt = config.system_prompt.trim().to_string();

    if !user.onboarding_completed {
        prompt.push_str("\n\nThe athlete has not completed onboarding yet.");
        return prompt;
    }

    prompt.push_str("\n\nAthlete profile:");
    if let Some(name) = user.name.as_deref().filter(|n| !n.trim().is_empty()) {
        prompt.push_str(&format!("\n- Name: {}", name.trim()));
    }
    if let Some(goal) = user.fitness_goal.as_deref().and_then(FitnessGoal::from_str) {
        prompt.push_str(&format!("\n- Goal: {}", goal.describe()));
    }
    if let Some(level) = user.experience_level.as_deref().and_then(ExperienceLevel::from_str) {
        prompt.push_str(&format!("\n- Experience: {}", level.as_str()));
    }
    if let Some(days) = user.training_days_per_week {
        prompt.push_str(&format!("\n- Training days per week: {}", days));
    }
    if user.available_equipment.is_empty() {
        prompt.push_str("\n- Equipment: bodyweight only");
    } else {
        prompt.push_str(&format!("\n- Equipment: {}", user.available_equipment.join(", ")));
    }

    prompt
}

/// System prompt, stored history (oldest first), then the new message
pub fn build_conversation(
    config: &AiConfiguration,
    user: &User,
    history: &[CoachMessage],
    content: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::new(ChatRole::System, build_system_prompt(config, user)));
    messages.extend(
        history
            .iter()
            .map(|message| ChatMessage::new(message.chat_role(), message.content.clone())),
    );
    messages.push(ChatMessage::new(ChatRole::User, content));
    messages
}
