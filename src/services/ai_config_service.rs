use anyhow::Result;
use sqlx::PgPool;

use crate::models::{AiConfiguration, UpdateAiConfigRequest};

const AI_CONFIG_COLUMNS: &str =
    "model, system_prompt, temperature, max_tokens, history_limit, updated_by, updated_at";

/// The singleton coach model configuration
#[derive(Clone)]
pub struct AiConfigService {
    db: PgPool,
}

impl AiConfigService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Stored configuration, or the built-in default when none was saved yet
    pub async fn get(&self) -> Result<AiConfiguration> {
        let config = sqlx::query_as::<_, AiConfiguration>(&format!(
            "SELECT {} FROM ai_configuration WHERE id = 1",
            AI_CONFIG_COLUMNS
        ))
        .fetch_optional(&self.db)
        .await?;

        Ok(config.unwrap_or_default())
    }

    pub async fn update(
        &self,
        request: &UpdateAiConfigRequest,
        updated_by: &str,
    ) -> Result<AiConfiguration> {
        let current = self.get().await?;

        let config = sqlx::query_as::<_, AiConfiguration>(&format!(
            r#"
            INSERT INTO ai_configuration (id, model, system_prompt, temperature, max_tokens, history_limit, updated_by, updated_at)
            VALUES (1, $1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (id) DO UPDATE
            SET model = EXCLUDED.model,
                system_prompt = EXCLUDED.system_prompt,
                temperature = EXCLUDED.temperature,
                max_tokens = EXCLUDED.max_tokens,
                history_limit = EXCLUDED.history_limit,
                updated_by = EXCLUDED.updated_by,
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            AI_CONFIG_COLUMNS
        ))
        .bind(request.model.as_deref().map(str::trim).unwrap_or(&current.model))
        .bind(request.system_prompt.as_deref().unwrap_or(&current.system_prompt))
        .bind(request.temperature.unwrap_or(current.temperature))
        .bind(request.max_tokens.unwrap_or(current.max_tokens))
        .bind(request.history_limit.unwrap_or(current.history_limit))
        .bind(updated_by)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(model = %config.model, updated_by = %updated_by, "Updated AI configuration");
        Ok(config)
    }
}
