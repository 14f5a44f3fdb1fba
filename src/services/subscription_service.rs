use anyhow::Result;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{
    SubscriptionEvent, SubscriptionOverview, SubscriptionStatus, SubscriptionSummary, SubscriptionTier, TierFeatures,
    UpdateTierFeaturesRequest, User,
};
use crate::services::email_service::{subscription_email, EmailService};
use crate::services::lemon_squeezy::{plan_change, SubscriptionChange, VariantTiers, WebhookPayload};
use crate::services::user_service::USER_COLUMNS;

const FEATURE_COLUMNS: &str =
    "tier, max_program_configurations, daily_chat_messages, premium_programs, volume_analytics, updated_at";

/// Result of handling one webhook event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied { user_id: String },
    Ignored { reason: String },
    UserNotFound,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Applied { .. } => "applied",
            WebhookOutcome::Ignored { .. } => "ignored",
            WebhookOutcome::UserNotFound => "user_not_found",
        }
    }
}

/// Subscription tiers, feature limits and payment provider events
#[derive(Clone)]
pub struct SubscriptionService {
    db: PgPool,
    variants: VariantTiers,
    email: Option<EmailService>,
    app_url: String,
}

impl SubscriptionService {
    pub fn new(
        db: PgPool,
        variants: VariantTiers,
        email: Option<EmailService>,
        app_url: String,
    ) -> Self {
        Self {
            db,
            variants,
            email,
            app_url,
        }
    }

    /// Features for a tier; the most restrictive set when no row exists
    pub async fn tier_features(&self, tier: SubscriptionTier) -> Result<TierFeatures> {
        let features = sqlx::query_as::<_, TierFeatures>(&format!(
            "SELECT {} FROM subscription_tier_features WHERE tier = $1",
            FEATURE_COLUMNS
        ))
        .bind(tier.as_str())
        .fetch_optional(&self.db)
        .await?;

        Ok(features.unwrap_or_else(|| {
            tracing::warn!(tier = tier.as_str(), "No feature row for tier, using restrictive defaults");
            TierFeatures::restrictive(tier)
        }))
    }

    pub async fn list_tier_features(&self) -> Result<Vec<TierFeatures>> {
        let mut features = Vec::with_capacity(SubscriptionTier::ALL.len());
        for tier in SubscriptionTier::ALL {
            features.push(self.tier_features(tier).await?);
        }
        Ok(features)
    }

    pub async fn update_tier_features(
        &self,
        tier: SubscriptionTier,
        request: &UpdateTierFeaturesRequest,
    ) -> Result<TierFeatures> {
        let features = sqlx::query_as::<_, TierFeatures>(&format!(
            r#"
            INSERT INTO subscription_tier_features
                (tier, max_program_configurations, daily_chat_messages, premium_programs, volume_analytics, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (tier) DO UPDATE
            SET max_program_configurations = EXCLUDED.max_program_configurations,
                daily_chat_messages = EXCLUDED.daily_chat_messages,
                premium_programs = EXCLUDED.premium_programs,
                volume_analytics = EXCLUDED.volume_analytics,
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            FEATURE_COLUMNS
        ))
        .bind(tier.as_str())
        .bind(request.max_program_configurations)
        .bind(request.daily_chat_messages)
        .bind(request.premium_programs)
        .bind(request.volume_analytics)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(tier = tier.as_str(), "Updated tier features");
        Ok(features)
    }

    pub async fn overview(&self, user: &User) -> Result<SubscriptionOverview> {
        let tier = user.tier();
        Ok(SubscriptionOverview {
            tier,
            status: user.status(),
            renews_at: user.subscription_renews_at,
            ends_at: user.subscription_ends_at,
            features: self.tier_features(tier).await?,
        })
    }

    pub async fn summary(&self) -> Result<SubscriptionSummary> {
        let summary: (i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE subscription_tier = 'FREE'),
                COUNT(*) FILTER (WHERE subscription_tier = 'PRO_MONTHLY'),
                COUNT(*) FILTER (WHERE subscription_tier = 'PRO_YEARLY'),
                COUNT(*) FILTER (WHERE subscription_status IN ('active', 'on_trial')),
                COUNT(*) FILTER (WHERE subscription_status = 'cancelled'),
                COUNT(*) FILTER (WHERE subscription_status = 'past_due')
            FROM users
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        Ok(SubscriptionSummary {
            total_users: summary.0,
            free: summary.1,
            pro_monthly: summary.2,
            pro_yearly: summary.3,
            active: summary.4,
            cancelled: summary.5,
            past_due: summary.6,
        })
    }

    pub async fn recent_events(&self, limit: i64) -> Result<Vec<SubscriptionEvent>> {
        let events = sqlx::query_as::<_, SubscriptionEvent>(
            r#"
            SELECT id, event_name, provider_object_id, user_id, outcome, created_at
            FROM subscription_events
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit.clamp(1, 500))
        .fetch_all(&self.db)
        .await?;

        Ok(events)
    }

    /// Apply a verified webhook event and record it in the event log
    pub async fn handle_webhook(&self, payload: &WebhookPayload) -> Result<WebhookOutcome> {
        let event_name = payload.meta.event_name.as_str();
        let change = plan_change(payload, &self.variants);

        let Some(user_id) = self.resolve_user(payload).await? else {
            tracing::warn!(
                event = %event_name,
                object_id = %payload.data.id,
                "Webhook event does not match any user"
            );
            let outcome = WebhookOutcome::UserNotFound;
            record_event(&self.db, payload, None, &outcome).await?;
            return Ok(outcome);
        };

        if let SubscriptionChange::Ignore { reason } = &change {
            tracing::warn!(event = %event_name, user_id = %user_id, reason = %reason, "Ignoring webhook event");
            let outcome = WebhookOutcome::Ignored {
                reason: reason.clone(),
            };
            record_event(&self.db, payload, Some(&user_id), &outcome).await?;
            return Ok(outcome);
        }

        let mut tx = self.db.begin().await?;

        let before = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1 FOR UPDATE",
            USER_COLUMNS
        ))
        .bind(&user_id)
        .fetch_one(&mut *tx)
        .await?;

        let after = apply_change(&mut tx, &user_id, &change).await?;
        let outcome = WebhookOutcome::Applied {
            user_id: user_id.clone(),
        };
        record_event(&mut *tx, payload, Some(&user_id), &outcome).await?;
        tx.commit().await?;

        tracing::info!(
            event = %event_name,
            user_id = %user_id,
            tier = %after.subscription_tier,
            status = ?after.subscription_status,
            "Applied subscription change"
        );

        if !before.tier().is_paid() && after.tier().is_paid() {
            self.send_upgrade_email(&after).await;
        }

        Ok(outcome)
    }

    /// Custom data user id first, then email, then the stored provider subscription
    async fn resolve_user(&self, payload: &WebhookPayload) -> Result<Option<String>> {
        if let Some(user_id) = payload.user_id() {
            let found: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?;
            if let Some((id,)) = found {
                return Ok(Some(id));
            }
        }

        if let Some(email) = payload.user_email() {
            let found: Option<(String,)> =
                sqlx::query_as("SELECT id FROM users WHERE email = $1")
                    .bind(crate::models::normalize_email(email))
                    .fetch_optional(&self.db)
                    .await?;
            if let Some((id,)) = found {
                return Ok(Some(id));
            }
        }

        let found: Option<(String,)> =
            sqlx::query_as("SELECT id FROM users WHERE lemon_squeezy_subscription_id = $1")
                .bind(payload.subscription_id())
                .fetch_optional(&self.db)
                .await?;

        Ok(found.map(|(id,)| id))
    }

    async fn send_upgrade_email(&self, user: &User) {
        let Some(email) = &self.email else {
            tracing::debug!(user_id = %user.id, "SMTP not configured, skipping upgrade email");
            return;
        };

        let content = subscription_email(user.name.as_deref(), user.tier(), &self.app_url);
        if let Err(err) = email.send(&user.email, &content).await {
            tracing::error!(user_id = %user.id, error = %err, "Failed to send upgrade email");
        }
    }
}

async fn apply_change(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &str,
    change: &SubscriptionChange,
) -> Result<User> {
    let user = match change {
        SubscriptionChange::Activate {
            tier,
            status,
            customer_id,
            subscription_id,
            renews_at,
        } => sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET subscription_tier = COALESCE($2, subscription_tier),
                subscription_status = $3,
                lemon_squeezy_customer_id = COALESCE($4, lemon_squeezy_customer_id),
                lemon_squeezy_subscription_id = $5,
                subscription_renews_at = COALESCE($6, subscription_renews_at),
                subscription_ends_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(tier.map(|tier| tier.as_str()))
        .bind(status.as_str())
        .bind(customer_id)
        .bind(subscription_id)
        .bind(renews_at)
        .fetch_one(&mut **tx)
        .await?,
        SubscriptionChange::SetStatus { status, ends_at } => sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET subscription_status = $2,
                subscription_ends_at = COALESCE($3, subscription_ends_at),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(status.as_str())
        .bind(ends_at)
        .fetch_one(&mut **tx)
        .await?,
        SubscriptionChange::Downgrade => sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET subscription_tier = $2,
                subscription_status = $3,
                subscription_renews_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(SubscriptionTier::Free.as_str())
        .bind(SubscriptionStatus::Expired.as_str())
        .fetch_one(&mut **tx)
        .await?,
        SubscriptionChange::Ignore { reason } => {
            anyhow::bail!("ignored change cannot be applied: {}", reason)
        }
    };

    Ok(user)
}

async fn record_event<'e, E>(
    executor: E,
    payload: &WebhookPayload,
    user_id: Option<&str>,
    outcome: &WebhookOutcome,
) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let detail = match outcome {
        WebhookOutcome::Ignored { reason } => format!("{}: {}", outcome.as_str(), reason),
        other => other.as_str().to_string(),
    };

    sqlx::query(
        r#"
        INSERT INTO subscription_events (id, event_name, provider_object_id, user_id, outcome, created_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&payload.meta.event_name)
    .bind(&payload.data.id)
    .bind(user_id)
    .bind(detail)
    .execute(executor)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(
            WebhookOutcome::Applied {
                user_id: "u".to_string()
            }
            .as_str(),
            "applied"
        );
        assert_eq!(WebhookOutcome::UserNotFound.as_str(), "user_not_found");
    }
}
