use anyhow::Result;
use sqlx::PgPool;

use crate::auth::UserSession;
use crate::models::{normalize_email, AdminUpdateUserRequest, OnboardingRequest, User, UserListQuery};

pub(crate) const USER_COLUMNS: &str = "id, email, name, subscription_tier, subscription_status, \
    lemon_squeezy_customer_id, lemon_squeezy_subscription_id, subscription_renews_at, \
    subscription_ends_at, onboarding_completed, fitness_goal, experience_level, \
    available_equipment, training_days_per_week, created_at, updated_at";

#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create the user on first sight, refresh email and name afterwards
    pub async fn upsert_from_session(&self, session: &UserSession) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, name, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (id) DO UPDATE
            SET email = EXCLUDED.email,
                name = COALESCE(users.name, EXCLUDED.name),
                updated_at = CASE
                    WHEN users.email <> EXCLUDED.email THEN NOW()
                    ELSE users.updated_at
                END
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&session.user_id)
        .bind(normalize_email(&session.email))
        .bind(&session.name)
        .fetch_one(&self.db)
        .await?;

        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    pub async fn complete_onboarding(
        &self,
        user_id: &str,
        request: &OnboardingRequest,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                fitness_goal = $3,
                experience_level = $4,
                available_equipment = $5,
                training_days_per_week = $6,
                onboarding_completed = TRUE,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(&request.name)
        .bind(request.fitness_goal.as_str())
        .bind(request.experience_level.as_str())
        .bind(&request.available_equipment)
        .bind(request.training_days_per_week)
        .fetch_optional(&self.db)
        .await?;

        if user.is_some() {
            tracing::info!(user_id = %user_id, "Onboarding completed");
        }
        Ok(user)
    }

    pub async fn list_users(&self, query: &UserListQuery) -> Result<Vec<User>> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")));

        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {}
            FROM users
            WHERE ($1::TEXT IS NULL OR email ILIKE $1 OR name ILIKE $1)
              AND ($2::TEXT IS NULL OR subscription_tier = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            USER_COLUMNS
        ))
        .bind(search)
        .bind(query.tier.map(|tier| tier.as_str()))
        .bind(query.get_limit())
        .bind(query.get_offset())
        .fetch_all(&self.db)
        .await?;

        Ok(users)
    }

    pub async fn admin_update(
        &self,
        user_id: &str,
        request: &AdminUpdateUserRequest,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                subscription_tier = COALESCE($3, subscription_tier),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(&request.name)
        .bind(request.subscription_tier.map(|tier| tier.as_str()))
        .fetch_optional(&self.db)
        .await?;

        if let (Some(user), Some(tier)) = (&user, request.subscription_tier) {
            tracing::info!(user_id = %user.id, tier = tier.as_str(), "Admin changed subscription tier");
        }
        Ok(user)
    }
}
