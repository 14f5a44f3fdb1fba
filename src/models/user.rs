use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::subscription::{SubscriptionStatus, SubscriptionTier};
use super::validation::validate_equipment_tags;

/// A user row. The id is the subject issued by the hosted auth provider.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub subscription_tier: String,
    pub subscription_status: Option<String>,
    pub lemon_squeezy_customer_id: Option<String>,
    pub lemon_squeezy_subscription_id: Option<String>,
    pub subscription_renews_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub onboarding_completed: bool,
    pub fitness_goal: Option<String>,
    pub experience_level: Option<String>,
    pub available_equipment: Vec<String>,
    pub training_days_per_week: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Unknown tier strings are treated as FREE so a bad row never grants access.
    pub fn tier(&self) -> SubscriptionTier {
        SubscriptionTier::from_str(&self.subscription_tier).unwrap_or(SubscriptionTier::Free)
    }

    pub fn status(&self) -> Option<SubscriptionStatus> {
        self.subscription_status
            .as_deref()
            .and_then(SubscriptionStatus::from_str)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FitnessGoal {
    BuildMuscle,
    GetStronger,
    LoseFat,
    GeneralFitness,
}

impl FitnessGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitnessGoal::BuildMuscle => "build_muscle",
            FitnessGoal::GetStronger => "get_stronger",
            FitnessGoal::LoseFat => "lose_fat",
            FitnessGoal::GeneralFitness => "general_fitness",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            FitnessGoal::BuildMuscle => "build muscle",
            FitnessGoal::GetStronger => "get stronger",
            FitnessGoal::LoseFat => "lose fat while keeping muscle",
            FitnessGoal::GeneralFitness => "improve general fitness",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "build_muscle" => Some(FitnessGoal::BuildMuscle),
            "get_stronger" => Some(FitnessGoal::GetStronger),
            "lose_fat" => Some(FitnessGoal::LoseFat),
            "general_fitness" => Some(FitnessGoal::GeneralFitness),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Beginner => "beginner",
            ExperienceLevel::Intermediate => "intermediate",
            ExperienceLevel::Advanced => "advanced",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "beginner" => Some(ExperienceLevel::Beginner),
            "intermediate" => Some(ExperienceLevel::Intermediate),
            "advanced" => Some(ExperienceLevel::Advanced),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct OnboardingRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub fitness_goal: FitnessGoal,
    pub experience_level: ExperienceLevel,
    #[validate(custom(function = "validate_equipment_tags"))]
    #[serde(default)]
    pub available_equipment: Vec<String>,
    #[validate(range(min = 2, max = 6))]
    pub training_days_per_week: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    /// Manual tier override; normally the payment webhook owns this field.
    pub subscription_tier: Option<SubscriptionTier>,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub tier: Option<SubscriptionTier>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl UserListQuery {
    pub fn get_limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }

    pub fn get_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub subscription_tier: SubscriptionTier,
    pub subscription_status: Option<SubscriptionStatus>,
    pub onboarding_completed: bool,
    pub fitness_goal: Option<FitnessGoal>,
    pub experience_level: Option<ExperienceLevel>,
    pub available_equipment: Vec<String>,
    pub training_days_per_week: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            subscription_tier: user.tier(),
            subscription_status: user.status(),
            fitness_goal: user.fitness_goal.as_deref().and_then(FitnessGoal::from_str),
            experience_level: user
                .experience_level
                .as_deref()
                .and_then(ExperienceLevel::from_str),
            id: user.id,
            email: user.email,
            name: user.name,
            onboarding_completed: user.onboarding_completed,
            available_equipment: user.available_equipment,
            training_days_per_week: user.training_days_per_week,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
