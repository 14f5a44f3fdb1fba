use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Subscription level gating feature limits
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionTier {
    Free,
    ProMonthly,
    ProYearly,
}

impl SubscriptionTier {
    pub const ALL: [SubscriptionTier; 3] = [
        SubscriptionTier::Free,
        SubscriptionTier::ProMonthly,
        SubscriptionTier::ProYearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "FREE",
            SubscriptionTier::ProMonthly => "PRO_MONTHLY",
            SubscriptionTier::ProYearly => "PRO_YEARLY",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "FREE" => Some(SubscriptionTier::Free),
            "PRO_MONTHLY" => Some(SubscriptionTier::ProMonthly),
            "PRO_YEARLY" => Some(SubscriptionTier::ProYearly),
            _ => None,
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, SubscriptionTier::Free)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "Free",
            SubscriptionTier::ProMonthly => "Pro (monthly)",
            SubscriptionTier::ProYearly => "Pro (yearly)",
        }
    }
}

/// Subscription status as reported by the payment provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    OnTrial,
    PastDue,
    Paused,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::OnTrial => "on_trial",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SubscriptionStatus::Active),
            "on_trial" => Some(SubscriptionStatus::OnTrial),
            "past_due" | "unpaid" => Some(SubscriptionStatus::PastDue),
            "paused" => Some(SubscriptionStatus::Paused),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            "expired" => Some(SubscriptionStatus::Expired),
            _ => None,
        }
    }
}

/// Feature flags and limits for one tier. `None` limits mean unlimited.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct TierFeatures {
    pub tier: String,
    pub max_program_configurations: Option<i32>,
    pub daily_chat_messages: Option<i32>,
    pub premium_programs: bool,
    pub volume_analytics: bool,
    pub updated_at: DateTime<Utc>,
}

impl TierFeatures {
    /// Used when the features table has no row for a tier: the most
    /// restrictive settings.
    pub fn restrictive(tier: SubscriptionTier) -> Self {
        Self {
            tier: tier.as_str().to_string(),
            max_program_configurations: Some(1),
            daily_chat_messages: Some(0),
            premium_programs: false,
            volume_analytics: false,
            updated_at: Utc::now(),
        }
    }

    pub fn allows_another_configuration(&self, existing: i64) -> bool {
        match self.max_program_configurations {
            Some(limit) => existing < i64::from(limit),
            None => true,
        }
    }

    /// Messages still available today, `None` when unlimited.
    pub fn remaining_chat_messages(&self, sent_today: i64) -> Option<i64> {
        self.daily_chat_messages
            .map(|limit| (i64::from(limit) - sent_today).max(0))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTierFeaturesRequest {
    #[validate(range(min = 0, max = 1000))]
    pub max_program_configurations: Option<i32>,
    #[validate(range(min = 0, max = 10000))]
    pub daily_chat_messages: Option<i32>,
    pub premium_programs: bool,
    pub volume_analytics: bool,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionOverview {
    pub tier: SubscriptionTier,
    pub status: Option<SubscriptionStatus>,
    pub renews_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub features: TierFeatures,
}

#[derive(Debug, Serialize, Default, PartialEq)]
pub struct SubscriptionSummary {
    pub total_users: i64,
    pub free: i64,
    pub pro_monthly: i64,
    pub pro_yearly: i64,
    pub active: i64,
    pub cancelled: i64,
    pub past_due: i64,
}

/// One processed webhook event, kept for auditing
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SubscriptionEvent {
    pub id: uuid::Uuid,
    pub event_name: String,
    pub provider_object_id: String,
    pub user_id: Option<String>,
    pub outcome: String,
    pub created_at: DateTime<Utc>,
}
