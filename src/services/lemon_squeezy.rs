//! Lemon Squeezy webhook verification and event interpretation.
//!
//! Verification and the mapping from an event to a [`SubscriptionChange`]
//! are pure; [`crate::services::SubscriptionService`] applies the change.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use crate::config::LemonSqueezyConfig;
use crate::models::{SubscriptionStatus, SubscriptionTier};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex encoded HMAC-SHA256 of the raw body
pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Webhook secret is not configured")]
    NotConfigured,
    #[error("Missing signature header")]
    MissingSignature,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub meta: WebhookMeta,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookMeta {
    pub event_name: String,
    #[serde(default)]
    pub custom_data: Option<CustomData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomData {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: WebhookAttributes,
}

/// The attributes this service reads from subscription and
/// subscription-invoice objects; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookAttributes {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub variant_id: Option<i64>,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub subscription_id: Option<i64>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub renews_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

impl WebhookPayload {
    pub fn user_id(&self) -> Option<&str> {
        self.meta
            .custom_data
            .as_ref()
            .and_then(|data| data.user_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    pub fn user_email(&self) -> Option<&str> {
        self.data
            .attributes
            .user_email
            .as_deref()
            .filter(|email| !email.is_empty())
    }

    /// The provider subscription id: the object itself for subscription
    /// events, the parent subscription for invoice events.
    pub fn subscription_id(&self) -> String {
        match self.data.attributes.subscription_id {
            Some(id) if self.data.kind != "subscriptions" => id.to_string(),
            _ => self.data.id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionCancelled,
    SubscriptionResumed,
    SubscriptionExpired,
    SubscriptionPaused,
    SubscriptionUnpaused,
    SubscriptionPaymentSuccess,
    SubscriptionPaymentFailed,
    SubscriptionPaymentRecovered,
    Other(String),
}

impl WebhookEvent {
    pub fn from_name(name: &str) -> Self {
        match name {
            "subscription_created" => WebhookEvent::SubscriptionCreated,
            "subscription_updated" => WebhookEvent::SubscriptionUpdated,
            "subscription_cancelled" => WebhookEvent::SubscriptionCancelled,
            "subscription_resumed" => WebhookEvent::SubscriptionResumed,
            "subscription_expired" => WebhookEvent::SubscriptionExpired,
            "subscription_paused" => WebhookEvent::SubscriptionPaused,
            "subscription_unpaused" => WebhookEvent::SubscriptionUnpaused,
            "subscription_payment_success" => WebhookEvent::SubscriptionPaymentSuccess,
            "subscription_payment_failed" => WebhookEvent::SubscriptionPaymentFailed,
            "subscription_payment_recovered" => WebhookEvent::SubscriptionPaymentRecovered,
            other => WebhookEvent::Other(other.to_string()),
        }
    }
}

/// What a webhook event means for the user's subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionChange {
    /// Subscription is in good standing. `tier` is `None` when the event
    /// does not carry a variant (invoice events); the current tier is kept.
    Activate {
        tier: Option<SubscriptionTier>,
        status: SubscriptionStatus,
        customer_id: Option<String>,
        subscription_id: String,
        renews_at: Option<DateTime<Utc>>,
    },
    /// Status change that keeps the current tier
    SetStatus {
        status: SubscriptionStatus,
        ends_at: Option<DateTime<Utc>>,
    },
    /// Back to FREE
    Downgrade,
    Ignore { reason: String },
}

/// Maps provider variant ids to tiers
#[derive(Debug, Clone, Copy, Default)]
pub struct VariantTiers {
    pub pro_monthly: Option<i64>,
    pub pro_yearly: Option<i64>,
}

impl VariantTiers {
    pub fn tier_for(&self, variant_id: i64) -> Option<SubscriptionTier> {
        if self.pro_monthly == Some(variant_id) {
            Some(SubscriptionTier::ProMonthly)
        } else if self.pro_yearly == Some(variant_id) {
            Some(SubscriptionTier::ProYearly)
        } else {
            None
        }
    }
}

impl From<&LemonSqueezyConfig> for VariantTiers {
    fn from(config: &LemonSqueezyConfig) -> Self {
        Self {
            pro_monthly: config.pro_monthly_variant_id,
            pro_yearly: config.pro_yearly_variant_id,
        }
    }
}

/// Hex encoded HMAC-SHA256 of `body`
pub fn sign(secret: &[u8], body: &[u8]) -> Result<String, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| WebhookError::NotConfigured)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check the signature header against the raw body in constant time
pub fn verify_signature(
    secret: &[u8],
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), WebhookError> {
    let signature = signature
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(WebhookError::MissingSignature)?;
    let expected = hex::decode(signature).map_err(|_| WebhookError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| WebhookError::NotConfigured)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::InvalidSignature)
}

pub fn parse_payload(body: &[u8]) -> Result<WebhookPayload, WebhookError> {
    Ok(serde_json::from_slice(body)?)
}

/// Decide what an event does to the subscription
pub fn plan_change(payload: &WebhookPayload, tiers: &VariantTiers) -> SubscriptionChange {
    let attributes = &payload.data.attributes;

    match WebhookEvent::from_name(&payload.meta.event_name) {
        WebhookEvent::SubscriptionCreated
        | WebhookEvent::SubscriptionResumed
        | WebhookEvent::SubscriptionUnpaused
        | WebhookEvent::SubscriptionPaymentSuccess
        | WebhookEvent::SubscriptionPaymentRecovered => activate(payload, tiers),
        WebhookEvent::SubscriptionUpdated => {
            match attributes.status.as_deref().and_then(SubscriptionStatus::from_str) {
                Some(SubscriptionStatus::Active | SubscriptionStatus::OnTrial) => {
                    activate(payload, tiers)
                }
                Some(SubscriptionStatus::Expired) => SubscriptionChange::Downgrade,
                Some(status) => SubscriptionChange::SetStatus {
                    status,
                    ends_at: attributes.ends_at,
                },
                None => SubscriptionChange::Ignore {
                    reason: format!("unrecognised subscription status {:?}", attributes.status),
                },
            }
        }
        WebhookEvent::SubscriptionCancelled => SubscriptionChange::SetStatus {
            status: SubscriptionStatus::Cancelled,
            ends_at: attributes.ends_at,
        },
        WebhookEvent::SubscriptionExpired => SubscriptionChange::Downgrade,
        WebhookEvent::SubscriptionPaymentFailed => SubscriptionChange::SetStatus {
            status: SubscriptionStatus::PastDue,
            ends_at: None,
        },
        WebhookEvent::SubscriptionPaused => SubscriptionChange::SetStatus {
            status: SubscriptionStatus::Paused,
            ends_at: None,
        },
        WebhookEvent::Other(name) => SubscriptionChange::Ignore {
            reason: format!("unhandled event {}", name),
        },
    }
}

fn activate(payload: &WebhookPayload, tiers: &VariantTiers) -> SubscriptionChange {
    let attributes = &payload.data.attributes;

    let tier = match attributes.variant_id {
        Some(variant_id) => match tiers.tier_for(variant_id) {
            Some(tier) => Some(tier),
            None => {
                return SubscriptionChange::Ignore {
                    reason: format!("variant {} is not mapped to a tier", variant_id),
                }
            }
        },
        None => None,
    };

    let status = match attributes.status.as_deref() {
        Some("on_trial") => SubscriptionStatus::OnTrial,
        _ => SubscriptionStatus::Active,
    };

    SubscriptionChange::Activate {
        tier,
        status,
        customer_id: attributes.customer_id.map(|id| id.to_string()),
        subscription_id: payload.subscription_id(),
        renews_at: attributes.renews_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const SECRET: &[u8] = b"whsec_test";

    fn tiers() -> VariantTiers {
        VariantTiers {
            pro_monthly: Some(111),
            pro_yearly: Some(222),
        }
    }

    fn payload(event: &str, attributes: serde_json::Value) -> WebhookPayload {
        serde_json::from_value(json!({
            "meta": { "event_name": event, "custom_data": { "user_id": "user_1" } },
            "data": { "type": "subscriptions", "id": "9001", "attributes": attributes }
        }))
        .unwrap()
    }

    #[test]
    fn test_signature_round_trip() {
        let body = br#"{"meta":{"event_name":"subscription_created"}}"#;
        let signature = sign(SECRET, body).unwrap();

        assert!(verify_signature(SECRET, body, Some(&signature)).is_ok());
        assert!(verify_signature(SECRET, body, Some(&signature.to_uppercase())).is_ok());
    }

    #[test]
    fn test_signature_rejections() {
        let body = b"{}";
        let signature = sign(SECRET, body).unwrap();

        assert_matches!(
            verify_signature(SECRET, body, None),
            Err(WebhookError::MissingSignature)
        );
        assert_matches!(
            verify_signature(SECRET, body, Some("")),
            Err(WebhookError::MissingSignature)
        );
        assert_matches!(
            verify_signature(SECRET, body, Some("not-hex")),
            Err(WebhookError::InvalidSignature)
        );
        assert_matches!(
            verify_signature(b"other", body, Some(&signature)),
            Err(WebhookError::InvalidSignature)
        );
        assert_matches!(
            verify_signature(SECRET, b"{ }", Some(&signature)),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn test_created_with_known_variant_activates_tier() {
        let payload = payload(
            "subscription_created",
            json!({
                "status": "active",
                "variant_id": 222,
                "customer_id": 77,
                "user_email": "a@example.com",
                "renews_at": "2025-03-01T00:00:00.000000Z"
            }),
        );

        assert_matches!(
            plan_change(&payload, &tiers()),
            SubscriptionChange::Activate {
                tier: Some(SubscriptionTier::ProYearly),
                status: SubscriptionStatus::Active,
                customer_id: Some(ref customer),
                ref subscription_id,
                renews_at: Some(_),
            } if customer == "77" && subscription_id == "9001"
        );
        assert_eq!(payload.user_id(), Some("user_1"));
    }

    #[test]
    fn test_unknown_variant_is_ignored() {
        let payload = payload("subscription_created", json!({ "status": "active", "variant_id": 5 }));
        assert_matches!(plan_change(&payload, &tiers()), SubscriptionChange::Ignore { .. });
    }

    #[test]
    fn test_updated_dispatches_on_status() {
        let cases = [
            ("active", "activate"),
            ("on_trial", "activate"),
            ("cancelled", "status"),
            ("past_due", "status"),
            ("unpaid", "status"),
            ("paused", "status"),
            ("expired", "downgrade"),
            ("mystery", "ignore"),
        ];

        for (status, expected) in cases {
            let payload = payload(
                "subscription_updated",
                json!({ "status": status, "variant_id": 111 }),
            );
            let kind = match plan_change(&payload, &tiers()) {
                SubscriptionChange::Activate { .. } => "activate",
                SubscriptionChange::SetStatus { .. } => "status",
                SubscriptionChange::Downgrade => "downgrade",
                SubscriptionChange::Ignore { .. } => "ignore",
            };
            assert_eq!(kind, expected, "status {}", status);
        }
    }

    #[test]
    fn test_cancelled_keeps_tier_until_ends_at() {
        let payload = payload(
            "subscription_cancelled",
            json!({ "status": "cancelled", "variant_id": 111, "ends_at": "2025-04-01T00:00:00Z" }),
        );

        assert_matches!(
            plan_change(&payload, &tiers()),
            SubscriptionChange::SetStatus {
                status: SubscriptionStatus::Cancelled,
                ends_at: Some(_),
            }
        );
    }

    #[test]
    fn test_expired_and_failed_payments() {
        let expired = payload("subscription_expired", json!({ "status": "expired" }));
        assert_eq!(plan_change(&expired, &tiers()), SubscriptionChange::Downgrade);

        let failed = payload("subscription_payment_failed", json!({}));
        assert_eq!(
            plan_change(&failed, &tiers()),
            SubscriptionChange::SetStatus {
                status: SubscriptionStatus::PastDue,
                ends_at: None,
            }
        );
    }

    #[test]
    fn test_invoice_event_uses_parent_subscription_and_keeps_tier() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "meta": { "event_name": "subscription_payment_success" },
            "data": {
                "type": "subscription-invoices",
                "id": "inv_1",
                "attributes": { "subscription_id": 9001, "status": "paid", "user_email": "a@example.com" }
            }
        }))
        .unwrap();

        assert_eq!(payload.user_id(), None);
        assert_eq!(payload.user_email(), Some("a@example.com"));
        assert_matches!(
            plan_change(&payload, &tiers()),
            SubscriptionChange::Activate { tier: None, ref subscription_id, .. } if subscription_id == "9001"
        );
    }

    #[test]
    fn test_other_events_are_ignored() {
        let payload = payload("order_created", json!({}));
        assert_matches!(plan_change(&payload, &tiers()), SubscriptionChange::Ignore { .. });
    }

    #[test]
    fn test_payload_missing_meta_is_rejected() {
        assert_matches!(
            parse_payload(br#"{"data": {}}"#),
            Err(WebhookError::InvalidPayload(_))
        );
    }
}
