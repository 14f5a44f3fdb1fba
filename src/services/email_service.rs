use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;
use crate::models::SubscriptionTier;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Invalid email address: {0}")]
    InvalidEmailAddress(#[from] lettre::address::AddressError),
    #[error("Failed to build email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

/// Upgrade confirmation text
pub fn subscription_email(name: Option<&str>, tier: SubscriptionTier, app_url: &str) -> EmailContent {
    let greeting = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("Hi {},", name),
        None => "Hi,".to_string(),
    };

    EmailContent {
        subject: format!("Welcome to Strength Coach {}", tier.display_name()),
        body: format!(
            "{}\n\n\
             Your {} subscription is active. Premium programs, unlimited saved \
             configurations and volume analytics are now unlocked.\n\n\
             Build your next program: {}/programs\n\n\
             Train hard,\nStrength Coach",
            greeting,
            tier.display_name(),
            app_url.trim_end_matches('/'),
        ),
    }
}

/// Sends transactional email over SMTP
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService").field("from", &self.from).finish()
    }
}

impl EmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, EmailError> {
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            mailer,
            from: config.from_email.parse()?,
        })
    }

    pub async fn send(&self, to: &str, content: &EmailContent) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(content.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(content.body.clone())?;

        self.mailer.send(message).await?;

        tracing::info!(to = %to, subject = %content.subject, "Sent email");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_email_mentions_plan_and_link() {
        let email = subscription_email(Some("Sam"), SubscriptionTier::ProYearly, "https://app.example.com/");

        assert_eq!(email.subject, "Welcome to Strength Coach Pro (yearly)");
        assert!(email.body.starts_with("Hi Sam,"));
        assert!(email.body.contains("https://app.example.com/programs"));
    }

    #[test]
    fn test_subscription_email_without_name() {
        let email = subscription_email(Some("  "), SubscriptionTier::ProMonthly, "http://localhost:3000");
        assert!(email.body.starts_with("Hi,"));
    }
}
