use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub app_url: String,
    pub seed_on_startup: bool,
    pub lemon_squeezy: LemonSqueezyConfig,
    pub llm: LlmConfig,
    pub smtp: Option<SmtpConfig>,
}

/// Payment provider settings
#[derive(Clone, Default)]
pub struct LemonSqueezyConfig {
    pub webhook_secret: Option<String>,
    pub pro_monthly_variant_id: Option<i64>,
    pub pro_yearly_variant_id: Option<i64>,
}

impl std::fmt::Debug for LemonSqueezyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LemonSqueezyConfig")
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "[REDACTED]"))
            .field("pro_monthly_variant_id", &self.pro_monthly_variant_id)
            .field("pro_yearly_variant_id", &self.pro_yearly_variant_id)
            .finish()
    }
}

/// Chat completion provider settings
#[derive(Clone)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_email", &self.from_email)
            .finish()
    }
}

impl AppConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid port number")?;
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "your-secret-key-change-in-production".to_string());

        if environment == "production" && jwt_secret.starts_with("your-secret-key") {
            anyhow::bail!("JWT_SECRET must be set in production");
        }

        let seed_on_startup = env::var("SEED_ON_STARTUP")
            .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(AppConfig {
            host,
            port,
            environment,
            log_level,
            jwt_secret,
            jwt_issuer: non_empty_var("JWT_ISSUER"),
            app_url: env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            seed_on_startup,
            lemon_squeezy: LemonSqueezyConfig {
                webhook_secret: non_empty_var("LEMON_SQUEEZY_WEBHOOK_SECRET"),
                pro_monthly_variant_id: parse_optional_var("LEMON_SQUEEZY_PRO_MONTHLY_VARIANT_ID")?,
                pro_yearly_variant_id: parse_optional_var("LEMON_SQUEEZY_PRO_YEARLY_VARIANT_ID")?,
            },
            llm: LlmConfig {
                api_base: env::var("LLM_API_BASE")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                api_key: non_empty_var("LLM_API_KEY"),
                request_timeout: Duration::from_secs(
                    parse_optional_var("LLM_TIMEOUT_SECS")?.unwrap_or(60),
                ),
            },
            smtp: SmtpConfig::from_env()?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Get server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl SmtpConfig {
    /// SMTP is optional; it is enabled only when `SMTP_HOST` is set.
    fn from_env() -> Result<Option<Self>> {
        let Some(host) = non_empty_var("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(SmtpConfig {
            host,
            port: parse_optional_var("SMTP_PORT")?.unwrap_or(587),
            username: env::var("SMTP_USERNAME").unwrap_or_default(),
            password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            from_email: env::var("SMTP_FROM")
                .unwrap_or_else(|_| "Strength Coach <noreply@localhost>".to_string()),
        }))
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional_var<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    non_empty_var(key)
        .map(|value| value.trim().parse::<T>())
        .transpose()
        .with_context(|| format!("{} has an invalid value", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "PORT",
        "ENVIRONMENT",
        "JWT_SECRET",
        "SEED_ON_STARTUP",
        "LEMON_SQUEEZY_WEBHOOK_SECRET",
        "LEMON_SQUEEZY_PRO_MONTHLY_VARIANT_ID",
        "LEMON_SQUEEZY_PRO_YEARLY_VARIANT_ID",
        "LLM_API_KEY",
        "SMTP_HOST",
    ];

    fn clear_env() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.environment, "development");
        assert!(!config.seed_on_startup);
        assert!(config.lemon_squeezy.webhook_secret.is_none());
        assert!(config.llm.api_key.is_none());
        assert!(config.smtp.is_none());
        assert_eq!(config.server_address(), format!("{}:3000", config.host));
    }

    #[test]
    #[serial]
    fn test_payment_variants_are_parsed() {
        clear_env();
        env::set_var("LEMON_SQUEEZY_WEBHOOK_SECRET", "whsec");
        env::set_var("LEMON_SQUEEZY_PRO_MONTHLY_VARIANT_ID", "1001");
        env::set_var("LEMON_SQUEEZY_PRO_YEARLY_VARIANT_ID", " 1002 ");
        env::set_var("SEED_ON_STARTUP", "true");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.lemon_squeezy.webhook_secret.as_deref(), Some("whsec"));
        assert_eq!(config.lemon_squeezy.pro_monthly_variant_id, Some(1001));
        assert_eq!(config.lemon_squeezy.pro_yearly_variant_id, Some(1002));
        assert!(config.seed_on_startup);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_variant_id_is_an_error() {
        clear_env();
        env::set_var("LEMON_SQUEEZY_PRO_MONTHLY_VARIANT_ID", "monthly");

        assert!(AppConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_production_requires_jwt_secret() {
        clear_env();
        env::set_var("ENVIRONMENT", "production");

        assert!(AppConfig::from_env().is_err());

        env::set_var("JWT_SECRET", "a-real-secret");
        let config = AppConfig::from_env().unwrap();
        assert!(config.is_production());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_secrets_are_redacted_in_debug_output() {
        clear_env();
        env::set_var("LEMON_SQUEEZY_WEBHOOK_SECRET", "super-secret-value");
        env::set_var("LLM_API_KEY", "sk-hidden");

        let config = AppConfig::from_env().unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-value"));
        assert!(!debug.contains("sk-hidden"));

        clear_env();
    }
}
