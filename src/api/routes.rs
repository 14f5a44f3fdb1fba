use axum::{routing::get, Router};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::admin::admin_routes;
use super::coach::coach_routes;
use super::health::health_check;
use super::programs::program_routes;
use super::users::user_routes;
use super::webhooks::webhook_routes;
use crate::auth::{cors_layer, security_headers_layer, JwtService};
use crate::config::AppConfig;
use crate::services::lemon_squeezy::VariantTiers;
use crate::services::{
    AiConfigService, CoachChatService, ConfigurationService, EmailService, ExerciseService,
    LlmClient, ProgramService, StructureService, SubscriptionService, UserService,
};

/// Shared handles for every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub jwt: JwtService,
    pub users: UserService,
    pub programs: ProgramService,
    pub structures: StructureService,
    pub exercises: ExerciseService,
    pub configurations: ConfigurationService,
    pub subscriptions: SubscriptionService,
    pub ai_config: AiConfigService,
    pub coach: CoachChatService,
}

impl AppState {
    pub fn new(db: PgPool, config: Arc<AppConfig>) -> anyhow::Result<Self> {
        let email = match &config.smtp {
            Some(smtp) => Some(EmailService::new(smtp)?),
            None => {
                tracing::info!("SMTP not configured; subscription emails are disabled");
                None
            }
        };
        let llm = LlmClient::new(&config.llm)?;
        if !llm.is_configured() {
            tracing::warn!("LLM_API_KEY not set; coach chat will answer 503");
        }

        Ok(Self {
            jwt: JwtService::new(&config.jwt_secret, config.jwt_issuer.clone()),
            users: UserService::new(db.clone()),
            programs: ProgramService::new(db.clone()),
            structures: StructureService::new(db.clone()),
            exercises: ExerciseService::new(db.clone()),
            configurations: ConfigurationService::new(db.clone()),
            subscriptions: SubscriptionService::new(
                db.clone(),
                VariantTiers::from(&config.lemon_squeezy),
                email,
                config.app_url.clone(),
            ),
            ai_config: AiConfigService::new(db.clone()),
            coach: CoachChatService::new(db.clone(), llm),
            db,
            config,
        })
    }
}

pub fn create_routes(state: AppState) -> Router {
    let api = Router::new()
        .merge(user_routes(state.clone()))
        .merge(program_routes(state.clone()))
        .nest("/coach", coach_routes(state.clone()))
        .nest("/admin", admin_routes(state.clone()))
        .nest("/webhooks", webhook_routes(state.clone()));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .layer(security_headers_layer())
}
