// Business logic services

pub mod ai_config_service;
pub mod coach_chat_service;
pub mod configuration_service;
pub mod email_service;
pub mod errors;
pub mod exercise_service;
pub mod lemon_squeezy;
pub mod llm_client;
pub mod program_builder;
pub mod program_service;
pub mod structure_service;
pub mod subscription_service;
pub mod user_service;

pub use ai_config_service::AiConfigService;
pub use coach_chat_service::CoachChatService;
pub use configuration_service::ConfigurationService;
pub use email_service::EmailService;
pub use errors::{ServiceError, ServiceResult};
pub use exercise_service::ExerciseService;
pub use llm_client::LlmClient;
pub use program_builder::ProgramBuilder;
pub use program_service::ProgramService;
pub use structure_service::StructureService;
pub use subscription_service::{SubscriptionService, WebhookOutcome};
pub use user_service::UserService;
