use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use super::error::{from_service, AppError};
use super::routes::AppState;
use super::users::current_user;
use crate::auth::{jwt_auth_middleware, UserSession};
use crate::models::{
    ConfigurationAnalysis, ConfigurationResponse, ExerciseQuery, ProgramDetail, ProgramSummary,
    ProgramWorkouts, SaveConfigurationRequest, TierFeatures, TrainingExercise,
};

/// Program browsing, the program builder and the exercise catalog
pub fn program_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/programs", get(list_programs))
        .route("/programs/:program_id", get(get_program))
        .route(
            "/programs/:program_id/configuration",
            get(get_configuration)
                .put(save_configuration)
                .delete(delete_configuration),
        )
        .route(
            "/programs/:program_id/configuration/analysis",
            get(get_configuration_analysis),
        )
        .route(
            "/programs/:program_id/configuration/preview",
            post(preview_configuration),
        )
        .route("/exercises", get(list_exercises))
        .route("/workouts", get(list_workouts))
        .route_layer(middleware::from_fn_with_state(
            state.jwt.clone(),
            jwt_auth_middleware,
        ))
        .with_state(state)
}

async fn features_for(state: &AppState, session: &UserSession) -> Result<TierFeatures, AppError> {
    let user = current_user(state, session).await?;
    state
        .subscriptions
        .tier_features(user.tier())
        .await
        .map_err(from_service)
}

/// Active programs; premium ones are flagged locked when the tier lacks access
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn list_programs(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<Vec<ProgramSummary>>, AppError> {
    let features = features_for(&state, &session).await?;
    let programs = state
        .programs
        .list_programs(false)
        .await
        .map_err(from_service)?;
    let counts = state.programs.template_counts().await.map_err(from_service)?;

    let summaries = programs
        .into_iter()
        .map(|program| ProgramSummary {
            workout_count: counts.get(&program.id).copied().unwrap_or(0) as usize,
            locked: program.is_premium && !features.premium_programs,
            program,
        })
        .collect();

    Ok(Json(summaries))
}

#[tracing::instrument(skip(state))]
async fn get_program(
    State(state): State<AppState>,
    WithRejection(Path(program_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<ProgramDetail>, AppError> {
    let detail = state
        .programs
        .get_program_detail(program_id)
        .await
        .map_err(from_service)?
        .filter(|detail| detail.program.is_active)
        .ok_or_else(|| AppError::not_found("Program"))?;

    Ok(Json(detail))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn get_configuration(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(program_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<ConfigurationResponse>, AppError> {
    let configuration = state
        .configurations
        .get_configuration(&session.user_id, program_id)
        .await?
        .ok_or_else(|| AppError::not_found("Configuration"))?;

    Ok(Json(configuration))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn save_configuration(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(program_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<SaveConfigurationRequest>, AppError>,
) -> Result<Json<ConfigurationResponse>, AppError> {
    let features = features_for(&state, &session).await?;
    let configuration = state
        .configurations
        .save_configuration(&session.user_id, program_id, &features, &request)
        .await?;

    Ok(Json(configuration))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn delete_configuration(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(program_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<StatusCode, AppError> {
    if state
        .configurations
        .delete_configuration(&session.user_id, program_id)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Configuration"))
    }
}

/// Bounds, coverage and, with volume analytics, per-muscle volume
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn get_configuration_analysis(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(program_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<ConfigurationAnalysis>, AppError> {
    let features = features_for(&state, &session).await?;
    let analysis = state
        .configurations
        .analysis(&session.user_id, program_id, &features)
        .await?;

    Ok(Json(analysis))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn preview_configuration(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(program_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<SaveConfigurationRequest>, AppError>,
) -> Result<Json<ConfigurationAnalysis>, AppError> {
    let features = features_for(&state, &session).await?;
    let analysis = state
        .configurations
        .preview(program_id, &features, &request)
        .await?;

    Ok(Json(analysis))
}

#[tracing::instrument(skip(state))]
async fn list_exercises(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ExerciseQuery>, AppError>,
) -> Result<Json<Vec<TrainingExercise>>, AppError> {
    let exercises = state
        .exercises
        .list_exercises(&query, false)
        .await
        .map_err(from_service)?;

    Ok(Json(exercises))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn list_workouts(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<Vec<ProgramWorkouts>>, AppError> {
    let workouts = state.configurations.workouts(&session.user_id).await?;
    Ok(Json(workouts))
}
