use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::error::{from_service, AppError};
use super::routes::AppState;
use crate::auth::{admin_only_middleware, jwt_auth_middleware, UserSession};
use crate::models::{
    AdminUpdateUserRequest, AiConfiguration, CreateExerciseRequest, CreateProgramRequest,
    CreateSplitRequest, ExerciseQuery, ProgramDetail, StructureDetail, StructureRequest,
    SubscriptionEvent, SubscriptionSummary, SubscriptionTier, TierFeatures, TrainingExercise,
    TrainingProgram, TrainingSplit, UpdateAiConfigRequest, UpdateExerciseRequest,
    UpdateProgramRequest, UpdateTierFeaturesRequest, UpdateWorkoutTemplateRequest, UserListQuery,
    UserResponse, WorkoutTemplate, WorkoutTemplateInput,
};

/// Content and account management; admin role required
pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/programs", get(list_programs).post(create_program))
        .route(
            "/programs/:program_id",
            get(get_program).put(update_program).delete(delete_program),
        )
        .route("/programs/:program_id/templates", post(add_template))
        .route(
            "/programs/:program_id/templates/:template_id",
            put(update_template).delete(delete_template),
        )
        .route("/splits", get(list_splits).post(create_split))
        .route("/structures", get(list_structures).post(create_structure))
        .route(
            "/structures/:structure_id",
            get(get_structure)
                .put(update_structure)
                .delete(delete_structure),
        )
        .route("/exercises", get(list_exercises).post(create_exercise))
        .route(
            "/exercises/:exercise_id",
            get(get_exercise)
                .put(update_exercise)
                .delete(delete_exercise),
        )
        .route("/users", get(list_users))
        .route("/users/:user_id", get(get_user).put(update_user))
        .route("/ai-config", get(get_ai_config).put(update_ai_config))
        .route("/subscriptions/summary", get(subscription_summary))
        .route("/subscriptions/events", get(subscription_events))
        .route("/tier-features", get(list_tier_features))
        .route("/tier-features/:tier", put(update_tier_features))
        // route_layer order: the last layer added runs first
        .route_layer(middleware::from_fn(admin_only_middleware))
        .route_layer(middleware::from_fn_with_state(
            state.jwt.clone(),
            jwt_auth_middleware,
        ))
        .with_state(state)
}

type Created<T> = (StatusCode, Json<T>);

// ---- programs ----

#[tracing::instrument(skip(state))]
async fn list_programs(State(state): State<AppState>) -> Result<Json<Vec<TrainingProgram>>, AppError> {
    let programs = state
        .programs
        .list_programs(true)
        .await
        .map_err(from_service)?;
    Ok(Json(programs))
}

#[tracing::instrument(skip(state, request))]
async fn create_program(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<CreateProgramRequest>, AppError>,
) -> Result<Created<ProgramDetail>, AppError> {
    request.validate()?;
    let detail = state
        .programs
        .create_program(&request)
        .await
        .map_err(from_service)?;
    Ok((StatusCode::CREATED, Json(detail)))
}

#[tracing::instrument(skip(state))]
async fn get_program(
    State(state): State<AppState>,
    WithRejection(Path(program_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<ProgramDetail>, AppError> {
    state
        .programs
        .get_program_detail(program_id)
        .await
        .map_err(from_service)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Program"))
}

#[tracing::instrument(skip(state, request))]
async fn update_program(
    State(state): State<AppState>,
    WithRejection(Path(program_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateProgramRequest>, AppError>,
) -> Result<Json<ProgramDetail>, AppError> {
    request.validate()?;
    state
        .programs
        .update_program(program_id, &request)
        .await
        .map_err(from_service)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Program"))
}

#[tracing::instrument(skip(state))]
async fn delete_program(
    State(state): State<AppState>,
    WithRejection(Path(program_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<StatusCode, AppError> {
    deleted(
        state.programs.delete_program(program_id).await,
        "Program",
    )
}

#[tracing::instrument(skip(state, request))]
async fn add_template(
    State(state): State<AppState>,
    WithRejection(Path(program_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<WorkoutTemplateInput>, AppError>,
) -> Result<Created<WorkoutTemplate>, AppError> {
    request.validate()?;
    let template = state
        .programs
        .add_template(program_id, &request)
        .await
        .map_err(from_service)?
        .ok_or_else(|| AppError::not_found("Program"))?;
    Ok((StatusCode::CREATED, Json(template)))
}

#[tracing::instrument(skip(state, request))]
async fn update_template(
    State(state): State<AppState>,
    WithRejection(Path((program_id, template_id)), _): WithRejection<Path<(Uuid, Uuid)>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateWorkoutTemplateRequest>, AppError>,
) -> Result<Json<WorkoutTemplate>, AppError> {
    request.validate()?;
    state
        .programs
        .update_template(program_id, template_id, &request)
        .await
        .map_err(from_service)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Workout template"))
}

#[tracing::instrument(skip(state))]
async fn delete_template(
    State(state): State<AppState>,
    WithRejection(Path((program_id, template_id)), _): WithRejection<Path<(Uuid, Uuid)>, AppError>,
) -> Result<StatusCode, AppError> {
    deleted(
        state.programs.delete_template(program_id, template_id).await,
        "Workout template",
    )
}

// ---- splits and structures ----

#[tracing::instrument(skip(state))]
async fn list_splits(State(state): State<AppState>) -> Result<Json<Vec<TrainingSplit>>, AppError> {
    let splits = state.structures.list_splits().await.map_err(from_service)?;
    Ok(Json(splits))
}

#[tracing::instrument(skip(state, request))]
async fn create_split(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<CreateSplitRequest>, AppError>,
) -> Result<Created<TrainingSplit>, AppError> {
    request.validate()?;
    let split = state
        .structures
        .create_split(&request)
        .await
        .map_err(from_service)?;
    Ok((StatusCode::CREATED, Json(split)))
}

#[tracing::instrument(skip(state))]
async fn list_structures(
    State(state): State<AppState>,
) -> Result<Json<Vec<StructureDetail>>, AppError> {
    let structures = state
        .structures
        .list_structures()
        .await
        .map_err(from_service)?;
    Ok(Json(structures))
}

#[tracing::instrument(skip(state, request))]
async fn create_structure(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<StructureRequest>, AppError>,
) -> Result<Created<StructureDetail>, AppError> {
    request.validate()?;
    let structure = state
        .structures
        .create_structure(&request)
        .await
        .map_err(from_service)?;
    Ok((StatusCode::CREATED, Json(structure)))
}

#[tracing::instrument(skip(state))]
async fn get_structure(
    State(state): State<AppState>,
    WithRejection(Path(structure_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<StructureDetail>, AppError> {
    state
        .structures
        .get_structure_detail(structure_id)
        .await
        .map_err(from_service)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Structure"))
}

#[tracing::instrument(skip(state, request))]
async fn update_structure(
    State(state): State<AppState>,
    WithRejection(Path(structure_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<StructureRequest>, AppError>,
) -> Result<Json<StructureDetail>, AppError> {
    request.validate()?;
    state
        .structures
        .update_structure(structure_id, &request)
        .await
        .map_err(from_service)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Structure"))
}

#[tracing::instrument(skip(state))]
async fn delete_structure(
    State(state): State<AppState>,
    WithRejection(Path(structure_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<StatusCode, AppError> {
    deleted(
        state.structures.delete_structure(structure_id).await,
        "Structure",
    )
}

// ---- exercises ----

#[tracing::instrument(skip(state))]
async fn list_exercises(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ExerciseQuery>, AppError>,
) -> Result<Json<Vec<TrainingExercise>>, AppError> {
    let exercises = state
        .exercises
        .list_exercises(&query, true)
        .await
        .map_err(from_service)?;
    Ok(Json(exercises))
}

#[tracing::instrument(skip(state, request))]
async fn create_exercise(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<CreateExerciseRequest>, AppError>,
) -> Result<Created<TrainingExercise>, AppError> {
    request.validate()?;
    if request.secondary_overlaps_primary() {
        return Err(AppError::bad_request(
            "The primary muscle group cannot also be a secondary muscle group",
        ));
    }

    let exercise = state
        .exercises
        .create_exercise(&request)
        .await
        .map_err(from_service)?;
    Ok((StatusCode::CREATED, Json(exercise)))
}

#[tracing::instrument(skip(state))]
async fn get_exercise(
    State(state): State<AppState>,
    WithRejection(Path(exercise_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<TrainingExercise>, AppError> {
    state
        .exercises
        .get_exercise(exercise_id)
        .await
        .map_err(from_service)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Exercise"))
}

#[tracing::instrument(skip(state, request))]
async fn update_exercise(
    State(state): State<AppState>,
    WithRejection(Path(exercise_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateExerciseRequest>, AppError>,
) -> Result<Json<TrainingExercise>, AppError> {
    request.validate()?;
    state
        .exercises
        .update_exercise(exercise_id, &request)
        .await
        .map_err(from_service)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Exercise"))
}

#[tracing::instrument(skip(state))]
async fn delete_exercise(
    State(state): State<AppState>,
    WithRejection(Path(exercise_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<StatusCode, AppError> {
    deleted(
        state.exercises.delete_exercise(exercise_id).await,
        "Exercise",
    )
}

// ---- users ----

#[tracing::instrument(skip(state))]
async fn list_users(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<UserListQuery>, AppError>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state
        .users
        .list_users(&query)
        .await
        .map_err(from_service)?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[tracing::instrument(skip(state))]
async fn get_user(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<String>, AppError>,
) -> Result<Json<UserResponse>, AppError> {
    state
        .users
        .get_user(&user_id)
        .await
        .map_err(from_service)?
        .map(|user| Json(user.into()))
        .ok_or_else(|| AppError::not_found("User"))
}

#[tracing::instrument(skip(state, request))]
async fn update_user(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<String>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<AdminUpdateUserRequest>, AppError>,
) -> Result<Json<UserResponse>, AppError> {
    request.validate()?;
    state
        .users
        .admin_update(&user_id, &request)
        .await
        .map_err(from_service)?
        .map(|user| Json(user.into()))
        .ok_or_else(|| AppError::not_found("User"))
}

// ---- AI configuration ----

#[tracing::instrument(skip(state))]
async fn get_ai_config(State(state): State<AppState>) -> Result<Json<AiConfiguration>, AppError> {
    let config = state.ai_config.get().await.map_err(from_service)?;
    Ok(Json(config))
}

#[tracing::instrument(skip(state, session, request), fields(admin = %session.user_id))]
async fn update_ai_config(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateAiConfigRequest>, AppError>,
) -> Result<Json<AiConfiguration>, AppError> {
    request.validate()?;
    let config = state
        .ai_config
        .update(&request, &session.user_id)
        .await
        .map_err(from_service)?;
    Ok(Json(config))
}

// ---- subscriptions ----

#[tracing::instrument(skip(state))]
async fn subscription_summary(
    State(state): State<AppState>,
) -> Result<Json<SubscriptionSummary>, AppError> {
    let summary = state.subscriptions.summary().await.map_err(from_service)?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    limit: Option<i64>,
}

#[tracing::instrument(skip(state))]
async fn subscription_events(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<EventsQuery>, AppError>,
) -> Result<Json<Vec<SubscriptionEvent>>, AppError> {
    let events = state
        .subscriptions
        .recent_events(query.limit.unwrap_or(100))
        .await
        .map_err(from_service)?;
    Ok(Json(events))
}

#[tracing::instrument(skip(state))]
async fn list_tier_features(
    State(state): State<AppState>,
) -> Result<Json<Vec<TierFeatures>>, AppError> {
    let features = state
        .subscriptions
        .list_tier_features()
        .await
        .map_err(from_service)?;
    Ok(Json(features))
}

#[tracing::instrument(skip(state, request))]
async fn update_tier_features(
    State(state): State<AppState>,
    WithRejection(Path(tier), _): WithRejection<Path<String>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateTierFeaturesRequest>, AppError>,
) -> Result<Json<TierFeatures>, AppError> {
    request.validate()?;
    let tier = SubscriptionTier::from_str(&tier)
        .ok_or_else(|| AppError::bad_request(format!("Unknown subscription tier {}", tier)))?;

    let features = state
        .subscriptions
        .update_tier_features(tier, &request)
        .await
        .map_err(from_service)?;
    Ok(Json(features))
}

fn deleted(result: anyhow::Result<bool>, what: &str) -> Result<StatusCode, AppError> {
    match result.map_err(from_service)? {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(AppError::not_found(what)),
    }
}
