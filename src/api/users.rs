use axum::{
    extract::State,
    middleware,
    response::Json,
    routing::{get, put},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use validator::Validate;

use super::error::{from_service, AppError};
use super::routes::AppState;
use crate::auth::{jwt_auth_middleware, UserSession};
use crate::models::{OnboardingRequest, SubscriptionOverview, User, UserResponse};

/// Profile, onboarding and subscription of the signed-in user
pub fn user_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/onboarding", put(complete_onboarding))
        .route("/subscription", get(get_subscription))
        .route_layer(middleware::from_fn_with_state(
            state.jwt.clone(),
            jwt_auth_middleware,
        ))
        .with_state(state)
}

/// The user row behind the session, provisioned on first sight
pub(crate) async fn current_user(state: &AppState, session: &UserSession) -> Result<User, AppError> {
    if let Some(user) = state
        .users
        .get_user(&session.user_id)
        .await
        .map_err(from_service)?
    {
        return Ok(user);
    }

    provision(state, session).await
}

async fn provision(state: &AppState, session: &UserSession) -> Result<User, AppError> {
    if crate::models::validate_email(&session.email).is_err() {
        return Err(AppError::bad_request("Token does not carry a valid email address"));
    }

    let user = state
        .users
        .upsert_from_session(session)
        .await
        .map_err(from_service)?;
    tracing::debug!(user_id = %user.id, "Provisioned user from token");
    Ok(user)
}

/// Current user; creates or refreshes the row from the token
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn get_me(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<UserResponse>, AppError> {
    let user = provision(&state, &session).await?;
    Ok(Json(user.into()))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn complete_onboarding(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<OnboardingRequest>, AppError>,
) -> Result<Json<UserResponse>, AppError> {
    request.validate()?;
    current_user(&state, &session).await?;

    let user = state
        .users
        .complete_onboarding(&session.user_id, &request)
        .await
        .map_err(from_service)?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(Json(user.into()))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn get_subscription(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<SubscriptionOverview>, AppError> {
    let user = current_user(&state, &session).await?;
    let overview = state
        .subscriptions
        .overview(&user)
        .await
        .map_err(from_service)?;

    Ok(Json(overview))
}
