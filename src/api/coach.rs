use axum::{
    extract::{Query, State},
    middleware,
    response::Json,
    routing::get,
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use validator::Validate;

use super::error::{from_service, AppError};
use super::routes::AppState;
use super::users::current_user;
use crate::auth::{jwt_auth_middleware, UserSession};
use crate::models::{ChatHistoryQuery, ChatReply, CoachMessage, SendMessageRequest};

pub fn coach_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/messages", get(get_history).post(send_message))
        .route_layer(middleware::from_fn_with_state(
            state.jwt.clone(),
            jwt_auth_middleware,
        ))
        .with_state(state)
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn send_message(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<SendMessageRequest>, AppError>,
) -> Result<Json<ChatReply>, AppError> {
    request.validate()?;

    let user = current_user(&state, &session).await?;
    let features = state
        .subscriptions
        .tier_features(user.tier())
        .await
        .map_err(from_service)?;

    let reply = state
        .coach
        .send_message(&user, &features, &request.message)
        .await?;

    Ok(Json(reply))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn get_history(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Query(query), _): WithRejection<Query<ChatHistoryQuery>, AppError>,
) -> Result<Json<Vec<CoachMessage>>, AppError> {
    let messages = state.coach.history(&session.user_id, &query).await?;
    Ok(Json(messages))
}
