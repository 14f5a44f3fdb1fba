use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};

use super::error::{from_service, AppError};
use super::routes::AppState;
use crate::services::lemon_squeezy::{parse_payload, verify_signature, WebhookError, SIGNATURE_HEADER};

/// Payment provider callbacks; authenticated by signature, not by token
pub fn webhook_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/lemon-squeezy", post(lemon_squeezy_webhook))
        .with_state(state)
}

#[tracing::instrument(skip_all)]
async fn lemon_squeezy_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let secret = state
        .config
        .lemon_squeezy
        .webhook_secret
        .as_deref()
        .ok_or(WebhookError::NotConfigured)?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    if let Err(err) = verify_signature(secret.as_bytes(), &body, signature) {
        tracing::warn!(error = %err, "Rejected webhook");
        return Err(err.into());
    }

    let payload = parse_payload(&body)?;
    tracing::info!(
        event = %payload.meta.event_name,
        object_id = %payload.data.id,
        "Received subscription webhook"
    );

    let outcome = state
        .subscriptions
        .handle_webhook(&payload)
        .await
        .map_err(from_service)?;

    Ok(Json(json!({
        "received": true,
        "outcome": outcome.as_str(),
    })))
}
