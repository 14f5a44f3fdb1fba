use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use super::routes::AppState;

/// Liveness plus a database round trip
pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "up",
        Err(err) => {
            tracing::warn!(error = %err, "Health check could not reach the database");
            "down"
        }
    };

    Ok(Json(json!({
        "status": "healthy",
        "service": "strength-coach",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
