use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let database_ok = tokio::time::timeout(
        Duration::from_secs(3),
        sqlx::query("SELECT 1").execute(&state.db_pool),
    )
    .await
    .map(|result| result.is_ok())
    .unwrap_or(false);

    Ok(Json(json!({
        "status": if database_ok { "ok" } else { "degraded" },
        "database": database_ok,
        "service": state.config.app_name,
    })))
}
