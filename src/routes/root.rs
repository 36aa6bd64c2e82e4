use crate::AppState;

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

pub async fn get_root() -> impl IntoResponse {
    "promemoria: appointment reminders"
}

pub async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    let database = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok();

    Json(json!({
        "database": database,
        "confirmations": state.runner.state(),
    }))
}
