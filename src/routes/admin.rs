use crate::{
    auth::Operator,
    error::NotificationError,
    models::{NotificationRecord, NotificationStatus},
    runner::{BatchReport, RunState},
    AppState,
};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use sqlx::types::uuid::Uuid;
use std::future::Future;
use tokio::task::JoinError;

#[derive(Serialize)]
pub struct ConfirmationsStatus {
    pub state: RunState,
    pub tomorrow: chrono::NaiveDate,
}

#[derive(Serialize)]
pub struct SendReport {
    pub success: bool,
    pub record: NotificationRecord,
}

impl From<NotificationRecord> for SendReport {
    fn from(record: NotificationRecord) -> Self {
        SendReport {
            success: record.status == NotificationStatus::Sent,
            record,
        }
    }
}

pub async fn get_confirmations(
    State(state): State<AppState>,
    _operator: Operator,
) -> Json<ConfirmationsStatus> {
    Json(ConfirmationsStatus {
        state: state.runner.state(),
        tomorrow: state.runner.tomorrow(),
    })
}

#[axum_macros::debug_handler(state = AppState)]
pub async fn post_run_confirmations(
    State(state): State<AppState>,
    _operator: Operator,
) -> (StatusCode, Json<BatchReport>) {
    let runner = state.runner.clone();
    let report = match detached(async move { runner.run_daily_confirmation().await }).await {
        Ok(report) => report,
        Err(e) => {
            log::error!("Confirmation run task failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(BatchReport {
                    success: false,
                    errors: vec![e.to_string()],
                    ..Default::default()
                }),
            );
        }
    };

    let status = if report.success {
        StatusCode::OK
    } else if report.is_already_running() {
        StatusCode::CONFLICT
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (status, Json(report))
}

#[axum_macros::debug_handler(state = AppState)]
pub async fn post_appointment_confirmation(
    State(state): State<AppState>,
    _operator: Operator,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<SendReport>, NotificationError> {
    let sender = state.sender.clone();
    let record =
        detached(async move { sender.send_single_confirmation(appointment_id).await }).await??;

    Ok(Json(record.into()))
}

#[axum_macros::debug_handler(state = AppState)]
pub async fn post_resend_notification(
    State(state): State<AppState>,
    _operator: Operator,
    Path(message_id): Path<Uuid>,
) -> Result<Json<SendReport>, NotificationError> {
    let sender = state.sender.clone();
    let record = detached(async move { sender.resend_message(message_id).await }).await??;

    Ok(Json(record.into()))
}

pub async fn get_notification(
    State(state): State<AppState>,
    _operator: Operator,
    Path(message_id): Path<Uuid>,
) -> Result<Json<NotificationRecord>, NotificationError> {
    let record = state.sender.find_message(message_id).await?;

    Ok(Json(record))
}

/// Runs `work` on its own task, so a client disconnecting mid-request
/// cannot cut a send or a batch short.
async fn detached<F>(work: F) -> Result<F::Output, JoinError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(work).await
}

impl IntoResponse for NotificationError {
    fn into_response(self) -> Response {
        let status = match &self {
            NotificationError::Configuration => StatusCode::SERVICE_UNAVAILABLE,
            NotificationError::NotFound { .. } => StatusCode::NOT_FOUND,
            NotificationError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            NotificationError::AlreadySent { .. } => StatusCode::CONFLICT,
            NotificationError::Transport(_) => StatusCode::BAD_GATEWAY,
            NotificationError::Database(_) | NotificationError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }

        (
            status,
            Json(json!({
                "success": false,
                "error": self.to_string(),
            })),
        )
            .into_response()
    }
}
