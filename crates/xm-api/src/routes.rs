use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use xm_core::error::DateKeyError;
use xm_core::{DateKey, PipelineError, ResultSummary};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub date: Option<String>,
    pub bucket: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub message: String,
    pub data: ResultSummary,
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    MissingParameters,
    InvalidBody(String),
    InvalidDate(DateKeyError),
    Pipeline(PipelineError),
    Unexpected(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MissingParameters => (
                StatusCode::BAD_REQUEST,
                "Missing parameters in request".to_string(),
            ),
            ApiError::InvalidBody(reason) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid request body: {reason}"),
            ),
            ApiError::InvalidDate(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Pipeline(err) => (StatusCode::FORBIDDEN, err.to_string()),
            ApiError::Unexpected(reason) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Unexpected error: {reason}"),
            ),
        };
        (status, Json(MessageBody { message })).into_response()
    }
}

pub async fn health() -> Json<MessageBody> {
    Json(MessageBody {
        message: "UP".to_string(),
    })
}

pub async fn extract(
    State(app_state): State<AppState>,
    payload: Result<Json<TriggerRequest>, JsonRejection>,
) -> Result<Json<TriggerResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::InvalidBody(rejection.body_text()))?;

    let present = |value: Option<String>| value.filter(|text| !text.trim().is_empty());
    let (Some(raw_date), Some(bucket)) = (present(request.date), present(request.bucket)) else {
        return Err(ApiError::MissingParameters);
    };
    let date = DateKey::parse(raw_date.trim()).map_err(ApiError::InvalidDate)?;

    // Run on its own task so a panic inside the pipeline becomes a 500, not a dropped
    // connection.
    let pipeline = app_state.pipeline();
    let task_bucket = bucket.clone();
    let outcome = tokio::spawn(async move {
        let pipeline = pipeline.lock().await;
        pipeline.run(&date, &task_bucket).await
    })
    .await
    .map_err(|err| {
        tracing::error!(date = %date, bucket = %bucket, "extraction task failed: {err}");
        ApiError::Unexpected(err.to_string())
    })?;

    let summary = outcome.map_err(ApiError::Pipeline)?;
    Ok(Json(TriggerResponse {
        message: format!("Successfully extracted all data for date: {date}"),
        data: summary,
    }))
}
