use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quill_common::{ExtractionRequest, ExtractionResult, QuillError};
use serde_json::json;

use crate::AppState;

/// Error wrapper mapping [`QuillError`] onto `{ "error": ... }` responses.
#[derive(Debug)]
pub struct ApiError(pub QuillError);

impl From<QuillError> for ApiError {
    fn from(err: QuillError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// `POST /api/fetch-medium-content`
///
/// A body that is not a JSON object with a string `url` is treated the same
/// as a missing URL.
pub async fn fetch_medium_content(
    State(state): State<AppState>,
    payload: Result<Json<ExtractionRequest>, JsonRejection>,
) -> Result<Json<ExtractionResult>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(reason = %rejection.body_text(), "fetch.rejected_payload");
        QuillError::MissingUrl
    })?;
    let url = request.validated_url()?;

    let result = state.extractor.extract(url).await?;
    Ok(Json(result))
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
