use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use taint_core::TaintError;

pub(crate) enum AppError {
    ServiceUnavailable(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Store timeouts surface as a 503 so callers retry instead of treating the
/// address as unconnected; every other error is an internal failure.
pub(super) fn map_query_error(err: TaintError) -> AppError {
    match err {
        TaintError::QueryUnavailable(msg) => AppError::ServiceUnavailable(msg),
        other => AppError::Internal(other.to_string()),
    }
}
