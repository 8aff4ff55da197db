//! Response envelope.
//!
//! Successful bodies are `{"status": "success", ...}`; every failure goes
//! through [`ApiError`] and becomes `{"status": "error", "message", "code"}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use scrub_processing::CleaningError;
use serde_json::{Map, Value, json};
use thiserror::Error;

pub type ApiResult<T = Response> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Cleaning(#[from] CleaningError),

    /// Malformed or incomplete request.
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Cleaning(e) => e.error_code(),
            Self::BadRequest(_) => "BAD_REQUEST",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.code() {
            "BAD_REQUEST" | "PARSE_ERROR" | "EMPTY_INPUT" | "UNSUPPORTED_FORMAT"
            | "INVALID_STRATEGY" | "INVALID_SCHEDULE" | "INVALID_CONFIG" | "SHAPE_MISMATCH" => {
                StatusCode::BAD_REQUEST
            }
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" | "VERSION_CONFLICT" | "JOB_NOT_SCHEDULED" | "OPERATION_FINISHED" => {
                StatusCode::CONFLICT
            }
            "TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        } else {
            tracing::warn!(code = self.code(), "{}", self);
        }
        let body = json!({
            "status": "error",
            "message": self.to_string(),
            "code": self.code(),
        });
        (status, Json(body)).into_response()
    }
}

/// `{"status": "success"}` merged with the given fields.
pub fn success(fields: Value) -> Response {
    let mut body = Map::new();
    body.insert("status".to_string(), Value::from("success"));
    if let Value::Object(extra) = fields {
        body.extend(extra);
    }
    (StatusCode::OK, Json(Value::Object(body))).into_response()
}
