use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use campus_digest::SummaryError;
use campus_types::api::ErrorResponse;
use campus_types::error::ChatError;

/// Status code plus a JSON body naming the failure kind.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, kind: &str, error: String) -> Self {
        if status.is_server_error() {
            error!("{} ({}): {}", status, kind, error);
        }
        Self {
            status,
            body: ErrorResponse {
                kind: kind.to_string(),
                error,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let status = match &err {
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ChatError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.kind(), err.to_string())
    }
}

// Malformed query strings and bodies get the same JSON shape as every other
// caller error instead of axum's plain-text rejection.
impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), "invalid_input", rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "invalid_input", rejection.body_text())
    }
}

impl From<SummaryError> for ApiError {
    fn from(err: SummaryError) -> Self {
        let status = match &err {
            SummaryError::NotFound(_) => StatusCode::NOT_FOUND,
            SummaryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            SummaryError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SummaryError::Generation(_) => StatusCode::BAD_GATEWAY,
            SummaryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self::new(status, err.kind(), err.to_string())
    }
}
