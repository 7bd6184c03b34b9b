// HTTP mapping of orchestration errors

use crate::models::{ErrorResponse, PendingResponse};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lc_core::{Error, ErrorKind};
use tracing::error;

pub enum ApiError {
    Core(Error),
    BadRequest(String),
    PayloadTooLarge(String),
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Core(err)
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::StateConflict => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Core(err) => {
                if let Some(reference) = err.pending_reference() {
                    let pending = PendingResponse {
                        message: err.to_string(),
                        transaction_hash: reference.to_string(),
                        status: "pending",
                    };
                    return (StatusCode::ACCEPTED, Json(pending)).into_response();
                }

                let kind = err.kind();
                let status = status_for(kind);
                if status.is_server_error() {
                    error!(%kind, "Request failed: {}", err);
                }
                (
                    status,
                    ErrorResponse {
                        error: err.to_string(),
                        kind: kind.to_string(),
                    },
                )
            }
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: msg,
                    kind: ErrorKind::ValidationError.to_string(),
                },
            ),
            ApiError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorResponse {
                    error: msg,
                    kind: ErrorKind::ValidationError.to_string(),
                },
            ),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: msg,
                        kind: ErrorKind::Internal.to_string(),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
