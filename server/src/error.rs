//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use roster_engine::Error;
use serde::Serialize;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    fn parts(&self) -> (StatusCode, String, Option<String>) {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Store(err) => match err {
                Error::NotFound { .. } | Error::InvalidCollection(_) => {
                    (StatusCode::NOT_FOUND, err.to_string(), None)
                }
                Error::ValidationFailed(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, err.to_string(), None)
                }
                Error::WriteQueueOverflow { .. } => {
                    tracing::error!("Store error: {}", err);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Store is overloaded".to_string(),
                        Some(err.to_string()),
                    )
                }
                Error::TransientBackend(_) | Error::PersistenceCorruption(_) | Error::Storage(_) => {
                    tracing::error!("Store error: {}", err);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                        Some(err.to_string()),
                    )
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = self.parts();
        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: Error) -> StatusCode {
        AppError::from(err).parts().0
    }

    #[test]
    fn store_errors_map_to_status_codes() {
        assert_eq!(status(Error::not_found("students", "s1")), StatusCode::NOT_FOUND);
        assert_eq!(
            status(Error::InvalidCollection("pets".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(Error::ValidationFailed("duplicate".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(Error::WriteQueueOverflow { limit: 4 }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(Error::Storage("disk full".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn bad_request_has_no_details() {
        let (status, error, details) = AppError::BadRequest("body must be an object".into()).parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error, "body must be an object");
        assert_eq!(details, None);
    }
}
