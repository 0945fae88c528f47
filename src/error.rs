use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::{StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use crate::gate::GateError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Search query must not be empty")]
    EmptySearch,

    #[error("Search query must be at most {max} characters")]
    SearchTooLong { max: usize },

    #[error(transparent)]
    BadQuery(#[from] QueryRejection),

    #[error("No default username configured")]
    NoDefaultUsername,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();

        match self {
            ApiError::Gate(GateError::RateLimitExceeded { retry_after_secs }) => {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(RETRY_AFTER, retry_after_secs.to_string())],
                    Json(json!({
                        "error": message,
                        "type": "TWITTER_RATE_LIMIT",
                        "retryAfter": retry_after_secs,
                    })),
                )
                    .into_response()
            }
            ApiError::InvalidUsername(_)
            | ApiError::EmptySearch
            | ApiError::SearchTooLong { .. }
            | ApiError::BadQuery(_) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": message, "type": "BAD_REQUEST" })),
            )
                .into_response(),
            ApiError::Gate(_) | ApiError::NoDefaultUsername => {
                tracing::error!(error = %message, "tweet request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Failed to fetch tweets", "type": "GENERAL_ERROR" })),
                )
                    .into_response()
            }
        }
    }
}
