use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use shared::models::ErrorResponse;
use thiserror::Error;

use crate::services::media::MediaError;
use crate::services::message_store::ChatStoreError;

pub type AppResult<T> = Result<T, ApiError>;

/// API-facing error with a stable machine code.
///
/// Serialized as an RFC 7807-style problem body. Presence-lookup misses are
/// never errors and never pass through here; the worst this type carries is
/// a stale view the client heals on its next fetch.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_failed", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let mut body = ErrorResponse::new(self.code, self.message);
        if let Some(details) = self.details {
            body = body.with_details(details);
        }

        let payload = serde_json::to_string(&body)
            .unwrap_or_else(|_| format!("{{\"code\":\"{}\"}}", self.code));

        (
            self.status,
            [(header::CONTENT_TYPE, "application/problem+json")],
            payload,
        )
            .into_response()
    }
}

impl From<ChatStoreError> for ApiError {
    fn from(err: ChatStoreError) -> Self {
        match err {
            ChatStoreError::Validation(message) => Self::validation(message),
            ChatStoreError::NotFound(message) => Self::not_found(message),
            ChatStoreError::Database(db_err) => {
                Self::internal_server_error("message store query failed")
                    .with_details(db_err.to_string())
            }
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Unsupported(message) => {
                Self::new(StatusCode::BAD_REQUEST, "unsupported_media", message)
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::internal_server_error("database error").with_details(err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal_server_error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_code() {
        let error = ApiError::validation("empty message");
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.code(), "validation_failed");

        let error = ApiError::not_found("peer missing").with_details("user 42");
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert_eq!(error.details.as_deref(), Some("user 42"));
    }

    #[tokio::test]
    async fn into_response_serializes_problem_body() {
        let response = ApiError::not_found("missing resource")
            .with_details("gone")
            .into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );

        let bytes = to_bytes(response.into_body(), 1024).await.expect("body");
        let body: ErrorResponse = serde_json::from_slice(&bytes).expect("problem body");
        assert_eq!(body.code, "not_found");
        assert_eq!(body.message, "missing resource");
        assert_eq!(body.details.as_deref(), Some("gone"));
    }

    #[test]
    fn store_errors_map_to_matching_status_codes() {
        let validation = ApiError::from(ChatStoreError::Validation("bad".into()));
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);

        let not_found = ApiError::from(ChatStoreError::NotFound("missing".into()));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let db = ApiError::from(ChatStoreError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn media_errors_are_rejected_as_bad_request() {
        let error = ApiError::from(MediaError::Unsupported("raw bytes".into()));
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.code(), "unsupported_media");
    }
}
