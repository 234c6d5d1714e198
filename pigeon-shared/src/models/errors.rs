use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Wire shape of an error body.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
pub struct ErrorResponse {
    /// Stable machine-readable code, e.g. `validation_failed`.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Optional additional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Creates a new error response with a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Attaches free-form details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {} ({details})", self.code, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for ErrorResponse {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_display() {
        let plain = ErrorResponse::new("not_found", "peer does not exist");
        assert_eq!(format!("{plain}"), "not_found: peer does not exist");

        let detailed = ErrorResponse::new("validation_failed", "empty message")
            .with_details("text and media both absent");
        assert!(format!("{detailed}").contains("text and media both absent"));
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse::new("internal_error", "boom");
        let json = serde_json::to_string(&error).unwrap();

        assert!(json.contains("\"code\":\"internal_error\""));
        assert!(!json.contains("details"));

        let parsed: ErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, error);
    }
}
