//! Error types for image generation.

use std::time::Duration;

/// Maximum length of a provider error body carried in an error message.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur during image generation.
#[derive(Debug, thiserror::Error)]
pub enum GenPixError {
    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Operation timed out.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid request parameters (e.g. an empty prompt).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No provider registered for the requested kind.
    #[error("provider not available: {0}")]
    ProviderNotAvailable(String),

    /// Provider answered successfully but without a usable image.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The request produced no images at all.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// A local image blob was released before it was read.
    #[error("image blob already released: {0}")]
    BlobReleased(String),
}

/// Result type alias for image generation operations.
pub type Result<T> = std::result::Result<T, GenPixError>;

/// Collapses whitespace in a provider error body and truncates it.
///
/// Provider proxies sometimes answer errors with full HTML pages, which
/// would otherwise flood warnings shown to the user.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GenPixError::Api {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");

        let err = GenPixError::InvalidRequest("prompt must not be empty".into());
        assert_eq!(err.to_string(), "invalid request: prompt must not be empty");

        let err = GenPixError::GenerationFailed("No images were generated.".into());
        assert_eq!(err.to_string(), "generation failed: No images were generated.");
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(
            sanitize_error_message("  upstream \n\t timeout  "),
            "upstream timeout"
        );
    }

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(2000);
        let sanitized = sanitize_error_message(&body);
        assert_eq!(sanitized.len(), MAX_ERROR_MESSAGE_LEN + 3);
        assert!(sanitized.ends_with("..."));
    }

    #[test]
    fn test_sanitize_empty_body() {
        assert_eq!(sanitize_error_message(""), "");
    }
}
