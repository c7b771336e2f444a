//! Outcome type for single-image fetches.

use crate::error::{GenPixError, Result};
use crate::image::locator::ImageLocator;
use std::future::Future;
use std::time::Duration;

/// Ceiling on a single provider call, including reading the body.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Result of one provider call. Failures are values, never errors, so they
/// can be aggregated across concurrent calls.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The call produced an image.
    Success { locator: ImageLocator },
    /// The call failed; `message` is safe to show to a user.
    Failure { message: String },
}

impl FetchOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<Result<ImageLocator>> for FetchOutcome {
    fn from(result: Result<ImageLocator>) -> Self {
        match result {
            Ok(locator) => Self::Success { locator },
            // Request URLs may carry an API key.
            Err(GenPixError::Network(e)) => {
                Self::failure(GenPixError::Network(e.without_url()).to_string())
            }
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

/// Runs `fetch` under `timeout`, turning every error (and the timeout itself)
/// into a [`FetchOutcome::Failure`].
pub async fn fetch_with_timeout<F>(timeout: Duration, fetch: F) -> FetchOutcome
where
    F: Future<Output = Result<ImageLocator>>,
{
    match tokio::time::timeout(timeout, fetch).await {
        Ok(result) => result.into(),
        Err(_) => FetchOutcome::failure(GenPixError::Timeout(timeout).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_passes_through() {
        let outcome = fetch_with_timeout(Duration::from_secs(1), async {
            Ok(ImageLocator::Remote("https://example.com/a.png".into()))
        })
        .await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_error_becomes_failure() {
        let outcome = fetch_with_timeout(Duration::from_secs(1), async {
            Err(GenPixError::Api {
                status: 502,
                message: "bad gateway".into(),
            })
        })
        .await;
        match outcome {
            FetchOutcome::Failure { message } => assert_eq!(message, "API error: 502 - bad gateway"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_fetch_times_out() {
        let start = tokio::time::Instant::now();
        let outcome = fetch_with_timeout(
            DEFAULT_FETCH_TIMEOUT,
            std::future::pending::<Result<ImageLocator>>(),
        )
        .await;

        assert!(start.elapsed() >= DEFAULT_FETCH_TIMEOUT);
        match outcome {
            FetchOutcome::Failure { message } => assert!(message.contains("timed out")),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
