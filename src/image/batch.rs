//! Batched fan-out for providers that return one image per call.
//!
//! Calls are issued in batches of at most `max_concurrent`. Every call in a
//! batch settles before the next batch starts, and batches are separated by a
//! fixed pause to stay under upstream rate limits.

use crate::image::fetch::FetchOutcome;
use crate::image::locator::ImageLocator;
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;

/// Most provider calls in flight at once.
pub const MAX_CONCURRENT: usize = 2;

/// Pause between consecutive batches.
pub const BATCH_DELAY: Duration = Duration::from_secs(1);

/// Pacing settings for [`run_batched`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Most calls in flight at once. Values below 1 are treated as 1.
    pub max_concurrent: usize,
    /// Pause after every batch except the last.
    pub batch_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: MAX_CONCURRENT,
            batch_delay: BATCH_DELAY,
        }
    }
}

/// Aggregated outcome of a batched run.
#[derive(Debug)]
pub struct BatchReport {
    /// Number of calls issued.
    pub requested: u32,
    /// Successful locators in issuance order.
    pub images: Vec<ImageLocator>,
    /// Failure messages in issuance order.
    pub errors: Vec<String>,
}

impl BatchReport {
    /// Returns true if no call failed.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Warning describing the failures, `None` on full success.
    ///
    /// With zero images this is the hard-failure message; otherwise it states
    /// how many of the requested images failed.
    pub fn warning(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        if self.images.is_empty() {
            return Some(format!(
                "no images generated: all {} requests failed ({})",
                self.requested,
                self.errors.join("; ")
            ));
        }
        Some(format!(
            "{} of {} images failed to generate",
            self.errors.len(),
            self.requested
        ))
    }
}

/// Issues `count` calls to `fetch` (with indices `0..count`) in paced,
/// bounded batches and aggregates the outcomes.
///
/// Output order follows issuance order regardless of completion order. A
/// failing call never cancels its siblings.
pub async fn run_batched<F, Fut>(count: u32, config: &BatchConfig, mut fetch: F) -> BatchReport
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = FetchOutcome>,
{
    let batch_size = u32::try_from(config.max_concurrent.max(1)).unwrap_or(u32::MAX);
    let mut images = Vec::with_capacity(count as usize);
    let mut errors = Vec::new();

    let mut start = 0;
    while start < count {
        let end = start.saturating_add(batch_size).min(count);
        tracing::debug!(
            first = start + 1,
            last = end,
            total = count,
            "dispatching image batch"
        );

        let batch: Vec<Fut> = (start..end).map(&mut fetch).collect();
        for (index, outcome) in (start..end).zip(join_all(batch).await) {
            match outcome {
                FetchOutcome::Success { locator } => images.push(locator),
                FetchOutcome::Failure { message } => {
                    tracing::warn!(index = index + 1, total = count, "image fetch failed: {message}");
                    errors.push(format!("image {}: {message}", index + 1));
                }
            }
        }

        start = end;
        if start < count && !config.batch_delay.is_zero() {
            tokio::time::sleep(config.batch_delay).await;
        }
    }

    BatchReport {
        requested: count,
        images,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::fetch::{fetch_with_timeout, DEFAULT_FETCH_TIMEOUT};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn remote(tag: impl std::fmt::Display) -> FetchOutcome {
        FetchOutcome::Success {
            locator: ImageLocator::Remote(format!("https://img.test/{tag}")),
        }
    }

    fn urls(report: &BatchReport) -> Vec<String> {
        report.images.iter().map(|l| l.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_concurrency_bound() {
        for count in 1..=5u32 {
            let in_flight = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));
            let calls = Arc::new(AtomicUsize::new(0));

            let report = run_batched(count, &BatchConfig::default(), |i| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100 + 10 * u64::from(i))).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    remote(i)
                }
            })
            .await;

            assert_eq!(calls.load(Ordering::SeqCst), count as usize);
            assert_eq!(report.images.len(), count as usize);
            assert!(peak.load(Ordering::SeqCst) <= MAX_CONCURRENT, "count {count}");
            if count >= 2 {
                assert_eq!(peak.load(Ordering::SeqCst), MAX_CONCURRENT);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_follows_issuance_order() {
        let finished = Arc::new(Mutex::new(Vec::new()));

        let report = run_batched(2, &BatchConfig::default(), |i| {
            let finished = Arc::clone(&finished);
            async move {
                let delay = if i == 0 { 200 } else { 10 };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                finished.lock().unwrap().push(i);
                remote(format!("call{}", i + 1))
            }
        })
        .await;

        assert_eq!(*finished.lock().unwrap(), vec![1, 0]);
        assert_eq!(
            urls(&report),
            vec!["https://img.test/call1", "https://img.test/call2"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_is_reported() {
        // Calls 2 and 4 (1-based) fail.
        let report = run_batched(5, &BatchConfig::default(), |i| async move {
            if i == 1 || i == 3 {
                FetchOutcome::failure("Flux API error: 503")
            } else {
                remote(i + 1)
            }
        })
        .await;

        assert_eq!(
            urls(&report),
            vec![
                "https://img.test/1",
                "https://img.test/3",
                "https://img.test/5"
            ]
        );
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0], "image 2: Flux API error: 503");
        assert_eq!(
            report.warning().as_deref(),
            Some("2 of 5 images failed to generate")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_warning() {
        let report = run_batched(3, &BatchConfig::default(), |_| async {
            FetchOutcome::failure("connection reset")
        })
        .await;

        assert!(report.images.is_empty());
        assert_eq!(report.errors.len(), 3);
        let warning = report.warning().unwrap();
        assert!(warning.starts_with("no images generated"));
        assert!(warning.contains("connection reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_success_has_no_warning() {
        let report = run_batched(3, &BatchConfig::default(), |i| async move { remote(i) }).await;
        assert!(report.is_complete());
        assert!(report.warning().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_are_paced() {
        let start = Instant::now();
        let report = run_batched(5, &BatchConfig::default(), |i| async move { remote(i) }).await;

        // Batches {1,2} {3,4} {5}: two pauses, none after the last batch.
        let elapsed = start.elapsed();
        assert!(elapsed >= 2 * BATCH_DELAY, "elapsed {elapsed:?}");
        assert!(elapsed < 3 * BATCH_DELAY, "elapsed {elapsed:?}");
        assert_eq!(report.images.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_batch_has_no_pause() {
        let start = Instant::now();
        run_batched(2, &BatchConfig::default(), |i| async move { remote(i) }).await;
        assert!(start.elapsed() < BATCH_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_batch_waits_for_slowest_call() {
        let origin = Instant::now();
        let started = Arc::new(Mutex::new(Vec::new()));

        run_batched(3, &BatchConfig::default(), |i| {
            let started = Arc::clone(&started);
            async move {
                started.lock().unwrap().push((i, origin.elapsed()));
                if i == 0 {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                remote(i)
            }
        })
        .await;

        let started = started.lock().unwrap();
        let (_, third_start) = started.iter().find(|(i, _)| *i == 2).copied().unwrap();
        assert!(third_start >= Duration::from_secs(5) + BATCH_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_config() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let config = BatchConfig {
            max_concurrent: 0,
            batch_delay: Duration::ZERO,
        };

        let start = Instant::now();
        let report = run_batched(3, &config, |i| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                remote(i)
            }
        })
        .await;

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(report.images.len(), 3);
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_call_resolves_within_timeout() {
        let start = Instant::now();
        let report = run_batched(3, &BatchConfig::default(), |i| async move {
            if i == 1 {
                fetch_with_timeout(
                    DEFAULT_FETCH_TIMEOUT,
                    std::future::pending::<crate::Result<ImageLocator>>(),
                )
                .await
            } else {
                remote(i)
            }
        })
        .await;

        assert!(start.elapsed() <= DEFAULT_FETCH_TIMEOUT + BATCH_DELAY);
        assert_eq!(report.images.len(), 2);
        assert_eq!(
            report.warning().as_deref(),
            Some("1 of 3 images failed to generate")
        );
    }
}
