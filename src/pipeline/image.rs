//! Card image load policy: per-attempt watchdog, bounded retries, fallback.

use std::time::Duration;
use tokio::sync::watch;

use crate::content::{ImageFetcher, ImagePriority};

#[derive(Debug, Clone)]
pub struct ImagePolicy {
    /// Total attempts, the initial load included.
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Watchdog per attempt. An attempt still running at this point counts
    /// as failed.
    pub timeout: Duration,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Image state of a card as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImageState {
    #[default]
    Pending,
    Loading {
        attempt: u32,
        priority: ImagePriority,
    },
    Loaded {
        bytes: usize,
    },
    /// Flat background. Also used for articles that never had an image.
    Fallback,
}

impl ImageState {
    pub fn is_settled(&self) -> bool {
        matches!(self, ImageState::Loaded { .. } | ImageState::Fallback)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Loaded { bytes: usize, attempts: u32 },
    Fallback { attempts: u32 },
}

impl From<&ImageOutcome> for ImageState {
    fn from(outcome: &ImageOutcome) -> Self {
        match outcome {
            ImageOutcome::Loaded { bytes, .. } => ImageState::Loaded { bytes: *bytes },
            ImageOutcome::Fallback { .. } => ImageState::Fallback,
        }
    }
}

/// Load one image under `policy`.
///
/// `priority` may be raised while an attempt is running; the attempt is then
/// restarted at the new priority and does not count against the budget.
pub async fn load_image(
    fetcher: &dyn ImageFetcher,
    url: &str,
    policy: &ImagePolicy,
    mut priority: watch::Receiver<ImagePriority>,
) -> ImageOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        let current = *priority.borrow_and_update();
        tracing::trace!(url, attempt = attempts, ?current, "Loading image");

        let result = tokio::select! {
            result = tokio::time::timeout(policy.timeout, fetcher.fetch_image(url, current)) => Some(result),
            Ok(()) = priority.changed(), if current < ImagePriority::High => None,
        };

        match result {
            None => {
                tracing::debug!(url, "Image priority raised, restarting load");
                attempts -= 1;
                continue;
            }
            Some(Ok(Ok(bytes))) => return ImageOutcome::Loaded { bytes, attempts },
            Some(Ok(Err(e))) => {
                tracing::debug!(url, attempt = attempts, error = %e, "Image load failed");
            }
            Some(Err(_)) => {
                tracing::debug!(url, attempt = attempts, "Image load timed out");
            }
        }

        if attempts >= max_attempts {
            tracing::warn!(url, attempts, "Image unavailable, using fallback");
            return ImageOutcome::Fallback { attempts };
        }
        tokio::time::sleep(policy.retry_delay).await;
    }
}
