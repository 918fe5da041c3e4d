//! One time budget shared by every store call in a run

use crate::SecretError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default budget for discovery plus resolution.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest budget a run may ask for.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// A fixed point in time after which store calls are cancelled.
///
/// Created once when the pipeline starts; every call made through
/// [`Deadline::run`] is bounded by the same instant, not by a fresh timeout.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Deadline `budget` from now.
    ///
    /// A budget too large to represent as an instant is capped at
    /// [`MAX_TIMEOUT`] from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        let at = now
            .checked_add(budget)
            .unwrap_or_else(|| now + MAX_TIMEOUT);
        Self { at, budget }
    }

    /// Time left before the deadline, zero once it has passed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// The budget this deadline was created with.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Run `future` until it completes or the deadline passes.
    ///
    /// On expiry the future is dropped, cancelling any in-flight request.
    ///
    /// # Errors
    /// Returns the future's own error, or [`SecretError::DeadlineExceeded`].
    pub async fn run<T, F>(&self, operation: &str, future: F) -> Result<T, SecretError>
    where
        F: Future<Output = Result<T, SecretError>>,
    {
        tokio::time::timeout_at(self.at, future)
            .await
            .unwrap_or_else(|_| {
                Err(SecretError::DeadlineExceeded {
                    operation: operation.to_string(),
                    budget: self.budget,
                })
            })
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::after(DEFAULT_TIMEOUT)
    }
}
