use crate::error::HttpError;
use std::future::{Future, pending};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-call deadline and cancellation.
///
/// Every public operation takes a `&CallContext`. The context bounds the
/// whole call: rate-limiter waits, every attempt, and every backoff sleep.
/// When it fires, the call returns [`HttpError::DeadlineExceeded`] or
/// [`HttpError::Cancelled`] and nothing further is sent.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl CallContext {
    /// Context with no deadline and no cancellation
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Bound the call to `timeout` from now (keeps an earlier deadline)
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Bound the call to an absolute deadline (keeps an earlier deadline)
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Abort the call when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Fail fast if the context is already done.
    ///
    /// # Errors
    ///
    /// [`HttpError::Cancelled`] or [`HttpError::DeadlineExceeded`].
    pub fn check(&self) -> Result<(), HttpError> {
        if self.is_cancelled() {
            return Err(HttpError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(HttpError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` until it completes or the context fires.
    ///
    /// Cancellation wins over a deadline that expires at the same instant,
    /// and both win over a ready result.
    ///
    /// # Errors
    ///
    /// Whatever `fut` returns, or the context error.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, HttpError>
    where
        F: Future<Output = Result<T, HttpError>>,
    {
        self.check()?;

        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => Err(HttpError::Cancelled),
            () = expired => Err(HttpError::DeadlineExceeded),
            result = fut => result,
        }
    }
}
