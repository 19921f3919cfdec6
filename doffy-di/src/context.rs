//! Cancellation and deadline propagation for service resolution

use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// A cancellable resolution context with an optional deadline.
///
/// Every resolution call threads a [`Context`]. Asynchronous providers derive a
/// child context from it with their own deadline, so cancelling the parent
/// cancels every construction started under it.
///
/// # Example
/// ```no_run
/// use doffy_di::Context;
/// use std::time::Duration;
///
/// let ctx = Context::new().with_timeout(Duration::from_secs(5));
/// assert!(ctx.deadline().is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Creates a context that is never cancelled and has no deadline
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context driven by an existing cancellation token
    #[inline]
    pub fn from_token(token: CancellationToken) -> Self {
        Self { token, deadline: None }
    }

    /// Derives a child context that expires after `timeout`.
    ///
    /// The child never outlives its parent: if the parent deadline is sooner it is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a child context that expires at `deadline`
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derives a child context sharing the deadline of this one
    #[inline]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Returns the point in time after which construction must be abandoned
    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time left before the deadline
    #[inline]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns the underlying cancellation token
    #[inline]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancels this context and every context derived from it
    #[inline]
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` if the context was cancelled
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns `true` if the deadline has passed
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Completes when the context is cancelled or its deadline passes
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => {},
                _ = sleep_until(deadline) => {},
            },
            None => self.token.cancelled().await,
        }
    }
}
