// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::ChainError;
use crate::metadata::ConnectionMetadata;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{Duration, Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Values carried along a request, independent of its cancellation
#[derive(Debug, Clone, Default)]
struct Values {
    peer: Option<String>,
    metadata: Option<Arc<ConnectionMetadata>>,
}

/// The context of a request or close: values, an optional deadline and a cancellation token.
///
/// Cloning a context shares its cancellation token.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: Values,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl Context {
    /// A context without values, deadline or pending cancellation
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Bound this context by a timeout from now. An earlier deadline is kept.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    /// A context with the same values and deadline, which is cancelled when this one is
    /// but can also be cancelled on its own
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            values: self.values.clone(),
            deadline: self.deadline,
            cancel: self.cancel.child_token(),
        }
    }

    /// Set the identity of the authenticated peer that issued the request
    #[must_use]
    pub fn with_peer(mut self, peer: &str) -> Self {
        self.values.peer = Some(peer.to_owned());
        self
    }

    /// The identity of the peer that issued the request, if known
    #[must_use]
    pub fn peer(&self) -> Option<&str> {
        self.values.peer.as_deref()
    }

    /// A context sharing this one's deadline and cancellation, with the given metadata scope
    #[must_use]
    pub fn with_metadata(&self, metadata: Arc<ConnectionMetadata>) -> Self {
        let mut ctx = self.clone();
        ctx.values.metadata = Some(metadata);
        ctx
    }

    /// The metadata scope of the connection being processed, if any
    #[must_use]
    pub fn metadata(&self) -> Option<&Arc<ConnectionMetadata>> {
        self.values.metadata.as_ref()
    }

    /// The deadline of this context, if any
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, if there is one
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Cancel this context, and any context derived from it with [`Context::child`]
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Tell if this context was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail if this context is cancelled or past its deadline
    pub fn check(&self) -> Result<(), ChainError> {
        if self.is_cancelled() {
            return Err(ChainError::Cancelled);
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(ChainError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run `fut` to completion unless this context is cancelled or its deadline passes
    /// first, in which case `fut` is dropped.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ChainError> {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ChainError::Cancelled),
            () = deadline => Err(ChainError::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }

    /// Capture what is needed to build a context for a cleanup call later on: the values
    /// and the time budget left, but not the cancellation.
    #[must_use]
    pub fn postpone(&self) -> PostponedContext {
        PostponedContext {
            values: self.values.clone(),
            budget: self.remaining(),
        }
    }
}

/// The values and time budget of a context, captured with [`Context::postpone`]
#[derive(Debug, Clone)]
pub struct PostponedContext {
    values: Values,
    budget: Option<Duration>,
}

impl PostponedContext {
    /// Build a fresh context with the captured values, its own cancellation and a deadline
    /// set at the captured budget from now
    #[must_use]
    pub fn context(&self) -> Context {
        Context {
            values: self.values.clone(),
            deadline: self.budget.map(|budget| Instant::now() + budget),
            cancel: CancellationToken::new(),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn run_completes() {
        let ctx = Context::background().with_timeout(Duration::from_secs(10));
        assert_eq!(ctx.run(async { 7 }).await.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_at_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert!(matches!(result, Err(ChainError::DeadlineExceeded)));
        assert!(matches!(ctx.check(), Err(ChainError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let ctx = Context::background();
        let child = ctx.child();
        ctx.cancel();
        assert!(child.is_cancelled());
        let result = child.run(std::future::pending::<()>()).await;
        assert!(matches!(result, Err(ChainError::Cancelled)));
    }

    #[test]
    fn child_cancel_does_not_propagate_up() {
        let ctx = Context::background();
        let child = ctx.child();
        child.cancel();
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn earlier_deadline_is_kept() {
        let ctx = Context::background()
            .with_timeout(Duration::from_secs(1))
            .with_timeout(Duration::from_secs(60));
        assert!(ctx.remaining().unwrap() <= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn postponed_context_outlives_cancellation() {
        let ctx = Context::background()
            .with_peer("spiffe://example.org/nsc")
            .with_timeout(Duration::from_secs(30));
        let postponed = ctx.postpone();

        ctx.cancel();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(ctx.check().is_err());

        let cleanup = postponed.context();
        assert!(cleanup.check().is_ok());
        assert_eq!(cleanup.peer(), Some("spiffe://example.org/nsc"));
        assert!(cleanup.remaining().unwrap() <= Duration::from_secs(30));
        assert!(cleanup.remaining().unwrap() > Duration::from_secs(29));
    }

    #[test]
    fn postpone_without_deadline() {
        let cleanup = Context::background().postpone().context();
        assert!(cleanup.deadline().is_none());
    }
}
