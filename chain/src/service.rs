// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::chain::Stage;
use crate::{ChainError, Connection, Context, NetworkServiceRequest, PostponedContext};
use async_trait::async_trait;
use std::any::Any;
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// A stage of a [`crate::Chain`].
///
/// On request, a stage normally does its own work and calls `next.request()` exactly once,
/// either before or after that work, returning what it got (possibly augmented). A stage
/// that fails after `next.request()` succeeded must close the connection it got through
/// `next`, so that the stages after it can release what they set up (see
/// [`close_on_failure`]).
///
/// On close, a stage releases its own state and calls `next.close()`.
#[async_trait]
pub trait NetworkService: Any + Send + Sync {
    /// Establish or refresh a connection
    async fn request(
        &self,
        ctx: &Context,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError>;

    /// Tear down a connection
    async fn close(
        &self,
        ctx: &Context,
        connection: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError>;
}

#[async_trait]
impl<T: NetworkService> NetworkService for std::sync::Arc<T> {
    async fn request(
        &self,
        ctx: &Context,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        self.as_ref().request(ctx, request, next).await
    }

    async fn close(
        &self,
        ctx: &Context,
        connection: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        self.as_ref().close(ctx, connection, next).await
    }
}

/// The stages that follow the current one. Once exhausted, a `Next` continues with the
/// stages that follow the enclosing chain, if any. At the very end of the chain, a request
/// returns the requested connection and a close succeeds.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Stage],
    then: Option<&'a Next<'a>>,
}

impl<'a> Next<'a> {
    pub(crate) fn new(stages: &'a [Stage], then: Option<&'a Next<'a>>) -> Self {
        Self { stages, then }
    }

    /// An empty `Next`, as seen by the last stage of a chain
    #[must_use]
    pub fn tail() -> Self {
        Self {
            stages: &[],
            then: None,
        }
    }

    fn pop(self) -> Option<(&'a Stage, Next<'a>)> {
        let mut current = self;
        loop {
            if let Some((first, rest)) = current.stages.split_first() {
                return Some((first, Next::new(rest, current.then)));
            }
            current = *current.then?;
        }
    }

    /// Hand a request over to the following stages
    pub async fn request(
        self,
        ctx: &Context,
        request: NetworkServiceRequest,
    ) -> Result<Connection, ChainError> {
        match self.pop() {
            Some((stage, rest)) => stage.service().request(ctx, request, rest).await,
            None => Ok(request.connection),
        }
    }

    /// Hand a close over to the following stages
    pub async fn close(self, ctx: &Context, connection: &Connection) -> Result<(), ChainError> {
        match self.pop() {
            Some((stage, rest)) => stage.service().close(ctx, connection, rest).await,
            None => Ok(()),
        }
    }
}

/// Close a connection that `next` established, after a stage failed with `error`. The close
/// uses a context built from `postponed`, so it runs even if the request's context was
/// cancelled or expired. Returns `error`, carrying the cleanup failure if there is one.
pub async fn close_on_failure(
    postponed: &PostponedContext,
    connection: &Connection,
    next: Next<'_>,
    error: ChainError,
) -> ChainError {
    let ctx = postponed.context();
    debug!("Closing connection {} after failure: {error}", connection.id);
    let cleanup = next.close(&ctx, connection).await;
    if let Err(e) = &cleanup {
        error!("Failed to close connection {}: {e}", connection.id);
    }
    error.with_cleanup(cleanup)
}
