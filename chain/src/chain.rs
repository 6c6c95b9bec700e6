// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::service::Next;
use crate::{ChainError, Connection, Context, NetworkService, NetworkServiceRequest};
use async_trait::async_trait;
use std::any::Any;
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// A named stage of a [`Chain`]
pub(crate) struct Stage {
    name: &'static str,
    service: Box<dyn NetworkService>,
}

impl Stage {
    pub(crate) fn service(&self) -> &dyn NetworkService {
        self.service.as_ref()
    }
}

/// An ordered list of stages, built once and then shared by all requests.
#[derive(Default)]
pub struct Chain {
    name: &'static str,
    stages: Vec<Stage>,
}

impl Chain {
    /// Create an empty [`Chain`]
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            stages: Vec::new(),
        }
    }

    /// Append a stage. Stage names must be unique within a chain.
    pub fn add_stage<S: NetworkService>(
        mut self,
        name: &'static str,
        service: S,
    ) -> Result<Self, ChainError> {
        if self.stages.iter().any(|s| s.name == name) {
            return Err(ChainError::DuplicateStage(name.to_owned()));
        }
        self.stages.push(Stage {
            name,
            service: Box::new(service),
        });
        Ok(self)
    }

    /// Name of this chain
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Names of the stages, in order
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name).collect()
    }

    /// Get a stage by name, if it is of type `T`
    #[must_use]
    pub fn get_stage<T: NetworkService>(&self, name: &str) -> Option<&T> {
        self.stages
            .iter()
            .find(|s| s.name == name)
            .and_then(|s| (s.service() as &dyn Any).downcast_ref::<T>())
    }

    /// Run a request through this chain
    pub async fn process_request(
        &self,
        ctx: &Context,
        request: NetworkServiceRequest,
    ) -> Result<Connection, ChainError> {
        ctx.check()?;
        if request.connection.id.is_empty() {
            return Err(ChainError::MissingConnectionId);
        }
        debug!("{}: request for connection {}", self.name, request.connection.id);
        let id = request.connection.id.clone();
        let result = Next::new(&self.stages, None).request(ctx, request).await;
        match &result {
            Ok(_) => debug!("{}: connection {id} established", self.name),
            Err(e) => warn!("{}: request for connection {id} failed: {e}", self.name),
        }
        result
    }

    /// Run a close through this chain
    pub async fn process_close(
        &self,
        ctx: &Context,
        connection: &Connection,
    ) -> Result<(), ChainError> {
        if connection.id.is_empty() {
            return Err(ChainError::MissingConnectionId);
        }
        debug!("{}: close of connection {}", self.name, connection.id);
        let result = Next::new(&self.stages, None).close(ctx, connection).await;
        if let Err(e) = &result {
            warn!("{}: close of connection {} failed: {e}", self.name, connection.id);
        }
        result
    }
}

#[async_trait]
impl NetworkService for Chain {
    async fn request(
        &self,
        ctx: &Context,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        Next::new(&self.stages, Some(&next)).request(ctx, request).await
    }

    async fn close(
        &self,
        ctx: &Context,
        connection: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        Next::new(&self.stages, Some(&next)).close(ctx, connection).await
    }
}
