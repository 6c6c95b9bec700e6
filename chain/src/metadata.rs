// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A connection's metadata scope holds typed values that stages publish for later stages of
//! the same connection. Each scope has two sides: one for the server chain (facing the
//! traffic producer) and one for the client chain (facing the traffic consumer).
//!
//! Scopes are created by the [`MetadataStage`] on the first request for a connection, kept
//! across refreshes, and dropped on close.

use crate::service::Next;
use crate::{ChainError, Connection, ConnectionId, Context, NetworkService, NetworkServiceRequest};
use async_trait::async_trait;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::fmt::Display;
use std::sync::Arc;
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// The side of a connection a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// producer-facing
    Server,
    /// consumer-facing
    Client,
}

impl Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Server => write!(f, "server"),
            Side::Client => write!(f, "client"),
        }
    }
}

/// Typed values of one side of a scope, at most one per type
#[derive(Default)]
pub struct SideValues(DashMap<TypeId, Arc<dyn Any + Send + Sync>>);

impl SideValues {
    /// Store a value, replacing any previous value of the same type
    pub fn store<T: Any + Send + Sync>(&self, value: T) {
        self.0.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Get a copy of the value of type `T`, if any
    #[must_use]
    pub fn load<T: Any + Send + Sync + Clone>(&self) -> Option<T> {
        self.0
            .get(&TypeId::of::<T>())
            .and_then(|v| v.value().downcast_ref::<T>().cloned())
    }

    /// Remove the value of type `T`, returning it if there was one
    pub fn delete<T: Any + Send + Sync + Clone>(&self) -> Option<T> {
        self.0
            .remove(&TypeId::of::<T>())
            .and_then(|(_, v)| v.downcast_ref::<T>().cloned())
    }

    /// Number of values stored
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Tell if no value is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The metadata scope of a connection
pub struct ConnectionMetadata {
    id: ConnectionId,
    server: SideValues,
    client: SideValues,
}

impl ConnectionMetadata {
    /// An empty scope for the given connection
    #[must_use]
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            server: SideValues::default(),
            client: SideValues::default(),
        }
    }

    /// The connection this scope belongs to
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// The values of one side
    #[must_use]
    pub fn side(&self, side: Side) -> &SideValues {
        match side {
            Side::Server => &self.server,
            Side::Client => &self.client,
        }
    }
}

impl std::fmt::Debug for ConnectionMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionMetadata")
            .field("id", &self.id)
            .field("server", &self.server.len())
            .field("client", &self.client.len())
            .finish()
    }
}

/// A stage that attaches the connection's metadata scope to the context of the stages after
/// it. If the context already carries the scope of the same connection (e.g. a client chain
/// run from a server chain), that scope is reused and left to its owner.
#[derive(Default)]
pub struct MetadataStage {
    scopes: DashMap<ConnectionId, Arc<ConnectionMetadata>>,
}

impl MetadataStage {
    /// A stage without scopes
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scopes owned by this stage
    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Tell if this stage owns no scope
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Tell if this stage owns the scope of a connection
    #[must_use]
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.scopes.contains_key(id)
    }

    fn inherited(ctx: &Context, id: &ConnectionId) -> bool {
        ctx.metadata().is_some_and(|m| m.id() == id)
    }
}

#[async_trait]
impl NetworkService for MetadataStage {
    async fn request(
        &self,
        ctx: &Context,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        let id = request.connection.id.clone();
        if Self::inherited(ctx, &id) {
            return next.request(ctx, request).await;
        }

        let mut created = false;
        let scope = self
            .scopes
            .entry(id.clone())
            .or_insert_with(|| {
                created = true;
                Arc::new(ConnectionMetadata::new(id.clone()))
            })
            .value()
            .clone();
        if created {
            debug!("Created metadata scope for connection {id}");
        }

        let result = next.request(&ctx.with_metadata(scope.clone()), request).await;
        if result.is_err() && created {
            // only if no concurrent request for the same connection holds it
            let dropped = self
                .scopes
                .remove_if(&id, |_, s| Arc::ptr_eq(s, &scope) && Arc::strong_count(s) <= 2);
            if dropped.is_some() {
                debug!("Dropped metadata scope of connection {id}");
            }
        }
        result
    }

    async fn close(
        &self,
        ctx: &Context,
        connection: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        if Self::inherited(ctx, &connection.id) {
            return next.close(ctx, connection).await;
        }
        let scope = self
            .scopes
            .get(&connection.id)
            .map(|s| s.value().clone())
            .unwrap_or_else(|| Arc::new(ConnectionMetadata::new(connection.id.clone())));
        let result = next.close(&ctx.with_metadata(scope), connection).await;
        self.scopes.remove(&connection.id);
        debug!("Dropped metadata scope of connection {}", connection.id);
        result
    }
}
