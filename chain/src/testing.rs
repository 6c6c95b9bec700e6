// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Stages for tests: counting, tracing and publishing metadata.

use crate::metadata::Side;
use crate::service::Next;
use crate::{ChainError, Connection, ConnectionId, Context, NetworkService, NetworkServiceRequest};
use async_trait::async_trait;
use dashmap::DashMap;
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, thiserror::Error)]
#[error("{0} failed on purpose")]
pub struct Injected(&'static str);

/// Counts the requests and closes it sees, optionally failing them.
#[derive(Default)]
pub struct Counter {
    requests: AtomicUsize,
    closes: AtomicUsize,
    per_id: DashMap<ConnectionId, usize>,
    fail_requests: AtomicBool,
    fail_closes: AtomicBool,
}

impl Counter {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::Relaxed)
    }
    pub fn requests_for(&self, id: &ConnectionId) -> usize {
        self.per_id.get(id).map_or(0, |n| *n)
    }
    pub fn fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::Relaxed);
    }
    pub fn fail_closes(&self, fail: bool) {
        self.fail_closes.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl NetworkService for Counter {
    async fn request(
        &self,
        ctx: &Context,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        ctx.check()?;
        self.requests.fetch_add(1, Ordering::Relaxed);
        *self.per_id.entry(request.connection.id.clone()).or_default() += 1;
        if self.fail_requests.load(Ordering::Relaxed) {
            return Err(ChainError::stage("counter", Injected("request")));
        }
        next.request(ctx, request).await
    }

    async fn close(
        &self,
        ctx: &Context,
        connection: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        ctx.check()?;
        self.closes.fetch_add(1, Ordering::Relaxed);
        if self.fail_closes.load(Ordering::Relaxed) {
            return Err(ChainError::stage("counter", Injected("close")));
        }
        next.close(ctx, connection).await
    }
}

/// A shared log of stage events
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    fn push(&self, event: String) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
    /// Get the events logged so far and clear the log
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Logs `name:request` and `name:reply` around the rest of the chain, and `name:close`
pub struct Tracer {
    name: &'static str,
    trace: Trace,
}

impl Tracer {
    pub fn new(name: &'static str, trace: &Trace) -> Self {
        Self {
            name,
            trace: trace.clone(),
        }
    }
}

#[async_trait]
impl NetworkService for Tracer {
    async fn request(
        &self,
        ctx: &Context,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        self.trace.push(format!("{}:request", self.name));
        let conn = next.request(ctx, request).await?;
        self.trace.push(format!("{}:reply", self.name));
        Ok(conn)
    }

    async fn close(
        &self,
        ctx: &Context,
        connection: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        self.trace.push(format!("{}:close", self.name));
        next.close(ctx, connection).await
    }
}

/// Publishes a value in one side of the connection's metadata scope, remembering what it
/// found there before.
pub struct Publish<T> {
    side: Side,
    value: T,
    seen: Mutex<Vec<Option<T>>>,
    seen_on_close: Mutex<Vec<Option<T>>>,
}

impl<T: Any + Send + Sync + Clone> Publish<T> {
    pub fn new(side: Side, value: T) -> Self {
        Self {
            side,
            value,
            seen: Mutex::new(Vec::new()),
            seen_on_close: Mutex::new(Vec::new()),
        }
    }
    pub fn seen(&self) -> Vec<Option<T>> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
    pub fn seen_on_close(&self) -> Vec<Option<T>> {
        self.seen_on_close
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
    fn current(&self, ctx: &Context) -> Option<T> {
        ctx.metadata().and_then(|m| m.side(self.side).load::<T>())
    }
}

#[async_trait]
impl<T: Any + Send + Sync + Clone> NetworkService for Publish<T> {
    async fn request(
        &self,
        ctx: &Context,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        let current = self.current(ctx);
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(current);
        if let Some(metadata) = ctx.metadata() {
            metadata.side(self.side).store(self.value.clone());
        }
        next.request(ctx, request).await
    }

    async fn close(
        &self,
        ctx: &Context,
        connection: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        let current = self.current(ctx);
        self.seen_on_close
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(current);
        next.close(ctx, connection).await
    }
}
