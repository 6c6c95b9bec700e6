// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Creation of the dataplane interface of one side of a connection.
//!
//! The [`InterfaceStage`] picks the first mechanism of the request it can serve, creates the
//! matching interface in the engine and publishes its handle, both in the connection's
//! metadata scope (for the NAT stages) and in the mechanism parameters (for the peer). The
//! interface lives until the connection is closed, or until a later stage fails the request.

use crate::interfaces::{SW_IF_INDEX_PARAM, extract_interface_index};
use crate::{NatError, ifindex};
use async_trait::async_trait;
use chain::metadata::Side;
use chain::{ChainError, Connection, Context, Mechanism, NetworkService, NetworkServiceRequest, Next};
use dplane::{InterfaceHandle, InterfaceKind, InterfaceManager};
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// Name under which [`InterfaceStage`] reports its failures
pub const INTERFACE_STAGE: &str = "interface";

pub struct InterfaceStage {
    side: Side,
    interfaces: InterfaceManager,
}

impl InterfaceStage {
    #[must_use]
    pub fn new(side: Side, interfaces: InterfaceManager) -> Self {
        Self { side, interfaces }
    }

    /// The kind of interface to create. Without preferences, a shared-memory interface.
    fn select(request: &NetworkServiceRequest) -> Result<InterfaceKind, NatError> {
        if request.mechanism_preferences.is_empty() {
            return Ok(InterfaceKind::Memif);
        }
        request
            .mechanism_preferences
            .iter()
            .find_map(|m| InterfaceKind::from_name(&m.kind))
            .ok_or_else(|| {
                let kinds: Vec<_> = request
                    .mechanism_preferences
                    .iter()
                    .map(|m| m.kind.as_str())
                    .collect();
                NatError::UnsupportedMechanism(kinds.join(","))
            })
    }

    fn interface_name(&self, connection: &Connection) -> String {
        format!("{}-{}", self.side, connection.id)
    }

    async fn delete(&self, handle: InterfaceHandle) -> Result<(), ChainError> {
        self.interfaces
            .delete_interface(handle)
            .await
            .map_err(|e| NatError::from(e).in_stage(INTERFACE_STAGE))
    }
}

fn set_mechanism(connection: &mut Connection, kind: InterfaceKind, handle: InterfaceHandle) {
    let mechanism = connection
        .mechanism
        .get_or_insert_with(|| Mechanism::new(kind.as_str()));
    mechanism.kind = kind.as_str().to_owned();
    mechanism
        .parameters
        .insert(SW_IF_INDEX_PARAM.to_owned(), handle.to_string());
}

#[async_trait]
impl NetworkService for InterfaceStage {
    async fn request(
        &self,
        ctx: &Context,
        mut request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        let kind = Self::select(&request).map_err(|e| e.in_stage(INTERFACE_STAGE))?;

        if let Some(handle) = ifindex::load(ctx, self.side) {
            debug!(
                "Connection {}: reusing {} side interface {handle}",
                request.connection.id, self.side
            );
            set_mechanism(&mut request.connection, kind, handle);
            return next.request(ctx, request).await;
        }

        ctx.check()?;
        let name = self.interface_name(&request.connection);
        let handle = self
            .interfaces
            .create_interface(kind, &name)
            .await
            .map_err(|e| NatError::from(e).in_stage(INTERFACE_STAGE))?;
        if let Err(e) = ifindex::store(ctx, self.side, handle) {
            let e = e.in_stage(INTERFACE_STAGE);
            return Err(e.with_cleanup(self.delete(handle).await));
        }
        debug!(
            "Connection {}: created {} side {kind} interface {handle}",
            request.connection.id, self.side
        );
        set_mechanism(&mut request.connection, kind, handle);

        match next.request(ctx, request).await {
            Ok(conn) => Ok(conn),
            Err(e) => {
                ifindex::delete(ctx, self.side);
                debug!("Deleting {} side interface {handle} after failure", self.side);
                Err(e.with_cleanup(self.delete(handle).await))
            }
        }
    }

    async fn close(
        &self,
        ctx: &Context,
        connection: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        let result = next.close(ctx, connection).await;
        let handle = ifindex::delete(ctx, self.side)
            .or_else(|| extract_interface_index(connection).ok());
        match handle {
            Some(handle) => {
                debug!(
                    "Connection {}: deleting {} side interface {handle}",
                    connection.id, self.side
                );
                let deleted = self.delete(handle).await;
                result.and(deleted)
            }
            None => {
                debug!(
                    "Connection {}: no {} side interface to delete",
                    connection.id, self.side
                );
                result
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::request;
    use chain::Chain;
    use chain::metadata::MetadataStage;
    use chain::testing::Counter;
    use dplane::RequestKind;
    use dplane::testing::RecordingChannel;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn setup(side: Side) -> (Arc<RecordingChannel>, Arc<Counter>, Chain) {
        let channel = Arc::new(RecordingChannel::new());
        let counter = Arc::new(Counter::default());
        let stage = InterfaceStage::new(side, InterfaceManager::new(channel.clone()));
        let chain = Chain::new("test")
            .add_stage("metadata", MetadataStage::new())
            .unwrap()
            .add_stage("interface", stage)
            .unwrap()
            .add_stage("count", counter.clone())
            .unwrap();
        (channel, counter, chain)
    }

    #[tokio::test]
    async fn create_publish_and_delete() {
        let (channel, _, chain) = setup(Side::Server);
        let ctx = Context::background();
        let conn = chain.process_request(&ctx, request("c1")).await.unwrap();

        let handle = extract_interface_index(&conn).unwrap();
        assert_eq!(handle, InterfaceHandle::new(1));
        assert_eq!(conn.mechanism.as_ref().unwrap().kind, "MEMIF");
        assert_eq!(channel.interfaces(), vec![handle]);

        // refresh reuses the interface
        chain.process_request(&ctx, request("c1")).await.unwrap();
        assert_eq!(channel.count(RequestKind::CreateInterface), 1);

        chain.process_close(&ctx, &conn).await.unwrap();
        assert!(channel.interfaces().is_empty());
    }

    #[tokio::test]
    async fn deleted_when_rest_fails() {
        let (channel, counter, chain) = setup(Side::Client);
        counter.fail_requests(true);
        let err = chain
            .process_request(&Context::background(), request("c1"))
            .await
            .unwrap_err();
        assert_eq!(err.failed_stage(), Some("counter"));
        assert_eq!(channel.count(RequestKind::CreateInterface), 1);
        assert!(channel.interfaces().is_empty());
    }

    #[tokio::test]
    async fn creation_failure() {
        let (channel, counter, chain) = setup(Side::Server);
        channel.reply_with(|r| r.kind() == RequestKind::CreateInterface, -1);
        let err = chain
            .process_request(&Context::background(), request("c1"))
            .await
            .unwrap_err();
        assert_eq!(err.failed_stage(), Some(INTERFACE_STAGE));
        assert_eq!(counter.requests(), 0);
    }

    #[tokio::test]
    async fn mechanism_selection() {
        let (channel, _, chain) = setup(Side::Server);
        let ctx = Context::background();

        let mut req = request("c1");
        req.mechanism_preferences = vec![Mechanism::new("VXLAN"), Mechanism::new("kernel")];
        let conn = chain.process_request(&ctx, req).await.unwrap();
        assert_eq!(conn.mechanism.unwrap().kind, "TAP");

        let mut req = request("c2");
        req.mechanism_preferences = vec![Mechanism::new("VXLAN")];
        let err = chain.process_request(&ctx, req).await.unwrap_err();
        assert!(err.to_string().contains("VXLAN"));
        assert_eq!(channel.count(RequestKind::CreateInterface), 1);
    }

    #[tokio::test]
    async fn close_without_scope_uses_mechanism() {
        let (channel, _, chain) = setup(Side::Server);
        let ctx = Context::background();
        let conn = chain.process_request(&ctx, request("c1")).await.unwrap();

        // a chain that never saw the connection, e.g. after a restart
        let stage = InterfaceStage::new(Side::Server, InterfaceManager::new(channel.clone()));
        let other = Chain::new("other")
            .add_stage("metadata", MetadataStage::new())
            .unwrap()
            .add_stage("interface", stage)
            .unwrap();
        other.process_close(&ctx, &conn).await.unwrap();
        assert!(channel.interfaces().is_empty());
    }
}
