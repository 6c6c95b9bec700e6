// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::service::Next;
use crate::{
    Chain, ChainError, Connection, ConnectionId, Context, NetworkService, NetworkServiceRequest,
};
use dashmap::DashMap;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// Adds a fixed set of labels to every requested connection. Labels already set on the
/// connection are kept.
pub struct Labels {
    labels: BTreeMap<String, String>,
}

impl Labels {
    /// A stage adding `labels`
    #[must_use]
    pub fn new(labels: BTreeMap<String, String>) -> Self {
        Self { labels }
    }
}

#[async_trait]
impl NetworkService for Labels {
    async fn request(
        &self,
        ctx: &Context,
        mut request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        for (key, value) in &self.labels {
            request
                .connection
                .labels
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        next.request(ctx, request).await
    }

    async fn close(
        &self,
        ctx: &Context,
        connection: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        next.close(ctx, connection).await
    }
}

/// Only lets through calls from authorized peers, as found in the context.
pub struct Authorize {
    peers: Option<BTreeSet<String>>,
}

impl Authorize {
    /// Let every call through, whether or not the peer is known
    #[must_use]
    pub fn allow_all() -> Self {
        Self { peers: None }
    }

    /// Only let through calls from the given peers. An empty list lets every call through.
    #[must_use]
    pub fn allow<I, S>(peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let peers: BTreeSet<String> = peers.into_iter().map(Into::into).collect();
        Self {
            peers: (!peers.is_empty()).then_some(peers),
        }
    }

    fn check(&self, ctx: &Context) -> Result<(), ChainError> {
        let Some(peers) = &self.peers else {
            return Ok(());
        };
        match ctx.peer() {
            Some(peer) if peers.contains(peer) => Ok(()),
            Some(peer) => Err(ChainError::Unauthorized(peer.to_owned())),
            None => Err(ChainError::Unauthorized("(unknown)".to_owned())),
        }
    }
}

#[async_trait]
impl NetworkService for Authorize {
    async fn request(
        &self,
        ctx: &Context,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        self.check(ctx)?;
        next.request(ctx, request).await
    }

    async fn close(
        &self,
        ctx: &Context,
        connection: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        self.check(ctx)?;
        next.close(ctx, connection).await
    }
}

/// Opens the connection toward the next hop through a client chain, then hands the request
/// to the stages after it. If those fail, the client side is closed again.
pub struct Connect {
    client: Arc<Chain>,
    connections: DashMap<ConnectionId, Connection>,
}

impl Connect {
    /// A stage running `client` for every connection
    #[must_use]
    pub fn new(client: Arc<Chain>) -> Self {
        Self {
            client,
            connections: DashMap::new(),
        }
    }

    /// The client chain
    #[must_use]
    pub fn client(&self) -> &Chain {
        &self.client
    }

    /// The client side of a connection, as last established
    #[must_use]
    pub fn client_connection(&self, id: &ConnectionId) -> Option<Connection> {
        self.connections.get(id).map(|c| c.value().clone())
    }
}

#[async_trait]
impl NetworkService for Connect {
    async fn request(
        &self,
        ctx: &Context,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        let postponed = ctx.postpone();
        let client_request = NetworkServiceRequest::new(
            request.connection.clone(),
            request.mechanism_preferences.clone(),
        );
        let client_conn = self.client.process_request(ctx, client_request).await?;
        debug!(
            "Client side of connection {} established through {}",
            client_conn.id,
            self.client.name()
        );

        match next.request(ctx, request).await {
            Ok(conn) => {
                self.connections.insert(client_conn.id.clone(), client_conn);
                Ok(conn)
            }
            Err(e) => {
                let cleanup = self
                    .client
                    .process_close(&postponed.context(), &client_conn)
                    .await;
                self.connections.remove(&client_conn.id);
                Err(e.with_cleanup(cleanup))
            }
        }
    }

    async fn close(
        &self,
        ctx: &Context,
        connection: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        // without a record, the client side gets the connection stripped of the server
        // side's mechanism, which describes nothing of its own
        let client_conn = self.connections.remove(&connection.id).map_or_else(
            || Connection {
                mechanism: None,
                ..connection.clone()
            },
            |(_, c)| c,
        );
        let client = self.client.process_close(ctx, &client_conn).await;
        if let Err(e) = &client {
            warn!("Failed to close client side of connection {}: {e}", connection.id);
        }
        next.close(ctx, connection).await?;
        client
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod test {
    use super::*;
    use crate::Mechanism;
    use crate::testing::Counter;
    use pretty_assertions::assert_eq;

    fn request(id: &str) -> NetworkServiceRequest {
        NetworkServiceRequest::new(Connection::new(id, "nat"), vec![Mechanism::new("MEMIF")])
    }

    #[tokio::test]
    async fn labels_are_added_not_overwritten() {
        let labels = BTreeMap::from([
            ("app".to_owned(), "nat".to_owned()),
            ("zone".to_owned(), "a".to_owned()),
        ]);
        let chain = Chain::new("test")
            .add_stage("labels", Labels::new(labels))
            .unwrap();
        let mut req = request("c1");
        req.connection
            .labels
            .insert("zone".to_owned(), "b".to_owned());

        let conn = chain
            .process_request(&Context::background(), req)
            .await
            .unwrap();
        assert_eq!(
            conn.labels,
            BTreeMap::from([
                ("app".to_owned(), "nat".to_owned()),
                ("zone".to_owned(), "b".to_owned()),
            ])
        );
    }

    #[tokio::test]
    async fn authorize_peers() {
        let counter = Arc::new(Counter::default());
        let chain = Chain::new("test")
            .add_stage("authorize", Authorize::allow(["spiffe://example.org/nsc"]))
            .unwrap()
            .add_stage("count", counter.clone())
            .unwrap();

        let ok = Context::background().with_peer("spiffe://example.org/nsc");
        let conn = chain.process_request(&ok, request("c1")).await.unwrap();

        let other = Context::background().with_peer("spiffe://example.org/other");
        let err = chain.process_request(&other, request("c2")).await.unwrap_err();
        assert!(matches!(err, ChainError::Unauthorized(peer) if peer.ends_with("other")));
        let err = chain
            .process_request(&Context::background(), request("c3"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Unauthorized(_)));
        assert!(chain.process_close(&other, &conn).await.is_err());

        assert_eq!(counter.requests(), 1);
        assert_eq!(counter.closes(), 0);
    }

    #[tokio::test]
    async fn allow_empty_list_lets_everyone_in() {
        let chain = Chain::new("test")
            .add_stage("authorize", Authorize::allow(Vec::<String>::new()))
            .unwrap();
        assert!(
            chain
                .process_request(&Context::background(), request("c1"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn connect_runs_client_chain_first() {
        let client_counter = Arc::new(Counter::default());
        let client = Chain::new("client")
            .add_stage("count", client_counter.clone())
            .unwrap();
        let server_counter = Arc::new(Counter::default());
        let server = Chain::new("server")
            .add_stage("connect", Connect::new(Arc::new(client)))
            .unwrap()
            .add_stage("count", server_counter.clone())
            .unwrap();

        let ctx = Context::background();
        let conn = server.process_request(&ctx, request("c1")).await.unwrap();
        assert_eq!(client_counter.requests_for(&ConnectionId::new("c1")), 1);
        assert_eq!(server_counter.requests(), 1);
        let connect = server.get_stage::<Connect>("connect").unwrap();
        assert_eq!(connect.client().stage_names(), vec!["count"]);
        assert!(connect.client_connection(&conn.id).is_some());

        server.process_close(&ctx, &conn).await.unwrap();
        assert!(connect.client_connection(&conn.id).is_none());
        assert_eq!(client_counter.closes(), 1);
        assert_eq!(server_counter.closes(), 1);
    }

    #[tokio::test]
    async fn connect_closes_client_when_rest_fails() {
        let client_counter = Arc::new(Counter::default());
        let client = Chain::new("client")
            .add_stage("count", client_counter.clone())
            .unwrap();
        let server_counter = Arc::new(Counter::default());
        server_counter.fail_requests(true);
        let server = Chain::new("server")
            .add_stage("connect", Connect::new(Arc::new(client)))
            .unwrap()
            .add_stage("count", server_counter.clone())
            .unwrap();

        let err = server
            .process_request(&Context::background(), request("c1"))
            .await
            .unwrap_err();
        assert_eq!(err.failed_stage(), Some("counter"));
        assert_eq!(client_counter.requests(), 1);
        assert_eq!(client_counter.closes(), 1);
    }

    #[tokio::test]
    async fn connect_fails_if_client_fails() {
        let client_counter = Arc::new(Counter::default());
        client_counter.fail_requests(true);
        let client = Chain::new("client")
            .add_stage("count", client_counter.clone())
            .unwrap();
        let server_counter = Arc::new(Counter::default());
        let server = Chain::new("server")
            .add_stage("connect", Connect::new(Arc::new(client)))
            .unwrap()
            .add_stage("count", server_counter.clone())
            .unwrap();

        assert!(
            server
                .process_request(&Context::background(), request("c1"))
                .await
                .is_err()
        );
        assert_eq!(server_counter.requests(), 0);
        assert_eq!(client_counter.closes(), 0);
    }
}
