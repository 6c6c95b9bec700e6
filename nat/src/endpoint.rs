// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Composition of the endpoint's two chains.
//!
//! The server chain handles the connection coming from the traffic producer:
//!
//! ```text
//! authorize -> metadata -> interface (server) -> nat-server -> connect
//! ```
//!
//! and its `connect` stage runs the client chain toward the next hop:
//!
//! ```text
//! metadata -> labels -> interface (client) -> nat-client
//! ```
//!
//! The client chain reuses the metadata scope of the server chain, so both NAT stages see
//! both interface handles.

use crate::mechanism::InterfaceStage;
use crate::{NatClient, NatServer};
use chain::metadata::{MetadataStage, Side};
use chain::stages::{Authorize, Connect, Labels};
use chain::{Chain, ChainError, Connection, Context, NetworkServiceRequest};
use config::NatConfig;
use dplane::{ControlChannel, InterfaceManager, NatConfigurator};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// What the endpoint is made of
#[derive(Debug, Clone)]
pub struct EndpointOptions {
    /// endpoint name
    pub name: String,
    /// name of the network service provided
    pub service_name: String,
    /// labels of the endpoint, passed to the next hop
    pub labels: BTreeMap<String, String>,
    /// where the endpoint serves requests
    pub listen_on: String,
    /// peers allowed to request connections; empty means everyone
    pub authorized_peers: Vec<String>,
    /// NAT policy
    pub nat_config: Arc<NatConfig>,
}

/// Registration data of the endpoint, for the mesh registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub name: String,
    pub service_name: String,
    pub labels: BTreeMap<String, String>,
    pub url: String,
}

impl Display for EndpointSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "endpoint {} for service {} at {}",
            self.name, self.service_name, self.url
        )?;
        if !self.labels.is_empty() {
            let labels: Vec<_> = self
                .labels
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, " labels: {}", labels.join(","))?;
        }
        Ok(())
    }
}

/// The NAT network-service endpoint
pub struct NatEndpoint {
    spec: EndpointSpec,
    server: Chain,
}

impl NatEndpoint {
    /// Build the chains of the endpoint. All of them share the same dataplane channel.
    pub fn new(
        options: &EndpointOptions,
        channel: Arc<dyn ControlChannel>,
    ) -> Result<Self, ChainError> {
        let nat = NatConfigurator::new(channel.clone());
        let interfaces = InterfaceManager::new(channel);

        let client = Chain::new("client")
            .add_stage("metadata", MetadataStage::new())?
            .add_stage("labels", Labels::new(options.labels.clone()))?
            .add_stage(
                "interface",
                InterfaceStage::new(Side::Client, interfaces.clone()),
            )?
            .add_stage(
                "nat-client",
                NatClient::new(options.nat_config.clone(), nat.clone()),
            )?;

        let server = Chain::new("server")
            .add_stage(
                "authorize",
                Authorize::allow(options.authorized_peers.iter().cloned()),
            )?
            .add_stage("metadata", MetadataStage::new())?
            .add_stage("interface", InterfaceStage::new(Side::Server, interfaces))?
            .add_stage(
                "nat-server",
                NatServer::new(options.nat_config.clone(), nat),
            )?
            .add_stage("connect", Connect::new(Arc::new(client)))?;

        let spec = EndpointSpec {
            name: options.name.clone(),
            service_name: options.service_name.clone(),
            labels: options.labels.clone(),
            url: options.listen_on.clone(),
        };
        info!(
            "Built {}: server chain {:?}, client chain {:?}",
            spec.name,
            server.stage_names(),
            server
                .get_stage::<Connect>("connect")
                .map(|c| c.client().stage_names())
                .unwrap_or_default()
        );
        Ok(Self { spec, server })
    }

    /// Registration data of this endpoint
    #[must_use]
    pub fn spec(&self) -> &EndpointSpec {
        &self.spec
    }

    /// The server chain
    #[must_use]
    pub fn chain(&self) -> &Chain {
        &self.server
    }

    /// The NAT stage of the server chain
    #[must_use]
    pub fn nat_server(&self) -> Option<&NatServer> {
        self.server.get_stage::<NatServer>("nat-server")
    }

    /// The NAT stage of the client chain
    #[must_use]
    pub fn nat_client(&self) -> Option<&NatClient> {
        self.server
            .get_stage::<Connect>("connect")
            .and_then(|c| c.client().get_stage::<NatClient>("nat-client"))
    }

    /// Establish or refresh a connection
    pub async fn request(
        &self,
        ctx: &Context,
        request: NetworkServiceRequest,
    ) -> Result<Connection, ChainError> {
        self.server.process_request(ctx, request).await
    }

    /// Tear down a connection
    pub async fn close(&self, ctx: &Context, connection: &Connection) -> Result<(), ChainError> {
        self.server.process_close(ctx, connection).await
    }
}
