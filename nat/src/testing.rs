// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Test helpers

use crate::ifindex;
use async_trait::async_trait;
use chain::metadata::Side;
use chain::{
    ChainError, Connection, Context, Mechanism, NetworkService, NetworkServiceRequest, Next,
};
use config::{NatConfig, SnatRule};
use dplane::InterfaceHandle;

/// The policy of the reference scenario: `203.0.113.10` for `10.0.0.0/8`
pub(crate) fn nat_config() -> NatConfig {
    let mut config = NatConfig {
        name: "nat".to_owned(),
        nat_ip: "203.0.113.10".to_owned(),
        snat_rules: vec![SnatRule::new("10.0.0.0/8")],
        ..NatConfig::default()
    };
    config.apply_defaults();
    config
}

pub(crate) fn request(id: &str) -> NetworkServiceRequest {
    NetworkServiceRequest::new(Connection::new(id, "nat"), vec![Mechanism::new("MEMIF")])
}

/// Publishes fixed interface handles, standing in for the stages creating the interfaces
pub(crate) struct Handles {
    server: Option<u32>,
    client: Option<u32>,
}

impl Handles {
    pub(crate) fn both(server: u32, client: u32) -> Self {
        Self {
            server: Some(server),
            client: Some(client),
        }
    }
    pub(crate) fn server(server: u32) -> Self {
        Self {
            server: Some(server),
            client: None,
        }
    }
    pub(crate) fn client(client: u32) -> Self {
        Self {
            server: None,
            client: Some(client),
        }
    }
    pub(crate) fn none() -> Self {
        Self {
            server: None,
            client: None,
        }
    }
}

#[async_trait]
impl NetworkService for Handles {
    async fn request(
        &self,
        ctx: &Context,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        for (side, index) in [(Side::Server, self.server), (Side::Client, self.client)] {
            if let Some(index) = index {
                ifindex::store(ctx, side, InterfaceHandle::new(index))
                    .map_err(|e| e.in_stage("handles"))?;
            }
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
