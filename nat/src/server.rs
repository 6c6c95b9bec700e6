// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! NAT stage of the server chain: marks the producer-facing interface as NAT inside.

use crate::interfaces::InterfacePair;
use crate::tracker::ConfiguredConnections;
use crate::{NatError, ifindex};
use async_trait::async_trait;
use chain::metadata::Side;
use chain::{
    ChainError, Connection, Context, NetworkService, NetworkServiceRequest, Next,
    close_on_failure,
};
use config::NatConfig;
use dplane::NatConfigurator;
use std::sync::Arc;
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// Name under which [`NatServer`] reports its failures
pub const NAT_SERVER_STAGE: &str = "nat-server";

pub struct NatServer {
    config: Arc<NatConfig>,
    nat: NatConfigurator,
    configured: ConfiguredConnections,
}

impl NatServer {
    #[must_use]
    pub fn new(config: Arc<NatConfig>, nat: NatConfigurator) -> Self {
        Self {
            config,
            nat,
            configured: ConfiguredConnections::new(),
        }
    }

    /// The connections configured by this stage
    #[must_use]
    pub fn configured(&self) -> &ConfiguredConnections {
        &self.configured
    }

    async fn configure(&self, ctx: &Context, conn: &Connection) -> Result<(), NatError> {
        let server = ifindex::load(ctx, Side::Server)
            .ok_or(NatError::HandleUnavailable(Side::Server))?;
        match ifindex::load(ctx, Side::Client) {
            Some(client) => {
                let pair = InterfacePair::new(server, client);
                pair.validate()?;
                debug!("Connection {}: {pair}", conn.id);
            }
            None if !server.is_valid() => return Err(NatError::ZeroHandle(Side::Server)),
            None => debug!("Connection {}: no client side interface yet", conn.id),
        }

        self.nat.mark_inside(server).await?;

        for (n, rule) in self.config.snat_rules.iter().enumerate() {
            info!("SNAT rule {}: {} -> {}", n + 1, rule.src_net, self.config.nat_ip);
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkService for NatServer {
    async fn request(
        &self,
        ctx: &Context,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        let postponed = ctx.postpone();
        let conn = next.request(ctx, request).await?;

        if self.configured.contains(&conn.id) {
            debug!("NAT already configured for connection {}", conn.id);
            return Ok(conn);
        }

        if let Err(e) = self.configure(ctx, &conn).await {
            error!("Failed to configure NAT for connection {}: {e}", conn.id);
            let e = e.in_stage(NAT_SERVER_STAGE);
            return Err(close_on_failure(&postponed, &conn, next, e).await);
        }

        self.configured.mark(&conn.id);
        info!("NAT configured for connection {} (server side)", conn.id);
        Ok(conn)
    }

    async fn close(
        &self,
        ctx: &Context,
        connection: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        if self.configured.remove(&connection.id) {
            debug!("Forgetting NAT configuration of connection {} (server side)", connection.id);
        }
        next.close(ctx, connection).await
    }
}
