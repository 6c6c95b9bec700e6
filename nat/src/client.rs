// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! NAT stage of the client chain: marks the consumer-facing interface as NAT outside and
//! makes sure the NAT IP is in the translation pool.

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

/// Name under which [`NatClient`] reports its failures
pub const NAT_CLIENT_STAGE: &str = "nat-client";

pub struct NatClient {
    config: Arc<NatConfig>,
    nat: NatConfigurator,
    configured: ConfiguredConnections,
}

impl NatClient {
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

    async fn configure(&self, ctx: &Context) -> Result<(), NatError> {
        let client = ifindex::load(ctx, Side::Client)
            .ok_or(NatError::HandleUnavailable(Side::Client))?;
        if !client.is_valid() {
            return Err(NatError::ZeroHandle(Side::Client));
        }

        self.nat.mark_outside(client).await?;
        // repeated for every new connection, in case the engine lost its pool
        self.nat.add_address_pool(&self.config.nat_ip).await?;

        if let Some(range) = self.config.port_range {
            if let Err(e) = self.nat.configure_port_range(range.start, range.end).await {
                warn!("Could not set NAT port range {range}, the engine keeps its default: {e}");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkService for NatClient {
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

        if let Err(e) = self.configure(ctx).await {
            error!("Failed to configure NAT for connection {}: {e}", conn.id);
            let e = e.in_stage(NAT_CLIENT_STAGE);
            return Err(close_on_failure(&postponed, &conn, next, e).await);
        }

        self.configured.mark(&conn.id);
        info!(
            "NAT configured for connection {} (client side), translating to {}",
            conn.id, self.config.nat_ip
        );
        Ok(conn)
    }

    async fn close(
        &self,
        ctx: &Context,
        connection: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        if self.configured.remove(&connection.id) {
            debug!("Forgetting NAT configuration of connection {} (client side)", connection.id);
        }
        next.close(ctx, connection).await
    }
}
