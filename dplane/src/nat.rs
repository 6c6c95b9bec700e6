// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! NAT44 configuration operations

use crate::api::retval;
use crate::{ControlChannel, DataplaneError, InterfaceHandle, NatRole, Reply, Request};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// Issues NAT44 configuration calls to the engine.
///
/// Every operation maps to exactly one control-plane call. A non-zero status becomes a
/// [`DataplaneError::Retval`], except "value exists", which means that an earlier call (for
/// instance, a failed attempt being retried) already did the work. This makes all operations
/// safe to repeat.
#[derive(Clone)]
pub struct NatConfigurator {
    channel: Arc<dyn ControlChannel>,
}

impl NatConfigurator {
    #[must_use]
    pub fn new(channel: Arc<dyn ControlChannel>) -> Self {
        Self { channel }
    }

    async fn call(
        &self,
        op: &'static str,
        arg: String,
        request: Request,
    ) -> Result<Reply, DataplaneError> {
        let reply = match self.channel.invoke(request).await {
            Ok(reply) => reply,
            Err(source) => {
                error!("{op}({arg}) failed: {source}");
                return Err(DataplaneError::Transport { op, arg, source });
            }
        };
        match reply.retval {
            retval::OK => Ok(reply),
            retval::VALUE_EXIST => {
                debug!("{op}({arg}): already configured");
                Ok(reply)
            }
            retval => {
                error!("{op}({arg}): engine returned error code {retval}");
                Err(DataplaneError::Retval { op, arg, retval })
            }
        }
    }

    async fn set_role(&self, handle: InterfaceHandle, role: NatRole) -> Result<(), DataplaneError> {
        let op = match role {
            NatRole::Inside => "mark_inside",
            NatRole::Outside => "mark_outside",
        };
        let request = Request::InterfaceFeature {
            is_add: true,
            handle,
            role,
        };
        self.call(op, handle.to_string(), request).await?;
        info!("Marked interface {handle} as NAT {role}");
        Ok(())
    }

    /// Mark an interface as facing the protected, internal side
    pub async fn mark_inside(&self, handle: InterfaceHandle) -> Result<(), DataplaneError> {
        self.set_role(handle, NatRole::Inside).await
    }

    /// Mark an interface as facing the external side
    pub async fn mark_outside(&self, handle: InterfaceHandle) -> Result<(), DataplaneError> {
        self.set_role(handle, NatRole::Outside).await
    }

    /// Add a single address to the translation pool. The address is checked before any
    /// call is made: it must parse and be IPv4.
    pub async fn add_address_pool(&self, nat_ip: &str) -> Result<(), DataplaneError> {
        let addr: Ipv4Addr = match nat_ip.parse::<IpAddr>() {
            Ok(IpAddr::V4(addr)) => addr,
            Ok(IpAddr::V6(_)) => return Err(DataplaneError::NotIpv4(nat_ip.to_owned())),
            Err(_) => return Err(DataplaneError::InvalidAddress(nat_ip.to_owned())),
        };
        let request = Request::AddressRange {
            is_add: true,
            first: addr,
            last: addr,
            vrf_id: 0,
        };
        self.call("add_address_pool", nat_ip.to_owned(), request)
            .await?;
        info!("Added {addr} to the NAT address pool");
        Ok(())
    }

    /// Restrict the ports used for translation. Bounds are checked before any call is made.
    /// The engine keeps its own default range if this fails.
    pub async fn configure_port_range(&self, start: u16, end: u16) -> Result<(), DataplaneError> {
        if start == 0 || end == 0 || start > end {
            return Err(DataplaneError::InvalidPortRange { start, end });
        }
        self.call(
            "configure_port_range",
            format!("{start}-{end}"),
            Request::PortRange { start, end },
        )
        .await?;
        info!("Set NAT port range to {start}-{end}");
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod test {
    use super::*;
    use crate::RequestKind;
    use crate::testing::RecordingChannel;
    use pretty_assertions::assert_eq;

    fn configurator() -> (Arc<RecordingChannel>, NatConfigurator) {
        let channel = Arc::new(RecordingChannel::new());
        (channel.clone(), NatConfigurator::new(channel))
    }

    #[tokio::test]
    async fn mark_interfaces() {
        let (channel, nat) = configurator();
        nat.mark_inside(InterfaceHandle::new(1)).await.unwrap();
        nat.mark_outside(InterfaceHandle::new(2)).await.unwrap();
        assert_eq!(
            channel.requests(),
            vec![
                Request::InterfaceFeature {
                    is_add: true,
                    handle: InterfaceHandle::new(1),
                    role: NatRole::Inside
                },
                Request::InterfaceFeature {
                    is_add: true,
                    handle: InterfaceHandle::new(2),
                    role: NatRole::Outside
                },
            ]
        );
    }

    #[tokio::test]
    async fn engine_error_names_operation() {
        let (channel, nat) = configurator();
        channel.reply_with(|r| r.kind() == RequestKind::InterfaceFeature, -2);
        let err = nat.mark_outside(InterfaceHandle::new(5)).await.unwrap_err();
        assert_eq!(err.retval(), Some(-2));
        let msg = err.to_string();
        assert!(msg.contains("mark_outside"));
        assert!(msg.contains('5'));
    }

    #[tokio::test]
    async fn value_exists_is_success() {
        let (channel, nat) = configurator();
        channel.reply_with(|r| r.kind() == RequestKind::AddressRange, retval::VALUE_EXIST);
        nat.add_address_pool("203.0.113.10").await.unwrap();
        nat.add_address_pool("203.0.113.10").await.unwrap();
        assert_eq!(channel.count(RequestKind::AddressRange), 2);
    }

    #[tokio::test]
    async fn address_pool_rejects_bad_input_without_calling() {
        let (channel, nat) = configurator();
        assert!(matches!(
            nat.add_address_pool("2001:db8::1").await,
            Err(DataplaneError::NotIpv4(_))
        ));
        assert!(matches!(
            nat.add_address_pool("203.0.113").await,
            Err(DataplaneError::InvalidAddress(_))
        ));
        assert!(channel.requests().is_empty());

        nat.add_address_pool("203.0.113.10").await.unwrap();
        let first = Ipv4Addr::new(203, 0, 113, 10);
        assert_eq!(
            channel.requests(),
            vec![Request::AddressRange {
                is_add: true,
                first,
                last: first,
                vrf_id: 0
            }]
        );
    }

    #[tokio::test]
    async fn port_range_bounds() {
        let (channel, nat) = configurator();
        assert!(nat.configure_port_range(0, 100).await.is_err());
        assert!(nat.configure_port_range(2000, 1000).await.is_err());
        assert!(channel.requests().is_empty());

        nat.configure_port_range(1024, 65535).await.unwrap();
        assert_eq!(
            channel.requests(),
            vec![Request::PortRange {
                start: 1024,
                end: 65535
            }]
        );
    }

    #[tokio::test]
    async fn transport_failure() {
        let (channel, nat) = configurator();
        channel.disconnect();
        let err = nat.mark_inside(InterfaceHandle::new(1)).await.unwrap_err();
        assert!(matches!(
            err,
            DataplaneError::Transport {
                op: "mark_inside",
                ..
            }
        ));
    }
}
