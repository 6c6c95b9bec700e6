// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Checks on the pair of interfaces of a connection

use crate::NatError;
use chain::Connection;
use chain::metadata::Side;
use dplane::InterfaceHandle;
use std::fmt::Display;

/// Mechanism parameter carrying the engine's handle of the connection's interface
pub const SW_IF_INDEX_PARAM: &str = "vpp_sw_if_index";

/// Check that the server (inside) and client (outside) interfaces of a connection can be
/// configured: both handles must be non-zero, and distinct.
pub fn verify_interface_mapping(
    server: InterfaceHandle,
    client: InterfaceHandle,
) -> Result<(), NatError> {
    if !server.is_valid() {
        return Err(NatError::ZeroHandle(Side::Server));
    }
    if !client.is_valid() {
        return Err(NatError::ZeroHandle(Side::Client));
    }
    if server == client {
        return Err(NatError::SameHandle(server.index()));
    }
    Ok(())
}

/// The two interfaces of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfacePair {
    /// producer-facing, NAT inside
    pub server: InterfaceHandle,
    /// consumer-facing, NAT outside
    pub client: InterfaceHandle,
}

impl InterfacePair {
    #[must_use]
    pub fn new(server: InterfaceHandle, client: InterfaceHandle) -> Self {
        Self { server, client }
    }

    pub fn validate(&self) -> Result<(), NatError> {
        verify_interface_mapping(self.server, self.client)
    }
}

impl Display for InterfacePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "InterfacePair{{server(inside): {}, client(outside): {}}}",
            self.server, self.client
        )
    }
}

/// Read the interface handle from the mechanism parameters of a connection
pub fn extract_interface_index(connection: &Connection) -> Result<InterfaceHandle, NatError> {
    let bad = NatError::BadMechanism {
        param: SW_IF_INDEX_PARAM,
    };
    let Some(mechanism) = &connection.mechanism else {
        return Err(bad);
    };
    mechanism
        .parameters
        .get(SW_IF_INDEX_PARAM)
        .and_then(|index| index.trim().parse::<u32>().ok())
        .map(InterfaceHandle::new)
        .ok_or(bad)
}
