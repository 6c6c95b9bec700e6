// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc)]

//! NAT configuration stages for a network-service endpoint
//!
//! A connection through the endpoint has two interfaces in the dataplane: one toward the
//! traffic producer (the server side, NAT "inside") and one toward the consumer (the client
//! side, NAT "outside"). Each one is created by an [`InterfaceStage`] of its own chain, which
//! publishes the handle with [`ifindex::store`]. The [`NatServer`] and [`NatClient`] stages,
//! placed after them, load the handles and configure the dataplane once per connection.
//!
//! # Limitations
//!
//! - Only NAT44 is supported.
//! - Closing a connection does not remove anything from the dataplane NAT configuration:
//!   sessions expire through the engine's own timeouts.

mod client;
mod endpoint;
mod errors;
pub mod ifindex;
pub mod interfaces;
mod mechanism;
mod server;
mod tracker;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod testing;

pub use client::{NAT_CLIENT_STAGE, NatClient};
pub use endpoint::{EndpointOptions, EndpointSpec, NatEndpoint};
pub use errors::NatError;
pub use interfaces::{InterfacePair, extract_interface_index, verify_interface_mapping};
pub use mechanism::{INTERFACE_STAGE, InterfaceStage};
pub use server::{NAT_SERVER_STAGE, NatServer};
pub use tracker::ConfiguredConnections;
