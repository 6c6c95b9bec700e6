// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Control-plane binding to the packet-processing engine.
//!
//! The engine is driven through a narrow request/reply [`ControlChannel`]. On top of it,
//! [`NatConfigurator`] exposes the NAT44 operations needed by the endpoint (interface roles,
//! address pool, port range) and [`InterfaceManager`] the creation and removal of interfaces.
//! Both are thin, stateless facades: they can be shared and used concurrently as long as the
//! channel is.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc)]

mod api;
mod channel;
mod codec;
mod errors;
mod handle;
mod interface;
mod nat;
mod socket;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::{InterfaceKind, NatRole, Reply, Request, RequestKind, retval};
pub use channel::ControlChannel;
pub use codec::{FrameHeader, decode_reply, decode_request, encode_reply, encode_request};
pub use errors::{DataplaneError, TransportError};
pub use handle::InterfaceHandle;
pub use interface::InterfaceManager;
pub use nat::NatConfigurator;
pub use socket::SocketChannel;
