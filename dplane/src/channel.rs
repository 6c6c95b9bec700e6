// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::{Reply, Request, TransportError};
use async_trait::async_trait;

/// A request/reply channel to the engine. Implementations must be safe to use from
/// many concurrent requests: a single channel is shared by the whole endpoint.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Send a request and wait for its reply. A non-zero status in the reply is NOT an
    /// error at this level; interpreting it is up to the caller.
    async fn invoke(&self, request: Request) -> Result<Reply, TransportError>;
}
