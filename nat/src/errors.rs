// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Errors of the NAT stages

use chain::ChainError;
use chain::metadata::Side;
use dplane::DataplaneError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NatError {
    /// The stage creating the interface of that side did not run before, or did not publish
    /// its handle. This is an ordering defect in the chain, not a transient failure.
    #[error("{0} side interface handle not available")]
    HandleUnavailable(Side),

    #[error("No metadata scope to publish the {0} side interface handle in")]
    NoMetadata(Side),

    #[error("{0} side interface index cannot be 0")]
    ZeroHandle(Side),

    #[error("server side and client side interfaces must have different indexes, got: {0}")]
    SameHandle(u32),

    #[error("Mechanism has no valid {param} parameter")]
    BadMechanism { param: &'static str },

    #[error("Unsupported mechanism: {0}")]
    UnsupportedMechanism(String),

    #[error(transparent)]
    Dataplane(#[from] DataplaneError),
}

impl NatError {
    /// Turn this error into the failure of the given stage
    #[must_use]
    pub fn in_stage(self, stage: &'static str) -> ChainError {
        ChainError::stage(stage, self)
    }
}
