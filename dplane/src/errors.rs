// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Dataplane errors

use thiserror::Error;

/// Failures to exchange a message with the engine
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to connect to dataplane at {path}: {source}")]
    ConnectFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timeout: did not receive response in time")]
    TimeOut,

    #[error("Peer left")]
    PeerLeft,

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decoding error: {0}")]
    DecodeError(&'static str),

    #[error("Encoding error: {0}")]
    EncodeError(&'static str),

    #[error("Unexpected reply: expected message id {expected}, got {got}")]
    UnexpectedReply { expected: u16, got: u16 },

    #[error("Control channel is closed")]
    Closed,
}

/// Failures of a dataplane operation. Each one names the operation and its argument.
#[derive(Error, Debug)]
pub enum DataplaneError {
    #[error("{op}({arg}): control-plane call failed: {source}")]
    Transport {
        op: &'static str,
        arg: String,
        #[source]
        source: TransportError,
    },

    #[error("{op}({arg}): engine returned error code {retval}")]
    Retval {
        op: &'static str,
        arg: String,
        retval: i32,
    },

    #[error("Invalid IP address format: {0}")]
    InvalidAddress(String),

    #[error("NAT IP must be an IPv4 address: {0}")]
    NotIpv4(String),

    #[error("Invalid port range {start}-{end}: ports must be 1-65535 and start <= end")]
    InvalidPortRange { start: u16, end: u16 },

    #[error("Engine returned an invalid interface handle for {0}")]
    InvalidHandle(String),
}

impl DataplaneError {
    /// The status code returned by the engine, if that is what failed
    #[must_use]
    pub fn retval(&self) -> Option<i32> {
        match self {
            DataplaneError::Retval { retval, .. } => Some(*retval),
            _ => None,
        }
    }
}
