// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! NAT policy model for the endpoint. The policy is read once at startup from a YAML document,
//! completed with defaults and validated as a whole: a single structural error rejects it.
//! Defaulting and validation are separate steps, so that a [`NatConfig`] assembled in memory
//! can be validated without going through the parser.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

pub mod errors;
pub mod nat;
pub mod parser;
pub mod validate;

pub use errors::{ConfigError, ConfigResult, LoadError}; // re-export
pub use nat::{DnatRule, L4Protocol, NatConfig, NatTimeouts, PortRange, SnatRule}; // re-export
pub use parser::NAT_CONFIG_PATH_ENV; // re-export
