// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Types for configuration loading / validation failures.
//! Any result returned by the validation methods in this crate is a `ConfigError`.
//! Loading adds I/O and parsing failures on top, reported as `LoadError`.

use std::path::PathBuf;
use thiserror::Error;

/// The reasons why we may reject a NAT configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("field '{0}' is required")]
    MissingField(&'static str),
    #[error("field 'snatRules' must contain at least one rule")]
    NoSnatRules,
    #[error("field '{field}' has invalid IP address format: {value}")]
    InvalidIpAddress { field: String, value: String },
    #[error("field '{field}' must be an IPv4 address: {value}")]
    NotIpv4 { field: String, value: String },
    #[error("{field} must be between 1 and 65535, got: {value}")]
    PortOutOfRange { field: String, value: u16 },
    #[error("portRange.start ({start}) must be <= portRange.end ({end})")]
    InvertedPortRange { start: u16, end: u16 },
    #[error("snatRules[{0}].srcNet is required")]
    MissingSrcNet(usize),
    #[error("snatRules[{index}].srcNet has invalid CIDR format '{value}': {reason}")]
    InvalidCidr {
        index: usize,
        value: String,
        reason: String,
    },
    #[error("dnatRules[{index}].protocol must be 'tcp' or 'udp', got: '{value}'")]
    InvalidProtocol { index: usize, value: String },
    #[error("dnatRules[{index}]: duplicate DNAT mapping for {ip}:{port} (protocol: {protocol})")]
    DuplicateDnatMapping {
        index: usize,
        protocol: String,
        ip: String,
        port: u16,
    },
    #[error("timeouts.{field} should be >= {min} seconds, got: {value}")]
    TimeoutTooShort {
        field: &'static str,
        min: u32,
        value: u32,
    },
}

/// Result-like type for validations
pub type ConfigResult = Result<(), ConfigError>;

/// Failures to obtain a usable configuration from a file or the environment
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("failed to read NAT config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse NAT config YAML: {0}")]
    Parse(#[from] serde_yaml_ng::Error),
    #[error("invalid NAT configuration: {0}")]
    Invalid(#[from] ConfigError),
}
