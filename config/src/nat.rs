// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! NAT policy objects, as found in the configuration document.
//!
//! Addresses and protocols are kept as text, exactly as written by the operator, so that
//! validation can report the offending value. Typed accessors are provided for consumers
//! that run after validation.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::net::Ipv4Addr;

pub(crate) const DEFAULT_PORT_START: u16 = 1024;
pub(crate) const DEFAULT_PORT_END: u16 = 65535;

pub(crate) const DEFAULT_TCP_ESTABLISHED: u32 = 7440;
pub(crate) const DEFAULT_TCP_TRANSITORY: u32 = 240;
pub(crate) const DEFAULT_UDP: u32 = 300;
pub(crate) const DEFAULT_ICMP: u32 = 60;

/// The NAT policy applied by the endpoint. Loaded once, immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, rename = "natIP")]
    pub nat_ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range: Option<PortRange>,
    #[serde(default)]
    pub snat_rules: Vec<SnatRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dnat_rules: Vec<DnatRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<NatTimeouts>,
}

/// Range of ports to use for source NAT. A bound missing in the document takes its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    #[serde(default = "default_port_start")]
    pub start: u16,
    #[serde(default = "default_port_end")]
    pub end: u16,
}

fn default_port_start() -> u16 {
    DEFAULT_PORT_START
}

fn default_port_end() -> u16 {
    DEFAULT_PORT_END
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: DEFAULT_PORT_START,
            end: DEFAULT_PORT_END,
        }
    }
}

impl PortRange {
    #[must_use]
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// Number of ports in the range; zero if the range is inverted.
    #[must_use]
    pub fn available_ports(&self) -> u32 {
        (u32::from(self.end) + 1).saturating_sub(u32::from(self.start))
    }
}

impl Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A source network whose traffic gets translated to the NAT IP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnatRule {
    #[serde(default)]
    pub src_net: String,
}

impl SnatRule {
    #[must_use]
    pub fn new(src_net: &str) -> Self {
        Self {
            src_net: src_net.to_owned(),
        }
    }

    /// The source network, if it parses as an IPv4 CIDR.
    #[must_use]
    pub fn network(&self) -> Option<Ipv4Net> {
        self.src_net.parse().ok()
    }
}

/// Transport protocols a static DNAT mapping may apply to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum L4Protocol {
    Tcp,
    Udp,
}

impl L4Protocol {
    /// Parse a protocol name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "tcp" => Some(L4Protocol::Tcp),
            "udp" => Some(L4Protocol::Udp),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            L4Protocol::Tcp => "tcp",
            L4Protocol::Udp => "udp",
        }
    }
}

impl Display for L4Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A static destination NAT mapping: `externalIP:externalPort` -> `internalIP:internalPort`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnatRule {
    #[serde(default, rename = "externalIP")]
    pub external_ip: String,
    #[serde(default)]
    pub external_port: u16,
    #[serde(default, rename = "internalIP")]
    pub internal_ip: String,
    #[serde(default)]
    pub internal_port: u16,
    #[serde(default)]
    pub protocol: String,
}

impl DnatRule {
    #[must_use]
    pub fn new(
        protocol: &str,
        external_ip: &str,
        external_port: u16,
        internal_ip: &str,
        internal_port: u16,
    ) -> Self {
        Self {
            external_ip: external_ip.to_owned(),
            external_port,
            internal_ip: internal_ip.to_owned(),
            internal_port,
            protocol: protocol.to_owned(),
        }
    }

    #[must_use]
    pub fn protocol(&self) -> Option<L4Protocol> {
        L4Protocol::from_name(&self.protocol)
    }
}

impl Display for DnatRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}:{} -> {}:{}",
            self.protocol.to_ascii_lowercase(),
            self.external_ip,
            self.external_port,
            self.internal_ip,
            self.internal_port
        )
    }
}

/// Session timeouts, in seconds. Each one is defaulted independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatTimeouts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_established: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_transitory: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icmp: Option<u32>,
}

impl NatTimeouts {
    /// The timeouts used for any value left unspecified
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            tcp_established: Some(DEFAULT_TCP_ESTABLISHED),
            tcp_transitory: Some(DEFAULT_TCP_TRANSITORY),
            udp: Some(DEFAULT_UDP),
            icmp: Some(DEFAULT_ICMP),
        }
    }

    fn fill_absent(&mut self) {
        let defaults = Self::defaults();
        self.tcp_established = self.tcp_established.or(defaults.tcp_established);
        self.tcp_transitory = self.tcp_transitory.or(defaults.tcp_transitory);
        self.udp = self.udp.or(defaults.udp);
        self.icmp = self.icmp.or(defaults.icmp);
    }
}

impl NatConfig {
    /// Fill in the fields the document left out. Values explicitly set are never modified.
    pub fn apply_defaults(&mut self) {
        if self.port_range.is_none() {
            self.port_range = Some(PortRange::default());
        }
        match self.timeouts.as_mut() {
            None => self.timeouts = Some(NatTimeouts::defaults()),
            Some(timeouts) => timeouts.fill_absent(),
        }
    }

    /// The NAT IP, if it parses as an IPv4 address.
    #[must_use]
    pub fn nat_ip_addr(&self) -> Option<Ipv4Addr> {
        self.nat_ip.parse().ok()
    }
}

impl Display for NatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: natIP={} snatRules={} dnatRules={}",
            self.name,
            self.nat_ip,
            self.snat_rules.len(),
            self.dnat_rules.len()
        )?;
        if let Some(range) = &self.port_range {
            write!(f, " ports={range}")?;
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn port_range_size() {
        assert_eq!(PortRange::default().available_ports(), 64512);
        assert_eq!(PortRange::new(1000, 1000).available_ports(), 1);
        assert_eq!(PortRange::new(2000, 1000).available_ports(), 0);
    }

    #[test]
    fn defaults_preserve_explicit_values() {
        let mut config = NatConfig {
            port_range: Some(PortRange::new(2000, 3000)),
            timeouts: Some(NatTimeouts {
                udp: Some(120),
                ..NatTimeouts::default()
            }),
            ..NatConfig::default()
        };
        config.apply_defaults();

        assert_eq!(config.port_range, Some(PortRange::new(2000, 3000)));
        let timeouts = config.timeouts.unwrap();
        assert_eq!(timeouts.udp, Some(120));
        assert_eq!(timeouts.tcp_established, Some(7440));
        assert_eq!(timeouts.tcp_transitory, Some(240));
        assert_eq!(timeouts.icmp, Some(60));
    }

    #[test]
    fn protocol_names_are_case_insensitive() {
        assert_eq!(L4Protocol::from_name("TCP"), Some(L4Protocol::Tcp));
        assert_eq!(L4Protocol::from_name("Udp"), Some(L4Protocol::Udp));
        assert_eq!(L4Protocol::from_name("icmp"), None);
    }
}
