// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Structural validation of a [`NatConfig`].
//!
//! Checks run in a fixed order (required fields, NAT IP, port range, SNAT rules, DNAT rules,
//! timeouts) and stop at the first failure. Nothing is corrected along the way.

use crate::errors::{ConfigError, ConfigResult};
use crate::nat::{DnatRule, NatConfig, NatTimeouts, PortRange, SnatRule};
use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

const MIN_TCP_ESTABLISHED: u32 = 60;
const MIN_TCP_TRANSITORY: u32 = 30;
const MIN_UDP: u32 = 30;
const MIN_ICMP: u32 = 10;

fn validate_ipv4(value: &str, field: impl Into<String>) -> Result<Ipv4Addr, ConfigError> {
    match value.parse::<IpAddr>() {
        Ok(IpAddr::V4(addr)) => Ok(addr),
        Ok(IpAddr::V6(_)) => Err(ConfigError::NotIpv4 {
            field: field.into(),
            value: value.to_owned(),
        }),
        Err(_) => Err(ConfigError::InvalidIpAddress {
            field: field.into(),
            value: value.to_owned(),
        }),
    }
}

fn validate_port(value: u16, field: impl Into<String>) -> ConfigResult {
    if value == 0 {
        return Err(ConfigError::PortOutOfRange {
            field: field.into(),
            value,
        });
    }
    Ok(())
}

impl PortRange {
    pub fn validate(&self) -> ConfigResult {
        validate_port(self.start, "portRange.start")?;
        validate_port(self.end, "portRange.end")?;
        if self.start > self.end {
            return Err(ConfigError::InvertedPortRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

impl SnatRule {
    fn validate(&self, index: usize) -> ConfigResult {
        if self.src_net.is_empty() {
            return Err(ConfigError::MissingSrcNet(index));
        }
        self.src_net
            .parse::<Ipv4Net>()
            .map_err(|e| ConfigError::InvalidCidr {
                index,
                value: self.src_net.clone(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

impl DnatRule {
    fn validate(&self, index: usize) -> ConfigResult {
        validate_ipv4(&self.external_ip, format!("dnatRules[{index}].externalIP"))?;
        validate_ipv4(&self.internal_ip, format!("dnatRules[{index}].internalIP"))?;
        validate_port(
            self.external_port,
            format!("dnatRules[{index}].externalPort"),
        )?;
        validate_port(
            self.internal_port,
            format!("dnatRules[{index}].internalPort"),
        )?;
        if self.protocol().is_none() {
            return Err(ConfigError::InvalidProtocol {
                index,
                value: self.protocol.clone(),
            });
        }
        Ok(())
    }
}

impl NatTimeouts {
    pub fn validate(&self) -> ConfigResult {
        let checks = [
            ("tcpEstablished", self.tcp_established, MIN_TCP_ESTABLISHED),
            ("tcpTransitory", self.tcp_transitory, MIN_TCP_TRANSITORY),
            ("udp", self.udp, MIN_UDP),
            ("icmp", self.icmp, MIN_ICMP),
        ];
        for (field, value, min) in checks {
            if let Some(value) = value
                && value < min
            {
                return Err(ConfigError::TimeoutTooShort { field, min, value });
            }
        }
        Ok(())
    }
}

fn validate_required(config: &NatConfig) -> ConfigResult {
    if config.name.is_empty() {
        return Err(ConfigError::MissingField("name"));
    }
    if config.nat_ip.is_empty() {
        return Err(ConfigError::MissingField("natIP"));
    }
    if config.snat_rules.is_empty() {
        return Err(ConfigError::NoSnatRules);
    }
    Ok(())
}

fn validate_dnat_rules(rules: &[DnatRule]) -> ConfigResult {
    let mut external = HashSet::with_capacity(rules.len());
    for (index, rule) in rules.iter().enumerate() {
        rule.validate(index)?;
        let key = (rule.protocol(), rule.external_ip.as_str(), rule.external_port);
        if !external.insert(key) {
            return Err(ConfigError::DuplicateDnatMapping {
                index,
                protocol: rule.protocol.clone(),
                ip: rule.external_ip.clone(),
                port: rule.external_port,
            });
        }
    }
    Ok(())
}

impl NatConfig {
    /// Validate this configuration. This is side-effect free and can be called on configs
    /// built programmatically as well as on loaded ones.
    pub fn validate(&self) -> ConfigResult {
        validate_required(self)?;
        validate_ipv4(&self.nat_ip, "natIP")?;
        if let Some(range) = &self.port_range {
            range.validate()?;
        }
        for (index, rule) in self.snat_rules.iter().enumerate() {
            rule.validate(index)?;
        }
        validate_dnat_rules(&self.dnat_rules)?;
        if let Some(timeouts) = &self.timeouts {
            timeouts.validate()?;
        }
        Ok(())
    }
}
