// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Loading of the NAT configuration document

use crate::errors::LoadError;
use crate::nat::NatConfig;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming the NAT configuration file
pub const NAT_CONFIG_PATH_ENV: &str = "NAT_CONFIG_PATH";

impl NatConfig {
    /// Parse a YAML document and fill in defaults. The result is NOT validated.
    pub fn from_yaml(text: &str) -> Result<Self, LoadError> {
        let mut config: NatConfig = serde_yaml_ng::from_str(text)?;
        config.apply_defaults();
        Ok(config)
    }

    /// Read and parse the configuration file at `path`, filling in defaults.
    /// The result is NOT validated.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        debug!("Reading NAT config from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Read, parse, default and validate the configuration file at `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let config = Self::parse_file(path.as_ref())?;
        config.validate()?;
        info!(
            "Loaded NAT config {config} from {}",
            path.as_ref().display()
        );
        Ok(config)
    }

    /// Like [`NatConfig::load`], with the path taken from `NAT_CONFIG_PATH`
    pub fn load_from_env() -> Result<Self, LoadError> {
        let path = std::env::var_os(NAT_CONFIG_PATH_ENV)
            .filter(|p| !p.is_empty())
            .ok_or(LoadError::MissingEnv(NAT_CONFIG_PATH_ENV))?;
        Self::load(path)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod test {
    use super::*;
    use crate::errors::ConfigError;
    use crate::nat::{DnatRule, L4Protocol, NatTimeouts, PortRange, SnatRule};
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tracing_test::traced_test;

    const FULL: &str = r#"
name: nat-gw
labels:
  app: nat
natIP: 203.0.113.10
portRange:
  start: 2000
  end: 3000
snatRules:
  - srcNet: 10.0.0.0/8
  - srcNet: 192.168.0.0/16
dnatRules:
  - externalIP: 203.0.113.10
    externalPort: 443
    internalIP: 10.0.0.5
    internalPort: 8443
    protocol: TCP
timeouts:
  tcpEstablished: 3600
  udp: 120
"#;

    const MINIMAL: &str = r"
name: nat-gw
natIP: 203.0.113.10
snatRules:
  - srcNet: 10.0.0.0/8
";

    fn config_file(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn parse_full_document() {
        let config = NatConfig::from_yaml(FULL).unwrap();
        assert_eq!(config.name, "nat-gw");
        assert_eq!(config.labels.get("app").map(String::as_str), Some("nat"));
        assert_eq!(config.nat_ip, "203.0.113.10");
        assert_eq!(config.port_range, Some(PortRange::new(2000, 3000)));
        assert_eq!(
            config.snat_rules,
            vec![SnatRule::new("10.0.0.0/8"), SnatRule::new("192.168.0.0/16")]
        );
        assert_eq!(
            config.dnat_rules,
            vec![DnatRule::new("TCP", "203.0.113.10", 443, "10.0.0.5", 8443)]
        );
        assert_eq!(config.dnat_rules[0].protocol(), Some(L4Protocol::Tcp));
        assert_eq!(
            config.timeouts,
            Some(NatTimeouts {
                tcp_established: Some(3600),
                tcp_transitory: Some(240),
                udp: Some(120),
                icmp: Some(60),
            })
        );
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn parse_applies_defaults() {
        let config = NatConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.port_range, Some(PortRange::new(1024, 65535)));
        assert_eq!(config.timeouts, Some(NatTimeouts::defaults()));
        assert!(config.dnat_rules.is_empty());
        assert!(config.labels.is_empty());
    }

    #[test]
    fn parse_partial_port_range() {
        let text = format!("{MINIMAL}portRange:\n  start: 5000\n");
        let config = NatConfig::from_yaml(&text).unwrap();
        assert_eq!(config.port_range, Some(PortRange::new(5000, 65535)));
    }

    #[test]
    fn parse_rejects_malformed_yaml() {
        let err = NatConfig::from_yaml("name: [unterminated").unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));

        let err = NatConfig::from_yaml("portRange:\n  start: 70000\n").unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }

    #[traced_test]
    #[test]
    fn load_valid_file() {
        let file = config_file(FULL);
        let config = NatConfig::load(file.path()).unwrap();
        assert_eq!(config.name, "nat-gw");
        assert!(logs_contain("Loaded NAT config"));
    }

    #[test]
    fn load_rejects_invalid_file() {
        let file = config_file("name: nat-gw\nnatIP: 203.0.113.10\n");
        let err = NatConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::Invalid(ConfigError::NoSnatRules)));
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = NatConfig::load(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
        assert!(err.to_string().contains("absent.yaml"));
    }

    #[test]
    #[serial]
    #[allow(unsafe_code)] // SAFETY: tests touching the environment are serialized
    fn load_from_env() {
        let file = config_file(MINIMAL);
        unsafe { std::env::set_var(NAT_CONFIG_PATH_ENV, file.path()) };
        let config = NatConfig::load_from_env().unwrap();
        assert_eq!(config.nat_ip_addr(), Some("203.0.113.10".parse().unwrap()));

        unsafe { std::env::remove_var(NAT_CONFIG_PATH_ENV) };
        let err = NatConfig::load_from_env().unwrap_err();
        assert!(matches!(err, LoadError::MissingEnv(NAT_CONFIG_PATH_ENV)));
    }
}
