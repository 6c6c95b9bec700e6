// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Process configuration, from the command line or the environment

pub(crate) use clap::Parser;
use config::{LoadError, NatConfig};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Error)]
pub(crate) enum ArgsError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Invalid log level '{0}'")]
    BadLogLevel(String),
    #[error("Failed to load NAT config: {0}")]
    NatConfig(#[from] LoadError),
}

/// Endpoint labels, as `key=value` pairs separated by commas
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Labels(pub(crate) BTreeMap<String, String>);

impl FromStr for Labels {
    type Err = String;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut labels = BTreeMap::new();
        for item in input.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let Some((key, value)) = item.split_once('=') else {
                return Err(format!("Invalid label '{item}': it should be key=value"));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("Invalid label '{item}': empty key"));
            }
            labels.insert(key.to_owned(), value.trim().to_owned());
        }
        Ok(Labels(labels))
    }
}

#[derive(Parser, Debug)]
#[command(name = "nat-endpoint")]
#[command(version)]
#[command(about = "Network-service endpoint configuring NAT44 in the dataplane", long_about = None)]
pub(crate) struct CmdArgs {
    #[arg(long, env = "NSM_NAME", default_value = "nat-server")]
    name: String,
    #[arg(long, env = "NSM_LISTEN_ON", default_value = "listen.on.sock")]
    listen_on: String,
    #[arg(
        long,
        env = "NSM_CONNECT_TO",
        default_value = "unix:///var/lib/networkservicemesh/nsm.io.sock"
    )]
    connect_to: String,
    #[arg(long, env = "NSM_MAX_TOKEN_LIFETIME", default_value = "10m", value_parser = humantime::parse_duration)]
    max_token_lifetime: Duration,
    #[arg(long, env = "NSM_SERVICE_NAME", default_value = "")]
    service_name: String,
    #[arg(long, env = "NSM_LABELS", default_value = "")]
    labels: Labels,
    #[arg(long, env = "NSM_NAT_CONFIG_PATH", default_value = "/etc/nat/config.yaml")]
    nat_config_path: PathBuf,
    #[arg(long, env = "NSM_LOG_LEVEL", default_value = "INFO")]
    log_level: String,
    #[arg(long, env = "NSM_DATAPLANE_SOCKET", default_value = "/var/run/vpp/api.sock")]
    dataplane_socket: String,
    #[arg(long, env = "NSM_DATAPLANE_TIMEOUT", default_value = "5s", value_parser = humantime::parse_duration)]
    dataplane_timeout: Duration,
    #[arg(long, env = "NSM_AUTHORIZED_PEERS", value_delimiter = ',')]
    authorized_peers: Vec<String>,
}

/// Map a level name to a filter. Accepts the names used by other mesh components too.
pub(crate) fn parse_log_level(level: &str) -> Result<LevelFilter, ArgsError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "error" | "fatal" | "panic" => Ok(LevelFilter::ERROR),
        "off" => Ok(LevelFilter::OFF),
        _ => Err(ArgsError::BadLogLevel(level.to_owned())),
    }
}

/// The configuration of the process
#[derive(Debug)]
pub(crate) struct Config {
    pub(crate) name: String,
    pub(crate) listen_on: String,
    pub(crate) connect_to: String,
    pub(crate) max_token_lifetime: Duration,
    pub(crate) service_name: String,
    pub(crate) labels: BTreeMap<String, String>,
    pub(crate) nat_config_path: PathBuf,
    pub(crate) nat_config: Option<Arc<NatConfig>>,
    pub(crate) log_level: LevelFilter,
    pub(crate) dataplane_socket: String,
    pub(crate) dataplane_timeout: Duration,
    pub(crate) authorized_peers: Vec<String>,
}

impl TryFrom<CmdArgs> for Config {
    type Error = ArgsError;
    fn try_from(args: CmdArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            name: args.name,
            listen_on: args.listen_on,
            connect_to: args.connect_to,
            max_token_lifetime: args.max_token_lifetime,
            service_name: args.service_name,
            labels: args.labels.0,
            nat_config_path: args.nat_config_path,
            nat_config: None,
            log_level: parse_log_level(&args.log_level)?,
            dataplane_socket: args.dataplane_socket,
            dataplane_timeout: args.dataplane_timeout,
            authorized_peers: args
                .authorized_peers
                .into_iter()
                .map(|p| p.trim().to_owned())
                .filter(|p| !p.is_empty())
                .collect(),
        })
    }
}

impl Config {
    /// Load and validate the NAT policy file
    pub(crate) fn load_nat_config(&mut self) -> Result<Arc<NatConfig>, ArgsError> {
        let nat_config = Arc::new(NatConfig::load(&self.nat_config_path)?);
        self.nat_config = Some(nat_config.clone());
        Ok(nat_config)
    }

    pub(crate) fn validate(&self) -> Result<(), ArgsError> {
        if self.name.is_empty() {
            return Err(ArgsError::Missing("name"));
        }
        if self.service_name.is_empty() {
            return Err(ArgsError::Missing("service name"));
        }
        if self.connect_to.is_empty() {
            return Err(ArgsError::Missing("connect-to URL"));
        }
        if self.nat_config.is_none() {
            return Err(ArgsError::Missing("NAT configuration"));
        }
        Ok(())
    }
}
