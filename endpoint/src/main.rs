// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

mod args;
mod logging;

use crate::args::{CmdArgs, Config, Parser};
use crate::logging::LogControl;

use dplane::SocketChannel;
use nat::{EndpointOptions, NatEndpoint};

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};

async fn run(config: &Config, started: Instant, stop: &CancellationToken) -> Result<(), String> {
    let Some(nat_config) = config.nat_config.clone() else {
        return Err("NAT configuration not loaded".to_owned());
    };

    info!("Phase 2: connecting to the dataplane at {}", config.dataplane_socket);
    let channel = SocketChannel::connect(&config.dataplane_socket, config.dataplane_timeout)
        .await
        .map_err(|e| format!("Failed to connect to the dataplane: {e}"))?;

    info!("Phase 3: building the endpoint chains");
    let options = EndpointOptions {
        name: config.name.clone(),
        service_name: config.service_name.clone(),
        labels: config.labels.clone(),
        listen_on: config.listen_on.clone(),
        authorized_peers: config.authorized_peers.clone(),
        nat_config,
    };
    let endpoint = NatEndpoint::new(&options, Arc::new(channel))
        .map_err(|e| format!("Failed to build the endpoint: {e}"))?;

    info!("Phase 4: endpoint ready: {}", endpoint.spec());
    info!(
        "Mesh manager at {}, token lifetime {}",
        config.connect_to,
        humantime::format_duration(config.max_token_lifetime)
    );
    info!("Startup completed in {:?}", started.elapsed());

    stop.cancelled().await;
    info!("Shutting down {}", endpoint.spec().name);
    Ok(())
}

fn main() -> ExitCode {
    let started = Instant::now();
    let args = CmdArgs::parse();

    let mut logs = match LogControl::init(LevelFilter::INFO) {
        Ok(logs) => logs,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    info!("Starting NAT endpoint...");
    info!("Startup phases: 1: get config, 2: connect to dataplane, 3: build chains, 4: ready");

    info!("Phase 1: loading configuration");
    let mut config = match Config::try_from(args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = config.load_nat_config().and_then(|_| config.validate()) {
        error!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }
    logs.set_level(config.log_level);
    info!("Log level set to {}", logs.level());
    info!("Configuration: {config:?}");
    if let Some(nat_config) = &config.nat_config {
        info!("NAT configuration {nat_config}");
    }

    let stop = CancellationToken::new();
    let stopper = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || stopper.cancel()) {
        error!("Failed to set signal handler: {e}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("nat-endpoint")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(&config, started, &stop));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
