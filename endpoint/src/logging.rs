// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Logging setup, with a log level that can be changed after startup

use tracing::error;
use tracing_subscriber::{EnvFilter, Registry, filter::LevelFilter, prelude::*, reload};

#[derive(Debug)]
pub(crate) struct LogControl {
    level: LevelFilter,
    reload_filter: reload::Handle<EnvFilter, Registry>,
}

fn env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy("")
}

impl LogControl {
    /// Install the global subscriber. Fails if one is already installed.
    pub(crate) fn init(level: LevelFilter) -> Result<Self, String> {
        let (filter, reload_filter) = reload::Layer::new(env_filter(level));

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(true)
            .with_level(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| format!("Failed to initialize tracing subscriber: {e}"))?;

        Ok(Self {
            level,
            reload_filter,
        })
    }

    pub(crate) fn set_level(&mut self, level: LevelFilter) {
        if self.level == level {
            return;
        }
        if let Err(e) = self.reload_filter.reload(env_filter(level)) {
            error!("Failed to reload tracing filter: {e}");
            return;
        }
        self.level = level;
    }

    pub(crate) fn level(&self) -> LevelFilter {
        self.level
    }
}
