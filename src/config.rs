// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the hydrobridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Runtime configuration for the bridge
//!
//! The bridge runs on a physically isolated bench network with a well-known
//! field controller endpoint, so the defaults below are the deployment values
//! and the only mandatory input is the network file given on the command
//! line. The structure still derives serde so a harness can construct or
//! override it programmatically.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while setting up the bridge, before the first cycle runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The network file could not be read at all.
    #[error("cannot read network file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was readable but contained no recognizable asset sections.
    #[error("network file {path} defines no assets")]
    EmptyNetwork { path: PathBuf },

    /// The loaded network does not fit the fixed register layout.
    #[error("{count} {class} exceed the {limit} wire slots reserved for them")]
    CapacityExceeded {
        class: &'static str,
        count: usize,
        limit: usize,
    },
}

/// Settings for one bridge process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host name of the field controller.
    #[serde(default = "default_endpoint_host")]
    pub endpoint_host: String,

    /// Modbus TCP port of the field controller.
    #[serde(default = "default_endpoint_port")]
    pub endpoint_port: u16,

    /// Delay between connection attempts while the endpoint is unreachable.
    #[serde(default = "default_interval_ms")]
    pub connect_backoff_ms: u64,

    /// Wall-clock pacing of the cycle loop.
    #[serde(default = "default_interval_ms")]
    pub cycle_interval_ms: u64,

    /// Simulated time advanced by one hydraulic step. Shares its default
    /// with `cycle_interval_ms` but the two are independent: one paces the
    /// loop in real time, the other sizes the solver's time step.
    #[serde(default = "default_step_seconds")]
    pub hydraulic_step_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint_host: default_endpoint_host(),
            endpoint_port: default_endpoint_port(),
            connect_backoff_ms: default_interval_ms(),
            cycle_interval_ms: default_interval_ms(),
            hydraulic_step_seconds: default_step_seconds(),
        }
    }
}

impl Config {
    /// `host:port` form used for connecting and in diagnostics.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.endpoint_host, self.endpoint_port)
    }

    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }
}

fn default_endpoint_host() -> String {
    "openplc".to_string()
}

fn default_endpoint_port() -> u16 {
    502
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_step_seconds() -> u64 {
    1
}
