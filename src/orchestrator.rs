// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the hydrobridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! The cycle loop and its lifecycle
//!
//! [`CycleOrchestrator`] drives everything: it owns the field link and the
//! simulation, and moves through four phases:
//!
//! - **Starting**: connect to the field controller (retrying until it
//!   appears), check that the network fits the wire layout, initialize the
//!   engine for continuous analysis.
//! - **Running**: one cycle per pacing interval: pull the control blocks,
//!   decode them, apply all pipe statuses then all pump settings, solve one
//!   hydraulic step, read the telemetry, write it back. Any failure in a
//!   cycle is fatal for the run; skipping a cycle with stale controls would
//!   silently desynchronize the model from the controller's intent.
//! - **Draining**: always runs, whatever phase preceded it: close the link,
//!   release the engine. Best-effort; teardown failures are logged and never
//!   escalated.
//! - **Stopped**: terminal.
//!
//! A shutdown request (ctrl-c) is observed at cycle boundaries only; no
//! operation is aborted mid-flight.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};
use thiserror::Error;
use tokio::time::sleep;

use crate::config::{Config, ConfigError};
use crate::link::{ConnectOutcome, FieldLink, LinkError};
use crate::registers::{
    ControlFrame, TelemetryFrame, PIPE_STATUS_COIL_BASE, PIPE_STATUS_SLOTS,
    PUMP_SETTING_REGISTER_BASE, PUMP_SETTING_SLOTS, TELEMETRY_PAIR_SLOTS,
};
use crate::simulation::{AssetClass, AssetIndex, SimulationAdapter, SimulationError};

/// Lifecycle phase of the bridge process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Starting => "starting",
            Phase::Running => "running",
            Phase::Draining => "draining",
            Phase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Any fatal condition of a run. Connect failures never appear here (they
/// are retried inside the link); everything else raised during a cycle does.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

/// Owns the link and the simulation and runs the bridge to completion.
pub struct CycleOrchestrator {
    config: Config,
    link: FieldLink,
    sim: SimulationAdapter,
    shutdown: Arc<AtomicBool>,
    phase: Phase,
    // Canonical index orders, copied out of the adapter once so the cycle
    // body can iterate them while mutating the simulation.
    junctions: Vec<AssetIndex>,
    tanks: Vec<AssetIndex>,
    pipes: Vec<AssetIndex>,
    pumps: Vec<AssetIndex>,
    cycles: u64,
}

impl CycleOrchestrator {
    pub fn new(config: Config, sim: SimulationAdapter, shutdown: Arc<AtomicBool>) -> Self {
        let link = FieldLink::new(config.endpoint(), config.connect_backoff());
        let junctions = sim.asset_indices(AssetClass::Junction).to_vec();
        let tanks = sim.asset_indices(AssetClass::Tank).to_vec();
        let pipes = sim.asset_indices(AssetClass::Pipe).to_vec();
        let pumps = sim.asset_indices(AssetClass::Pump).to_vec();
        Self {
            config,
            link,
            sim,
            shutdown,
            phase: Phase::Starting,
            junctions,
            tanks,
            pipes,
            pumps,
            cycles: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Cycles completed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run the bridge until the user interrupts it or a fatal error occurs.
    ///
    /// Returns `Ok(())` only for a user-initiated shutdown; every other way
    /// out of the loop is an error. Draining runs in both cases.
    pub async fn run(&mut self) -> Result<(), RunError> {
        let result = match self.start().await {
            Ok(ConnectOutcome::Cancelled) => {
                info!("shutdown requested before the field link came up");
                Ok(())
            }
            Ok(ConnectOutcome::Connected) => self.run_cycles().await,
            Err(e) => Err(e),
        };
        self.drain().await;
        self.transition(Phase::Stopped);
        result
    }

    async fn start(&mut self) -> Result<ConnectOutcome, RunError> {
        self.transition(Phase::Starting);
        self.validate_layout()?;
        info!(
            "waiting for field controller at {}",
            self.config.endpoint()
        );
        if self.link.connect(&self.shutdown).await == ConnectOutcome::Cancelled {
            return Ok(ConnectOutcome::Cancelled);
        }
        self.sim.begin_continuous_analysis()?;
        Ok(ConnectOutcome::Connected)
    }

    async fn run_cycles(&mut self) -> Result<(), RunError> {
        self.transition(Phase::Running);
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("shutdown requested, stopping after {} cycles", self.cycles);
                return Ok(());
            }
            self.cycle().await?;
            self.cycles += 1;
            sleep(self.config.cycle_interval()).await;
        }
    }

    /// One full cycle: controls in, one hydraulic step, telemetry out.
    async fn cycle(&mut self) -> Result<(), RunError> {
        let coils = self
            .link
            .read_coils(PIPE_STATUS_COIL_BASE, PIPE_STATUS_SLOTS)
            .await?;
        let words = self
            .link
            .read_holding_registers(PUMP_SETTING_REGISTER_BASE, PUMP_SETTING_SLOTS)
            .await?;
        let controls = self.decode_controls(&coils, &words)?;

        // All pipe statuses first, then all pump settings; both land on the
        // same next step, the fixed order keeps runs reproducible.
        for (&index, &open) in self.pipes.iter().zip(&controls.pipe_statuses) {
            self.sim.set_pipe_status(index, open)?;
        }
        for (&index, &setting) in self.pumps.iter().zip(&controls.pump_settings) {
            self.sim.set_pump_setting(index, setting)?;
        }

        self.sim.step()?;

        let mut telemetry = TelemetryFrame::default();
        for &index in &self.junctions {
            telemetry.junction_pressures.push(self.sim.read_pressure(index)?);
        }
        for &index in &self.tanks {
            telemetry.tank_heads.push(self.sim.read_head(index)?);
        }
        for &index in &self.pumps {
            telemetry.pump_flows.push(self.sim.read_flow(index)?);
        }

        for (base, block) in telemetry.register_blocks() {
            if !block.is_empty() {
                self.link.write_registers(base, &block).await?;
            }
        }

        debug!("cycle {} complete", self.cycles + 1);
        Ok(())
    }

    fn decode_controls(&self, coils: &[bool], words: &[u16]) -> Result<ControlFrame, LinkError> {
        ControlFrame::decode(coils, words, self.pipes.len(), self.pumps.len()).ok_or_else(|| {
            if coils.len() < self.pipes.len() {
                LinkError::ShortResponse {
                    expected: self.pipes.len(),
                    got: coils.len(),
                }
            } else {
                LinkError::ShortResponse {
                    expected: self.pumps.len(),
                    got: words.len(),
                }
            }
        })
    }

    /// The register layout is static; refuse to start when the network
    /// would not fit it.
    fn validate_layout(&self) -> Result<(), ConfigError> {
        let pump_limit = PUMP_SETTING_SLOTS.min(TELEMETRY_PAIR_SLOTS);
        let checks = [
            ("pipes", self.pipes.len(), PIPE_STATUS_SLOTS as usize),
            ("pumps", self.pumps.len(), pump_limit as usize),
            ("junctions", self.junctions.len(), TELEMETRY_PAIR_SLOTS as usize),
            ("tanks", self.tanks.len(), TELEMETRY_PAIR_SLOTS as usize),
        ];
        for (class, count, limit) in checks {
            if count > limit {
                return Err(ConfigError::CapacityExceeded {
                    class,
                    count,
                    limit,
                });
            }
        }
        Ok(())
    }

    async fn drain(&mut self) {
        self.transition(Phase::Draining);
        self.link.close().await;
        self.sim.end_continuous_analysis();
    }

    fn transition(&mut self, next: Phase) {
        debug!("phase {} -> {}", self.phase, next);
        self.phase = next;
    }
}
