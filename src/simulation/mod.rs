// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the hydrobridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated plant side of the bridge
//!
//! [`SimulationAdapter`] exposes the hydraulic engine as an index-addressed
//! state container: enumerate the assets of each class, set the next step's
//! control inputs, advance one hydraulic step, read the resulting
//! measurements. The engine itself sits behind the [`HydraulicEngine`] trait
//! so that a real solver binding and the shipped [`SyntheticEngine`] are
//! interchangeable.

pub mod engine;
pub mod synthetic;

use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::config::ConfigError;

pub use engine::HydraulicEngine;
pub use synthetic::SyntheticEngine;

/// Engine-assigned identifier of one asset within the loaded network.
/// Opaque to the bridge; stable while the network stays loaded.
pub type AssetIndex = i32;

/// The asset classes of a water network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetClass {
    Junction,
    Reservoir,
    Tank,
    Pipe,
    Pump,
    Valve,
}

impl AssetClass {
    pub const ALL: [AssetClass; 6] = [
        AssetClass::Junction,
        AssetClass::Reservoir,
        AssetClass::Tank,
        AssetClass::Pipe,
        AssetClass::Pump,
        AssetClass::Valve,
    ];

    /// Plural label used in diagnostics and the startup overview.
    pub fn plural(self) -> &'static str {
        match self {
            AssetClass::Junction => "junctions",
            AssetClass::Reservoir => "reservoirs",
            AssetClass::Tank => "tanks",
            AssetClass::Pipe => "pipes",
            AssetClass::Pump => "pumps",
            AssetClass::Valve => "valves",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}

/// Failures reported by the engine or by the adapter's own guards.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("no {class} with engine index {index}")]
    UnknownIndex { class: AssetClass, index: AssetIndex },

    #[error("control value {value} rejected for {class} index {index}")]
    InvalidControl {
        class: AssetClass,
        index: AssetIndex,
        value: f64,
    },

    #[error("hydraulic solver failed to converge at step {step}")]
    NotConverged { step: u64 },

    #[error("hydraulic analysis is not initialized")]
    NotInitialized,

    #[error("telemetry requested before the first hydraulic step")]
    NotStepped,
}

/// Owns the engine and the canonical asset orderings derived from it.
///
/// All engine state is mutated exclusively through this adapter, from the
/// orchestrator's single thread of control.
pub struct SimulationAdapter {
    engine: Box<dyn HydraulicEngine>,
    junctions: Vec<AssetIndex>,
    reservoirs: Vec<AssetIndex>,
    tanks: Vec<AssetIndex>,
    pipes: Vec<AssetIndex>,
    pumps: Vec<AssetIndex>,
    valves: Vec<AssetIndex>,
    analysis_open: bool,
    stepped: bool,
}

impl SimulationAdapter {
    /// Wrap an already-loaded engine, caching the canonical index order of
    /// every asset class.
    pub fn new(engine: Box<dyn HydraulicEngine>) -> Self {
        let junctions = engine.indices(AssetClass::Junction);
        let reservoirs = engine.indices(AssetClass::Reservoir);
        let tanks = engine.indices(AssetClass::Tank);
        let pipes = engine.indices(AssetClass::Pipe);
        let pumps = engine.indices(AssetClass::Pump);
        let valves = engine.indices(AssetClass::Valve);
        Self {
            engine,
            junctions,
            reservoirs,
            tanks,
            pipes,
            pumps,
            valves,
            analysis_open: false,
            stepped: false,
        }
    }

    /// Load a network file into the shipped engine.
    pub fn load(path: &Path, hydraulic_step_seconds: u64) -> Result<Self, ConfigError> {
        let engine = SyntheticEngine::from_inp(path, hydraulic_step_seconds)?;
        Ok(Self::new(Box::new(engine)))
    }

    /// Canonical index order for `class`; control and telemetry frames
    /// follow it.
    pub fn asset_indices(&self, class: AssetClass) -> &[AssetIndex] {
        match class {
            AssetClass::Junction => &self.junctions,
            AssetClass::Reservoir => &self.reservoirs,
            AssetClass::Tank => &self.tanks,
            AssetClass::Pipe => &self.pipes,
            AssetClass::Pump => &self.pumps,
            AssetClass::Valve => &self.valves,
        }
    }

    pub fn asset_count(&self, class: AssetClass) -> usize {
        self.asset_indices(class).len()
    }

    pub fn set_pipe_status(
        &mut self,
        index: AssetIndex,
        open: bool,
    ) -> Result<(), SimulationError> {
        self.engine.set_pipe_status(index, open)
    }

    pub fn set_pump_setting(
        &mut self,
        index: AssetIndex,
        setting: f64,
    ) -> Result<(), SimulationError> {
        self.engine.set_pump_setting(index, setting)
    }

    /// Initialize the engine for an open-ended sequence of hydraulic steps.
    /// Must be paired with [`end_continuous_analysis`] on shutdown.
    ///
    /// [`end_continuous_analysis`]: Self::end_continuous_analysis
    pub fn begin_continuous_analysis(&mut self) -> Result<(), SimulationError> {
        self.engine.open_analysis()?;
        self.analysis_open = true;
        Ok(())
    }

    /// Advance the simulation by exactly one hydraulic step.
    pub fn step(&mut self) -> Result<(), SimulationError> {
        if !self.analysis_open {
            return Err(SimulationError::NotInitialized);
        }
        self.engine.solve_step()?;
        self.stepped = true;
        Ok(())
    }

    pub fn read_pressure(&self, index: AssetIndex) -> Result<f64, SimulationError> {
        self.ensure_stepped()?;
        self.engine.pressure(index)
    }

    pub fn read_head(&self, index: AssetIndex) -> Result<f64, SimulationError> {
        self.ensure_stepped()?;
        self.engine.head(index)
    }

    pub fn read_flow(&self, index: AssetIndex) -> Result<f64, SimulationError> {
        self.ensure_stepped()?;
        self.engine.flow(index)
    }

    /// Release engine resources. Idempotent; later calls are no-ops.
    pub fn end_continuous_analysis(&mut self) {
        if self.analysis_open {
            self.engine.close_analysis();
            self.analysis_open = false;
        }
    }

    fn ensure_stepped(&self) -> Result<(), SimulationError> {
        if self.stepped {
            Ok(())
        } else {
            Err(SimulationError::NotStepped)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Minimal engine that counts lifecycle calls.
    struct CountingEngine {
        closes: Arc<AtomicUsize>,
    }

    impl HydraulicEngine for CountingEngine {
        fn indices(&self, class: AssetClass) -> Vec<AssetIndex> {
            match class {
                AssetClass::Junction => vec![1],
                _ => Vec::new(),
            }
        }

        fn set_pipe_status(&mut self, index: AssetIndex, _: bool) -> Result<(), SimulationError> {
            Err(SimulationError::UnknownIndex {
                class: AssetClass::Pipe,
                index,
            })
        }

        fn set_pump_setting(&mut self, index: AssetIndex, _: f64) -> Result<(), SimulationError> {
            Err(SimulationError::UnknownIndex {
                class: AssetClass::Pump,
                index,
            })
        }

        fn open_analysis(&mut self) -> Result<(), SimulationError> {
            Ok(())
        }

        fn solve_step(&mut self) -> Result<(), SimulationError> {
            Ok(())
        }

        fn pressure(&self, _: AssetIndex) -> Result<f64, SimulationError> {
            Ok(42.0)
        }

        fn head(&self, _: AssetIndex) -> Result<f64, SimulationError> {
            Ok(0.0)
        }

        fn flow(&self, _: AssetIndex) -> Result<f64, SimulationError> {
            Ok(0.0)
        }

        fn close_analysis(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn adapter(closes: &Arc<AtomicUsize>) -> SimulationAdapter {
        SimulationAdapter::new(Box::new(CountingEngine {
            closes: closes.clone(),
        }))
    }

    #[test]
    fn telemetry_before_the_first_step_is_an_error() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut sim = adapter(&closes);
        sim.begin_continuous_analysis().unwrap();
        assert!(matches!(sim.read_pressure(1), Err(SimulationError::NotStepped)));
        sim.step().unwrap();
        assert_eq!(sim.read_pressure(1).unwrap(), 42.0);
    }

    #[test]
    fn step_before_begin_is_an_error() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut sim = adapter(&closes);
        assert!(matches!(sim.step(), Err(SimulationError::NotInitialized)));
    }

    #[test]
    fn end_continuous_analysis_is_idempotent() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut sim = adapter(&closes);
        sim.begin_continuous_analysis().unwrap();
        sim.end_continuous_analysis();
        sim.end_continuous_analysis();
        sim.end_continuous_analysis();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn end_without_begin_never_touches_the_engine() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut sim = adapter(&closes);
        sim.end_continuous_analysis();
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn index_order_is_cached_at_construction() {
        let closes = Arc::new(AtomicUsize::new(0));
        let sim = adapter(&closes);
        assert_eq!(sim.asset_indices(AssetClass::Junction), &[1]);
        assert_eq!(sim.asset_count(AssetClass::Pump), 0);
    }
}
