// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the hydrobridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Seam to the hydraulic solver
//!
//! The bridge never touches solver internals; everything it needs from the
//! engine is the index-addressed surface below. [`SyntheticEngine`] is the
//! implementation shipped with the bridge; a binding to a real solver
//! implements the same trait.
//!
//! [`SyntheticEngine`]: super::synthetic::SyntheticEngine

use super::{AssetClass, AssetIndex, SimulationError};

/// Index-addressed view of a loaded water network.
///
/// Indices are assigned by the engine when the network is loaded and stay
/// stable for its lifetime. `indices` defines the canonical per-class
/// ordering; control and telemetry frames follow it.
pub trait HydraulicEngine: Send {
    /// Engine indices of every asset of `class`, in canonical order.
    fn indices(&self, class: AssetClass) -> Vec<AssetIndex>;

    /// Set a pipe's open/closed status for the next solved step.
    fn set_pipe_status(&mut self, index: AssetIndex, open: bool) -> Result<(), SimulationError>;

    /// Set a pump's relative speed for the next solved step.
    fn set_pump_setting(&mut self, index: AssetIndex, setting: f64)
        -> Result<(), SimulationError>;

    /// Initialize an open-ended sequence of hydraulic steps.
    fn open_analysis(&mut self) -> Result<(), SimulationError>;

    /// Advance simulated time by one hydraulic step, extending the run
    /// horizon by one step before solving so the sequence never ends on its
    /// own.
    fn solve_step(&mut self) -> Result<(), SimulationError>;

    /// Pressure at a junction, from the most recently solved step.
    fn pressure(&self, index: AssetIndex) -> Result<f64, SimulationError>;

    /// Hydraulic head of a tank, from the most recently solved step.
    fn head(&self, index: AssetIndex) -> Result<f64, SimulationError>;

    /// Flow through a pump, from the most recently solved step.
    fn flow(&self, index: AssetIndex) -> Result<f64, SimulationError>;

    /// Release solver resources. Called at most once per `open_analysis`.
    fn close_analysis(&mut self);
}
