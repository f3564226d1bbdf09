// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the hydrobridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Deterministic stand-in for the hydraulic solver
//!
//! `SyntheticEngine` reads the asset inventory from an EPANET-style `.inp`
//! file and produces plausible, control-responsive telemetry without solving
//! any network equations: closing pipes depresses pressures and flows,
//! pump speed scales pump flow, and a slow waveform keeps the values moving
//! between steps. It exists so the whole bridge can run end-to-end on a
//! bench where the real solver is not available.

use std::fs;
use std::path::Path;

use crate::config::ConfigError;

use super::engine::HydraulicEngine;
use super::{AssetClass, AssetIndex, SimulationError};

/// Asset identifiers per class, in file order. Node classes (junctions,
/// reservoirs, tanks) and link classes (pipes, pumps, valves) each share one
/// 1-based index space, the same convention the real solver uses.
#[derive(Debug, Default)]
struct Inventory {
    junctions: Vec<String>,
    reservoirs: Vec<String>,
    tanks: Vec<String>,
    pipes: Vec<String>,
    pumps: Vec<String>,
    valves: Vec<String>,
}

impl Inventory {
    fn is_empty(&self) -> bool {
        self.junctions.is_empty()
            && self.reservoirs.is_empty()
            && self.tanks.is_empty()
            && self.pipes.is_empty()
            && self.pumps.is_empty()
            && self.valves.is_empty()
    }

    fn class_mut(&mut self, class: AssetClass) -> &mut Vec<String> {
        match class {
            AssetClass::Junction => &mut self.junctions,
            AssetClass::Reservoir => &mut self.reservoirs,
            AssetClass::Tank => &mut self.tanks,
            AssetClass::Pipe => &mut self.pipes,
            AssetClass::Pump => &mut self.pumps,
            AssetClass::Valve => &mut self.valves,
        }
    }
}

/// Stand-in hydraulic engine backed by the parsed asset inventory.
pub struct SyntheticEngine {
    inventory: Inventory,
    pipe_open: Vec<bool>,
    pump_settings: Vec<f64>,
    step_seconds: u64,
    /// Nominal run horizon in simulated seconds; extended before every solve.
    duration: u64,
    /// Simulated seconds elapsed so far.
    elapsed: u64,
    analysis_open: bool,
}

impl SyntheticEngine {
    /// Build an engine from an EPANET-style network file.
    pub fn from_inp(path: &Path, step_seconds: u64) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let inventory = parse_inventory(&text);
        if inventory.is_empty() {
            return Err(ConfigError::EmptyNetwork {
                path: path.to_path_buf(),
            });
        }
        Ok(Self {
            pipe_open: vec![true; inventory.pipes.len()],
            pump_settings: vec![1.0; inventory.pumps.len()],
            inventory,
            step_seconds,
            duration: 0,
            elapsed: 0,
            analysis_open: false,
        })
    }

    /// Fraction of pipes currently open; 1.0 for a network without pipes.
    fn openness(&self) -> f64 {
        if self.pipe_open.is_empty() {
            return 1.0;
        }
        let open = self.pipe_open.iter().filter(|&&o| o).count();
        open as f64 / self.pipe_open.len() as f64
    }

    /// Map a node index to its position within the junction block.
    fn junction_position(&self, index: AssetIndex) -> Result<usize, SimulationError> {
        let position = index as i64 - 1;
        if (0..self.inventory.junctions.len() as i64).contains(&position) {
            Ok(position as usize)
        } else {
            Err(SimulationError::UnknownIndex {
                class: AssetClass::Junction,
                index,
            })
        }
    }

    fn tank_position(&self, index: AssetIndex) -> Result<usize, SimulationError> {
        let first = (self.inventory.junctions.len() + self.inventory.reservoirs.len()) as i64;
        let position = index as i64 - 1 - first;
        if (0..self.inventory.tanks.len() as i64).contains(&position) {
            Ok(position as usize)
        } else {
            Err(SimulationError::UnknownIndex {
                class: AssetClass::Tank,
                index,
            })
        }
    }

    fn pipe_position(&self, index: AssetIndex) -> Result<usize, SimulationError> {
        let position = index as i64 - 1;
        if (0..self.inventory.pipes.len() as i64).contains(&position) {
            Ok(position as usize)
        } else {
            Err(SimulationError::UnknownIndex {
                class: AssetClass::Pipe,
                index,
            })
        }
    }

    fn pump_position(&self, index: AssetIndex) -> Result<usize, SimulationError> {
        let position = index as i64 - 1 - self.inventory.pipes.len() as i64;
        if (0..self.inventory.pumps.len() as i64).contains(&position) {
            Ok(position as usize)
        } else {
            Err(SimulationError::UnknownIndex {
                class: AssetClass::Pump,
                index,
            })
        }
    }

    fn wave(&self, rate: f64) -> f64 {
        (self.elapsed as f64 * rate).sin()
    }
}

impl HydraulicEngine for SyntheticEngine {
    fn indices(&self, class: AssetClass) -> Vec<AssetIndex> {
        // Nodes: junctions, then reservoirs, then tanks. Links: pipes, then
        // pumps, then valves. Both spaces are 1-based.
        let (first, count) = match class {
            AssetClass::Junction => (1, self.inventory.junctions.len()),
            AssetClass::Reservoir => (
                1 + self.inventory.junctions.len(),
                self.inventory.reservoirs.len(),
            ),
            AssetClass::Tank => (
                1 + self.inventory.junctions.len() + self.inventory.reservoirs.len(),
                self.inventory.tanks.len(),
            ),
            AssetClass::Pipe => (1, self.inventory.pipes.len()),
            AssetClass::Pump => (1 + self.inventory.pipes.len(), self.inventory.pumps.len()),
            AssetClass::Valve => (
                1 + self.inventory.pipes.len() + self.inventory.pumps.len(),
                self.inventory.valves.len(),
            ),
        };
        (first..first + count).map(|i| i as AssetIndex).collect()
    }

    fn set_pipe_status(&mut self, index: AssetIndex, open: bool) -> Result<(), SimulationError> {
        let position = self.pipe_position(index)?;
        self.pipe_open[position] = open;
        Ok(())
    }

    fn set_pump_setting(
        &mut self,
        index: AssetIndex,
        setting: f64,
    ) -> Result<(), SimulationError> {
        let position = self.pump_position(index)?;
        if !setting.is_finite() || setting < 0.0 {
            return Err(SimulationError::InvalidControl {
                class: AssetClass::Pump,
                index,
                value: setting,
            });
        }
        self.pump_settings[position] = setting;
        Ok(())
    }

    fn open_analysis(&mut self) -> Result<(), SimulationError> {
        self.analysis_open = true;
        Ok(())
    }

    fn solve_step(&mut self) -> Result<(), SimulationError> {
        if !self.analysis_open {
            return Err(SimulationError::NotInitialized);
        }
        // Keep the horizon one step ahead of the clock so the run never
        // terminates on its own.
        self.duration += self.step_seconds;
        self.elapsed += self.step_seconds;
        Ok(())
    }

    fn pressure(&self, index: AssetIndex) -> Result<f64, SimulationError> {
        let position = self.junction_position(index)?;
        let base = 52.0 + 3.0 * position as f64;
        Ok(base * (0.35 + 0.65 * self.openness()) + 1.2 * self.wave(0.05))
    }

    fn head(&self, index: AssetIndex) -> Result<f64, SimulationError> {
        let position = self.tank_position(index)?;
        Ok(110.0 + 6.0 * position as f64 + 0.4 * self.wave(0.02))
    }

    fn flow(&self, index: AssetIndex) -> Result<f64, SimulationError> {
        let position = self.pump_position(index)?;
        let rated = 38.0 + 9.0 * position as f64;
        Ok(self.pump_settings[position] * rated * (0.5 + 0.5 * self.openness()))
    }

    fn close_analysis(&mut self) {
        self.analysis_open = false;
    }
}

/// Collect asset identifiers from the section bodies of an `.inp` file.
/// Lines are `;`-comments, `[SECTION]` headers, or whitespace-separated
/// records whose first token is the asset id. Unknown sections are skipped.
fn parse_inventory(text: &str) -> Inventory {
    let mut inventory = Inventory::default();
    let mut current: Option<AssetClass> = None;
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            let name = line.trim_matches(|c| c == '[' || c == ']').to_ascii_uppercase();
            current = match name.as_str() {
                "JUNCTIONS" => Some(AssetClass::Junction),
                "RESERVOIRS" => Some(AssetClass::Reservoir),
                "TANKS" => Some(AssetClass::Tank),
                "PIPES" => Some(AssetClass::Pipe),
                "PUMPS" => Some(AssetClass::Pump),
                "VALVES" => Some(AssetClass::Valve),
                _ => None,
            };
            continue;
        }
        if let (Some(class), Some(id)) = (current, line.split_whitespace().next()) {
            inventory.class_mut(class).push(id.to_string());
        }
    }
    inventory
}

#[cfg(test)]
mod tests {
    use super::*;

    const NETWORK: &str = "\
[TITLE]
Bench network

[JUNCTIONS]
;ID    Elev   Demand
 J1    100    10
 J2    95     12
 J3    90     8

[RESERVOIRS]
 R1    120

[TANKS]
 T1    110    5

[PIPES]
;ID    Node1  Node2
 P1    J1     J2
 P2    J2     J3

[PUMPS]
 PU1   R1     J1

[VALVES]

[END]
";

    fn engine() -> SyntheticEngine {
        let inventory = parse_inventory(NETWORK);
        SyntheticEngine {
            pipe_open: vec![true; inventory.pipes.len()],
            pump_settings: vec![1.0; inventory.pumps.len()],
            inventory,
            step_seconds: 1,
            duration: 0,
            elapsed: 0,
            analysis_open: false,
        }
    }

    #[test]
    fn inventory_counts_follow_the_sections() {
        let inventory = parse_inventory(NETWORK);
        assert_eq!(inventory.junctions, vec!["J1", "J2", "J3"]);
        assert_eq!(inventory.reservoirs, vec!["R1"]);
        assert_eq!(inventory.tanks, vec!["T1"]);
        assert_eq!(inventory.pipes, vec!["P1", "P2"]);
        assert_eq!(inventory.pumps, vec!["PU1"]);
        assert!(inventory.valves.is_empty());
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let inventory = parse_inventory("[PIPES]\n; comment only\n\n P9 J1 J2\n");
        assert_eq!(inventory.pipes, vec!["P9"]);
    }

    #[test]
    fn node_and_link_index_spaces_are_one_based_and_disjoint_per_kind() {
        let engine = engine();
        assert_eq!(engine.indices(AssetClass::Junction), vec![1, 2, 3]);
        assert_eq!(engine.indices(AssetClass::Reservoir), vec![4]);
        assert_eq!(engine.indices(AssetClass::Tank), vec![5]);
        assert_eq!(engine.indices(AssetClass::Pipe), vec![1, 2]);
        assert_eq!(engine.indices(AssetClass::Pump), vec![3]);
        assert!(engine.indices(AssetClass::Valve).is_empty());
    }

    #[test]
    fn closing_pipes_depresses_pressure() {
        let mut engine = engine();
        engine.open_analysis().unwrap();
        engine.solve_step().unwrap();
        let open = engine.pressure(1).unwrap();
        engine.set_pipe_status(1, false).unwrap();
        engine.set_pipe_status(2, false).unwrap();
        let closed = engine.pressure(1).unwrap();
        assert!(closed < open);
    }

    #[test]
    fn pump_setting_scales_flow() {
        let mut engine = engine();
        engine.open_analysis().unwrap();
        engine.solve_step().unwrap();
        let pump = engine.indices(AssetClass::Pump)[0];
        let nominal = engine.flow(pump).unwrap();
        engine.set_pump_setting(pump, 0.5).unwrap();
        assert!((engine.flow(pump).unwrap() - nominal / 2.0).abs() < 1e-9);
        engine.set_pump_setting(pump, 0.0).unwrap();
        assert_eq!(engine.flow(pump).unwrap(), 0.0);
    }

    #[test]
    fn negative_pump_setting_is_rejected() {
        let mut engine = engine();
        let pump = engine.indices(AssetClass::Pump)[0];
        let err = engine.set_pump_setting(pump, -0.1).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidControl { .. }));
    }

    #[test]
    fn unknown_indices_are_rejected() {
        let mut engine = engine();
        assert!(matches!(
            engine.set_pipe_status(7, true),
            Err(SimulationError::UnknownIndex { .. })
        ));
        assert!(matches!(
            engine.pressure(4), // reservoir node, not a junction
            Err(SimulationError::UnknownIndex { .. })
        ));
        assert!(matches!(
            engine.flow(1), // pipe link, not a pump
            Err(SimulationError::UnknownIndex { .. })
        ));
    }

    #[test]
    fn solve_requires_an_open_analysis() {
        let mut engine = engine();
        assert!(matches!(
            engine.solve_step(),
            Err(SimulationError::NotInitialized)
        ));
    }

    #[test]
    fn telemetry_is_deterministic_for_the_same_history() {
        let mut a = engine();
        let mut b = engine();
        for engine in [&mut a, &mut b] {
            engine.open_analysis().unwrap();
            engine.set_pipe_status(2, false).unwrap();
            engine.solve_step().unwrap();
            engine.solve_step().unwrap();
        }
        assert_eq!(a.pressure(1).unwrap(), b.pressure(1).unwrap());
        assert_eq!(a.head(5).unwrap(), b.head(5).unwrap());
        assert_eq!(a.flow(3).unwrap(), b.flow(3).unwrap());
    }
}
