//! Hydrobridge library
//!
//! This library bridges a simulated water-distribution network with a PLC
//! over Modbus TCP for hardware-in-the-loop testing: every cycle it pulls
//! actuator commands from the controller, applies them to the simulation,
//! advances one hydraulic step and reports the resulting measurements back.

pub mod config;
pub mod link;
pub mod orchestrator;
pub mod registers;
pub mod simulation;

pub use config::Config;
pub use link::{FieldLink, LinkError};
pub use orchestrator::{CycleOrchestrator, Phase, RunError};
pub use registers::{ControlFrame, TelemetryFrame};
pub use simulation::{AssetClass, HydraulicEngine, SimulationAdapter, SyntheticEngine};
