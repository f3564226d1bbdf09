// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the hydrobridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register layout shared with the field controller
//!
//! This module is the single place where wire addresses and value encodings
//! are defined. The layout is a compatibility contract: the PLC program on
//! the other end of the link hard-codes the same addresses and encodings, so
//! any change here is a breaking change for the whole testbed.
//!
//! ## Register Map
//!
//! ### Coils (controller → plant)
//!
//! - Coils 0–99: pipe status, one coil per pipe in pipe-index order.
//!   A wire value of 1 means "closed"; the decoded status is the negation,
//!   so an all-zero block reads as all pipes open.
//!
//! ### Holding Registers (controller → plant)
//!
//! - Registers 0–99: pump setting, one register per pump in pump-index
//!   order, unsigned, scaled ×100 (raw 150 → relative speed 1.50).
//!
//! ### Output Registers (plant → controller)
//!
//! - Registers 100–199: junction pressures
//! - Registers 200–299: tank hydraulic heads
//! - Registers 300–399: pump flows
//!
//! Each telemetry value is an IEEE-754 float32 spread over two consecutive
//! registers, most-significant word first, so every block holds up to
//! [`TELEMETRY_PAIR_SLOTS`] values. Slot counts are fixed regardless of the
//! actual network size; both sides rely on the static layout instead of a
//! handshake.

/// First coil of the pipe-status block.
pub const PIPE_STATUS_COIL_BASE: u16 = 0;

/// Number of pipe-status coils read every cycle.
pub const PIPE_STATUS_SLOTS: u16 = 100;

/// First holding register of the pump-setting block.
pub const PUMP_SETTING_REGISTER_BASE: u16 = 0;

/// Number of pump-setting registers read every cycle.
pub const PUMP_SETTING_SLOTS: u16 = 100;

/// First output register of the junction-pressure block.
pub const JUNCTION_PRESSURE_BASE: u16 = 100;

/// First output register of the tank-head block.
pub const TANK_HEAD_BASE: u16 = 200;

/// First output register of the pump-flow block.
pub const PUMP_FLOW_BASE: u16 = 300;

/// Float32 pairs that fit in one telemetry block before it would run into
/// the next block's base address.
pub const TELEMETRY_PAIR_SLOTS: u16 = 50;

/// Decoded control inputs for one cycle, in canonical asset-index order.
///
/// Rebuilt from the raw coil and register blocks every cycle and never kept
/// across cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlFrame {
    /// One entry per pipe, `true` = open.
    pub pipe_statuses: Vec<bool>,
    /// One entry per pump, relative speed (1.0 = nominal).
    pub pump_settings: Vec<f64>,
}

impl ControlFrame {
    /// Decode the raw coil and holding-register blocks into typed controls.
    ///
    /// Slots beyond the actual asset counts are ignored. Returns `None` when
    /// either block is shorter than the corresponding asset count; the caller
    /// treats that as a fatal frame mismatch rather than applying a
    /// half-decoded control state.
    pub fn decode(
        coils: &[bool],
        registers: &[u16],
        pipe_count: usize,
        pump_count: usize,
    ) -> Option<Self> {
        if coils.len() < pipe_count || registers.len() < pump_count {
            return None;
        }
        Some(Self {
            pipe_statuses: coils[..pipe_count].iter().map(|&bit| decode_pipe_status(bit)).collect(),
            pump_settings: registers[..pump_count]
                .iter()
                .map(|&raw| decode_pump_setting(raw))
                .collect(),
        })
    }
}

/// Measurements produced by one hydraulic step, in canonical index order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryFrame {
    pub junction_pressures: Vec<f64>,
    pub tank_heads: Vec<f64>,
    pub pump_flows: Vec<f64>,
}

impl TelemetryFrame {
    /// Encode the frame into `(base address, register words)` blocks ready to
    /// be written to the field controller. Empty blocks are included; the
    /// writer skips them (a zero-quantity Modbus write is illegal).
    pub fn register_blocks(&self) -> [(u16, Vec<u16>); 3] {
        [
            (JUNCTION_PRESSURE_BASE, encode_block(&self.junction_pressures)),
            (TANK_HEAD_BASE, encode_block(&self.tank_heads)),
            (PUMP_FLOW_BASE, encode_block(&self.pump_flows)),
        ]
    }
}

/// Wire coil → pipe status. Wire-true means "closed", so the logical status
/// is the negation and an unwritten (all-zero) block defaults to open.
pub fn decode_pipe_status(bit: bool) -> bool {
    !bit
}

/// Raw pump register → relative speed. The controller sends integers scaled
/// ×100; there is intentionally no negation here, the scaling asymmetry with
/// pipe statuses is part of the wire contract.
pub fn decode_pump_setting(raw: u16) -> f64 {
    f64::from(raw) / 100.0
}

/// Pack a float32 into two consecutive registers, most-significant word
/// first.
pub fn encode_float(value: f32) -> [u16; 2] {
    let bits = value.to_bits();
    [(bits >> 16) as u16, bits as u16]
}

/// Inverse of [`encode_float`]; bit-exact for every finite float32.
pub fn decode_float(words: [u16; 2]) -> f32 {
    f32::from_bits((u32::from(words[0]) << 16) | u32::from(words[1]))
}

/// Register address of the `slot`-th float pair in a telemetry block.
pub fn telemetry_address(base: u16, slot: u16) -> u16 {
    base + slot * 2
}

fn encode_block(values: &[f64]) -> Vec<u16> {
    values.iter().flat_map(|&v| encode_float(v as f32)).collect()
}
