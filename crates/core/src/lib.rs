// NibSnap - 4-bit Microcontroller Snapshot Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bitstream;
pub mod diag;
pub mod machine;
pub mod session;
pub mod slots;
pub mod snapshot;
pub mod sparse;
pub mod storage;
pub mod varint;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;


pub use snapshot::{Format, SnapshotRecord, TickBase, Timestamps};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Cannot open state file {path:?}: {source}")]
    StorageOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Short transfer: expected {expected} bytes, got {actual}")]
    ShortTransfer { expected: usize, actual: usize },
    #[error("Wrong state file magic {found:02x?}")]
    MagicMismatch { found: [u8; 4] },
    #[error("Unsupported version {found} (expected {expected})")]
    UnsupportedVersion { found: u8, expected: u8 },
    #[error("Corrupt input at memory cell {index}: {reason}")]
    CorruptInput { index: usize, reason: &'static str },
    #[error("Stream ended after {offset} bytes")]
    Truncated { offset: usize },
    #[error("Unexpected data after Compact record ({parsed} bytes parsed)")]
    TrailingData { parsed: usize },
    #[error("{field} timestamp {timestamp:#x} is ahead of tick counter {tick:#x}")]
    TimestampAhead {
        field: &'static str,
        timestamp: u32,
        tick: u32,
    },
    #[error("Geometry mismatch: snapshot has {found:?}, machine has {expected:?}")]
    GeometryMismatch { found: Geometry, expected: Geometry },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SnapResult<T> = Result<T, SnapshotError>;

/// One entry of the interrupt controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptSlot {
    pub factor_flag_reg: u8,
    pub mask_reg: u8,
    pub triggered: bool,
}

/// Build-time dimensions of the emulated machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub interrupt_slots: usize,
    pub memory_cells: usize,
}

impl Geometry {
    pub fn new(interrupt_slots: usize, memory_cells: usize) -> Self {
        Self {
            interrupt_slots,
            memory_cells,
        }
    }

    pub fn of(state: &dyn MachineState) -> Self {
        Self::new(state.interrupts().len(), state.memory().len())
    }

    pub fn from_config(cfg: &nibsnap_config::GeometryConfig) -> Self {
        Self::new(cfg.interrupt_slots, cfg.memory_cells)
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new(
            nibsnap_config::DEFAULT_INTERRUPT_SLOTS,
            nibsnap_config::DEFAULT_MEMORY_CELLS,
        )
    }
}

/// Accessors the emulation core exposes to the snapshot codec.
///
/// The codec only holds the borrow for the duration of one save or load.
/// Setters receive values already masked to their architectural width.
pub trait MachineState {
    fn get_pc(&self) -> u16;
    fn set_pc(&mut self, val: u16);
    fn get_x(&self) -> u16;
    fn set_x(&mut self, val: u16);
    fn get_y(&self) -> u16;
    fn set_y(&mut self, val: u16);
    fn get_a(&self) -> u8;
    fn set_a(&mut self, val: u8);
    fn get_b(&self) -> u8;
    fn set_b(&mut self, val: u8);
    fn get_np(&self) -> u8;
    fn set_np(&mut self, val: u8);
    fn get_sp(&self) -> u8;
    fn set_sp(&mut self, val: u8);
    fn get_flags(&self) -> u8;
    fn set_flags(&mut self, val: u8);

    fn get_tick_counter(&self) -> u32;
    fn set_tick_counter(&mut self, val: u32);
    fn get_clk_timer_timestamp(&self) -> u32;
    fn set_clk_timer_timestamp(&mut self, val: u32);
    fn get_prog_timer_timestamp(&self) -> u32;
    fn set_prog_timer_timestamp(&mut self, val: u32);
    fn get_prog_timer_enabled(&self) -> bool;
    fn set_prog_timer_enabled(&mut self, val: bool);
    fn get_prog_timer_data(&self) -> u8;
    fn set_prog_timer_data(&mut self, val: u8);
    fn get_prog_timer_rld(&self) -> u8;
    fn set_prog_timer_rld(&mut self, val: u8);

    fn get_call_depth(&self) -> u32;
    fn set_call_depth(&mut self, val: u32);

    fn interrupts(&self) -> &[InterruptSlot];
    fn interrupts_mut(&mut self) -> &mut [InterruptSlot];

    /// RAM, one nibble per cell.
    fn memory(&self) -> &[u8];
    fn memory_mut(&mut self) -> &mut [u8];

    /// Recompute hardware-derived state after registers and memory were replaced.
    fn refresh_hardware_state(&mut self);
}
