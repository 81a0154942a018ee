// NibSnap - 4-bit Microcontroller Snapshot Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Snapshot record and its two wire formats.
//!
//! Both formats start with the 13-bit PC followed by a discriminator bit.
//! Compact sets the bit and bit-packs everything after it. Legacy files start
//! with the ASCII magic `TLST`, whose first two bytes happen to decode as a
//! PC plus a clear discriminator, so the loader re-reads those bits as magic.

use crate::bitstream::{BitReader, BitWriter};
use crate::{sparse, varint};
use crate::{Geometry, InterruptSlot, MachineState, SnapResult, SnapshotError};
use nibsnap_config::{FormatName, TickBasePolicy};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::{debug, warn};

pub const MAGIC: &[u8; 4] = b"TLST";
pub const VERSION: u8 = 1;

const PC_BITS: u8 = 13;
const XY_BITS: u8 = 12;
const NIBBLE_BITS: u8 = 4;
const NP_BITS: u8 = 5;

/// Magic, version, then the fixed-width register and timer block.
const LEGACY_HEADER_LEN: usize = 4 + 1 + 2 * 3 + 5 + 4 * 3 + 3 + 4;

/// Exact byte length of a Legacy snapshot for the given geometry.
pub fn legacy_len(geometry: Geometry) -> usize {
    LEGACY_HEADER_LEN + 3 * geometry.interrupt_slots + geometry.memory_cells
}

fn mask(bits: u8) -> u32 {
    (1u32 << bits) - 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Compact,
    Legacy,
}

impl From<FormatName> for Format {
    fn from(name: FormatName) -> Self {
        match name {
            FormatName::Compact => Format::Compact,
            FormatName::Legacy => Format::Legacy,
        }
    }
}

/// Base value Compact timer deltas are resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickBase {
    /// The tick counter already held by the target state.
    #[default]
    Current,
    /// Store this tick counter first, then resolve against it.
    Reset(u32),
}

impl From<TickBasePolicy> for TickBase {
    fn from(policy: TickBasePolicy) -> Self {
        match policy {
            TickBasePolicy::Current => TickBase::Current,
            TickBasePolicy::Reset(t) => TickBase::Reset(t),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    pub pc: u16,
    pub x: u16,
    pub y: u16,
    pub a: u8,
    pub b: u8,
    pub np: u8,
    pub sp: u8,
    pub flags: u8,
}

impl Registers {
    fn capture(state: &dyn MachineState) -> Self {
        Self {
            pc: state.get_pc(),
            x: state.get_x(),
            y: state.get_y(),
            a: state.get_a(),
            b: state.get_b(),
            np: state.get_np(),
            sp: state.get_sp(),
            flags: state.get_flags(),
        }
        .masked()
    }

    /// Clamp every register to its architectural width.
    pub fn masked(self) -> Self {
        Self {
            pc: self.pc & mask(PC_BITS) as u16,
            x: self.x & mask(XY_BITS) as u16,
            y: self.y & mask(XY_BITS) as u16,
            a: self.a & 0xF,
            b: self.b & 0xF,
            np: self.np & mask(NP_BITS) as u8,
            sp: self.sp,
            flags: self.flags & 0xF,
        }
    }

    fn apply(&self, state: &mut dyn MachineState) {
        state.set_pc(self.pc);
        state.set_x(self.x);
        state.set_y(self.y);
        state.set_a(self.a);
        state.set_b(self.b);
        state.set_np(self.np);
        state.set_sp(self.sp);
        state.set_flags(self.flags);
    }
}

/// Timer timestamps as stored by each format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Timestamps {
    Absolute {
        tick_counter: u32,
        clk_timer: u32,
        prog_timer: u32,
    },
    /// Distance of each timestamp behind the tick counter at save time.
    Relative { clk_delta: u32, prog_delta: u32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgTimer {
    pub enabled: bool,
    pub data: u8,
    pub reload: u8,
}

/// Transient, fully parsed form of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub registers: Registers,
    pub timestamps: Timestamps,
    pub prog_timer: ProgTimer,
    pub call_depth: u32,
    pub interrupts: Vec<InterruptSlot>,
    pub memory: Vec<u8>,
}

impl SnapshotRecord {
    pub fn capture(state: &dyn MachineState, format: Format) -> SnapResult<Self> {
        let tick = state.get_tick_counter();
        let clk = state.get_clk_timer_timestamp();
        let prog = state.get_prog_timer_timestamp();

        let timestamps = match format {
            Format::Legacy => Timestamps::Absolute {
                tick_counter: tick,
                clk_timer: clk,
                prog_timer: prog,
            },
            Format::Compact => Timestamps::Relative {
                clk_delta: delta_behind(tick, clk, "clk_timer")?,
                prog_delta: delta_behind(tick, prog, "prog_timer")?,
            },
        };

        Ok(Self {
            registers: Registers::capture(state),
            timestamps,
            prog_timer: ProgTimer {
                enabled: state.get_prog_timer_enabled(),
                data: state.get_prog_timer_data(),
                reload: state.get_prog_timer_rld(),
            },
            call_depth: state.get_call_depth(),
            interrupts: state
                .interrupts()
                .iter()
                .map(|slot| InterruptSlot {
                    factor_flag_reg: slot.factor_flag_reg & 0xF,
                    mask_reg: slot.mask_reg & 0xF,
                    triggered: slot.triggered,
                })
                .collect(),
            memory: state.memory().iter().map(|cell| cell & 0xF).collect(),
        })
    }

    pub fn format(&self) -> Format {
        match self.timestamps {
            Timestamps::Absolute { .. } => Format::Legacy,
            Timestamps::Relative { .. } => Format::Compact,
        }
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.interrupts.len(), self.memory.len())
    }

    /// Absolute `(tick_counter, clk_timer, prog_timer)` for a given tick base.
    ///
    /// `current_tick` is only consulted for Relative records under `TickBase::Current`.
    pub fn resolve_timestamps(&self, tick_base: TickBase, current_tick: u32) -> (u32, u32, u32) {
        match self.timestamps {
            Timestamps::Absolute {
                tick_counter,
                clk_timer,
                prog_timer,
            } => (tick_counter, clk_timer, prog_timer),
            Timestamps::Relative {
                clk_delta,
                prog_delta,
            } => {
                let base = match tick_base {
                    TickBase::Current => current_tick,
                    TickBase::Reset(t) => t,
                };
                (
                    base,
                    base.wrapping_sub(clk_delta),
                    base.wrapping_sub(prog_delta),
                )
            }
        }
    }

    /// Smallest tick counter that resolves the timers without wrapping.
    pub fn min_base_tick(&self) -> u32 {
        match self.timestamps {
            Timestamps::Absolute { tick_counter, .. } => tick_counter,
            Timestamps::Relative {
                clk_delta,
                prog_delta,
            } => clk_delta.max(prog_delta),
        }
    }

    /// Re-express the record in `format` without a machine.
    ///
    /// Relative timers become absolute against `base_tick`. Absolute timers
    /// become deltas behind their own tick counter.
    pub fn convert(&self, format: Format, base_tick: u32) -> SnapResult<Self> {
        let timestamps = match (self.timestamps, format) {
            (Timestamps::Relative { .. }, Format::Legacy) => {
                let (tick_counter, clk_timer, prog_timer) =
                    self.resolve_timestamps(TickBase::Reset(base_tick), base_tick);
                Timestamps::Absolute {
                    tick_counter,
                    clk_timer,
                    prog_timer,
                }
            }
            (
                Timestamps::Absolute {
                    tick_counter,
                    clk_timer,
                    prog_timer,
                },
                Format::Compact,
            ) => Timestamps::Relative {
                clk_delta: delta_behind(tick_counter, clk_timer, "clk_timer")?,
                prog_delta: delta_behind(tick_counter, prog_timer, "prog_timer")?,
            },
            (unchanged, _) => unchanged,
        };
        Ok(Self {
            timestamps,
            ..self.clone()
        })
    }

    /// Copy every field into `state`. Nothing is written on a geometry mismatch.
    pub fn apply(&self, state: &mut dyn MachineState, tick_base: TickBase) -> SnapResult<()> {
        let expected = Geometry::of(state);
        if self.geometry() != expected {
            return Err(SnapshotError::GeometryMismatch {
                found: self.geometry(),
                expected,
            });
        }

        let (tick, clk, prog) = self.resolve_timestamps(tick_base, state.get_tick_counter());

        self.registers.apply(state);
        state.set_tick_counter(tick);
        state.set_clk_timer_timestamp(clk);
        state.set_prog_timer_timestamp(prog);
        state.set_prog_timer_enabled(self.prog_timer.enabled);
        state.set_prog_timer_data(self.prog_timer.data);
        state.set_prog_timer_rld(self.prog_timer.reload);
        state.set_call_depth(self.call_depth);
        state.interrupts_mut().copy_from_slice(&self.interrupts);
        state.memory_mut().copy_from_slice(&self.memory);
        Ok(())
    }

    /// Serialize in the format implied by the timestamps. Returns bytes written.
    pub fn encode<W: Write>(&self, sink: W) -> SnapResult<usize> {
        let mut w = BitWriter::new(sink);
        match self.timestamps {
            Timestamps::Relative {
                clk_delta,
                prog_delta,
            } => self.encode_compact(&mut w, clk_delta, prog_delta)?,
            Timestamps::Absolute {
                tick_counter,
                clk_timer,
                prog_timer,
            } => self.encode_legacy(&mut w, [tick_counter, clk_timer, prog_timer])?,
        }
        w.flush()?;
        Ok(w.bytes_written())
    }

    fn encode_compact<W: Write>(
        &self,
        w: &mut BitWriter<W>,
        clk_delta: u32,
        prog_delta: u32,
    ) -> SnapResult<()> {
        let regs = self.registers.masked();
        w.write(u32::from(regs.pc), PC_BITS)?;
        w.write(1, 1)?;
        w.write(u32::from(regs.x), XY_BITS)?;
        w.write(u32::from(regs.y), XY_BITS)?;
        w.write(u32::from(regs.a), NIBBLE_BITS)?;
        w.write(u32::from(regs.b), NIBBLE_BITS)?;
        w.write(u32::from(regs.np), NP_BITS)?;
        w.write(u32::from(regs.sp), 8)?;
        w.write(u32::from(regs.flags), NIBBLE_BITS)?;

        varint::write(w, clk_delta)?;
        varint::write(w, prog_delta)?;
        w.write(u32::from(self.prog_timer.enabled), 1)?;
        w.write(u32::from(self.prog_timer.data), 8)?;
        w.write(u32::from(self.prog_timer.reload), 8)?;
        varint::write(w, self.call_depth)?;

        for slot in &self.interrupts {
            w.write(u32::from(slot.factor_flag_reg), NIBBLE_BITS)?;
            w.write(u32::from(slot.mask_reg), NIBBLE_BITS)?;
            w.write(u32::from(slot.triggered), 1)?;
        }

        sparse::encode(w, &self.memory)
    }

    fn encode_legacy<W: Write>(&self, w: &mut BitWriter<W>, timers: [u32; 3]) -> SnapResult<()> {
        for &byte in MAGIC {
            w.write(u32::from(byte), 8)?;
        }
        w.write(u32::from(VERSION), 8)?;

        let regs = self.registers.masked();
        w.write(u32::from(regs.pc), 16)?;
        w.write(u32::from(regs.x), 16)?;
        w.write(u32::from(regs.y), 16)?;
        w.write(u32::from(regs.a), 8)?;
        w.write(u32::from(regs.b), 8)?;
        w.write(u32::from(regs.np), 8)?;
        w.write(u32::from(regs.sp), 8)?;
        w.write(u32::from(regs.flags), 8)?;

        for t in timers {
            w.write(t, 32)?;
        }
        w.write(u32::from(self.prog_timer.enabled), 8)?;
        w.write(u32::from(self.prog_timer.data), 8)?;
        w.write(u32::from(self.prog_timer.reload), 8)?;
        w.write(self.call_depth, 32)?;

        for slot in &self.interrupts {
            w.write(u32::from(slot.factor_flag_reg & 0xF), 8)?;
            w.write(u32::from(slot.mask_reg & 0xF), 8)?;
            w.write(u32::from(slot.triggered), 8)?;
        }
        for &cell in &self.memory {
            w.write(u32::from(cell & 0xF), 8)?;
        }
        Ok(())
    }

    /// Parse either format, sniffing the discriminator bit after the PC.
    pub fn decode<R: Read>(source: R, geometry: Geometry) -> SnapResult<Self> {
        let mut r = BitReader::new(source);
        let pc = r.read(PC_BITS)? as u16;
        if r.read_bool()? {
            let record = Self::decode_compact(&mut r, pc, geometry)?;
            // a Legacy body whose magic lost its discriminator lands here
            let parsed = r.bytes_read();
            if !r.at_end()? {
                return Err(SnapshotError::TrailingData { parsed });
            }
            return Ok(record);
        }

        let expected = legacy_len(geometry);
        let record = Self::decode_legacy(&mut r, pc, geometry).map_err(|e| match e {
            SnapshotError::Truncated { offset } => SnapshotError::ShortTransfer {
                expected,
                actual: offset,
            },
            other => other,
        })?;
        if !r.at_end()? {
            warn!(
                "Ignoring trailing data after Legacy snapshot ({} bytes parsed)",
                expected
            );
        }
        Ok(record)
    }

    fn decode_compact<R: Read>(
        r: &mut BitReader<R>,
        pc: u16,
        geometry: Geometry,
    ) -> SnapResult<Self> {
        let registers = Registers {
            pc,
            x: r.read(XY_BITS)? as u16,
            y: r.read(XY_BITS)? as u16,
            a: r.read(NIBBLE_BITS)? as u8,
            b: r.read(NIBBLE_BITS)? as u8,
            np: r.read(NP_BITS)? as u8,
            sp: r.read(8)? as u8,
            flags: r.read(NIBBLE_BITS)? as u8,
        };
        let timestamps = Timestamps::Relative {
            clk_delta: varint::read(r)?,
            prog_delta: varint::read(r)?,
        };
        let prog_timer = ProgTimer {
            enabled: r.read_bool()?,
            data: r.read(8)? as u8,
            reload: r.read(8)? as u8,
        };
        let call_depth = varint::read(r)?;

        let mut interrupts = Vec::with_capacity(geometry.interrupt_slots);
        for _ in 0..geometry.interrupt_slots {
            interrupts.push(InterruptSlot {
                factor_flag_reg: r.read(NIBBLE_BITS)? as u8,
                mask_reg: r.read(NIBBLE_BITS)? as u8,
                triggered: r.read_bool()?,
            });
        }

        let mut memory = vec![0u8; geometry.memory_cells];
        sparse::decode(r, &mut memory)?;

        Ok(Self {
            registers,
            timestamps,
            prog_timer,
            call_depth,
            interrupts,
            memory,
        })
    }

    fn decode_legacy<R: Read>(
        r: &mut BitReader<R>,
        pc_bits: u16,
        geometry: Geometry,
    ) -> SnapResult<Self> {
        // The 14 bits consumed so far are the first magic byte plus the low
        // six bits of the second; the top two bits are still buffered.
        let tail = r.read(2)? as u8;
        let mut magic = [0u8; 4];
        magic[0] = (pc_bits & 0xFF) as u8;
        magic[1] = ((pc_bits >> 8) as u8) | (tail << 6);
        magic[2] = r.read(8)? as u8;
        magic[3] = r.read(8)? as u8;
        if &magic != MAGIC {
            return Err(SnapshotError::MagicMismatch { found: magic });
        }

        let version = r.read(8)? as u8;
        if version != VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: version,
                expected: VERSION,
            });
        }

        let registers = Registers {
            pc: r.read(16)? as u16,
            x: r.read(16)? as u16,
            y: r.read(16)? as u16,
            a: r.read(8)? as u8,
            b: r.read(8)? as u8,
            np: r.read(8)? as u8,
            sp: r.read(8)? as u8,
            flags: r.read(8)? as u8,
        }
        .masked();
        let timestamps = Timestamps::Absolute {
            tick_counter: r.read(32)?,
            clk_timer: r.read(32)?,
            prog_timer: r.read(32)?,
        };
        let prog_timer = ProgTimer {
            enabled: r.read(8)? & 0x1 == 1,
            data: r.read(8)? as u8,
            reload: r.read(8)? as u8,
        };
        let call_depth = r.read(32)?;

        let mut interrupts = Vec::with_capacity(geometry.interrupt_slots);
        for _ in 0..geometry.interrupt_slots {
            interrupts.push(InterruptSlot {
                factor_flag_reg: r.read(8)? as u8 & 0xF,
                mask_reg: r.read(8)? as u8 & 0xF,
                triggered: r.read(8)? & 0x1 == 1,
            });
        }

        let mut memory = Vec::with_capacity(geometry.memory_cells);
        for _ in 0..geometry.memory_cells {
            memory.push(r.read(8)? as u8 & 0xF);
        }

        Ok(Self {
            registers,
            timestamps,
            prog_timer,
            call_depth,
            interrupts,
            memory,
        })
    }
}

fn delta_behind(tick: u32, timestamp: u32, field: &'static str) -> SnapResult<u32> {
    tick.checked_sub(timestamp)
        .ok_or(SnapshotError::TimestampAhead {
            field,
            timestamp,
            tick,
        })
}

/// Capture `state` and write it to `sink`. Returns bytes written.
pub fn store<W: Write>(sink: W, state: &dyn MachineState, format: Format) -> SnapResult<usize> {
    let record = SnapshotRecord::capture(state, format)?;
    let written = record.encode(sink)?;
    debug!("Encoded {:?} snapshot ({} bytes)", format, written);
    Ok(written)
}

/// Parse a snapshot from `source` into `state`, then refresh hardware state.
///
/// The record is parsed completely before `state` is touched, so any error
/// leaves `state` as it was.
pub fn restore<R: Read>(
    source: R,
    state: &mut dyn MachineState,
    tick_base: TickBase,
) -> SnapResult<Format> {
    let record = SnapshotRecord::decode(source, Geometry::of(state))?;
    record.apply(state, tick_base)?;
    state.refresh_hardware_state();
    debug!(
        "Restored {:?} snapshot, PC={:#06x}",
        record.format(),
        record.registers.pc
    );
    Ok(record.format())
}
