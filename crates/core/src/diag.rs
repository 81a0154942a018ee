// NibSnap - 4-bit Microcontroller Snapshot Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Human-readable state dump for debugging. Not a stable format.

use crate::MachineState;
use bitflags::bitflags;
use std::fmt;

pub const ROW_CELLS: usize = 64;

bitflags! {
    /// The 4-bit flag register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u8 {
        const C = 1 << 0;
        const Z = 1 << 1;
        const D = 1 << 2;
        const I = 1 << 3;
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in [
            (Flags::C, 'C'),
            (Flags::Z, 'Z'),
            (Flags::D, 'D'),
            (Flags::I, 'I'),
        ] {
            let shown = if self.contains(flag) { name } else { '-' };
            write!(f, "{}", shown)?;
        }
        Ok(())
    }
}

/// Register, timer, interrupt and memory-map printer.
pub struct StateDump<'a>(pub &'a dyn MachineState);

impl fmt::Display for StateDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        let flags = s.get_flags();
        writeln!(f, "PC: 0x{:04X}", s.get_pc())?;
        writeln!(f, "X:  0x{:03X}", s.get_x())?;
        writeln!(f, "Y:  0x{:03X}", s.get_y())?;
        writeln!(f, "A:  0x{:01X}", s.get_a())?;
        writeln!(f, "B:  0x{:01X}", s.get_b())?;
        writeln!(f, "NP: 0x{:02X}", s.get_np())?;
        writeln!(f, "SP: 0x{:02X}", s.get_sp())?;
        writeln!(
            f,
            "FL: 0x{:01X} [{}]",
            flags,
            Flags::from_bits_truncate(flags)
        )?;
        writeln!(f, "tick: 0x{:08X}", s.get_tick_counter())?;
        writeln!(f, "clk:  0x{:08X}", s.get_clk_timer_timestamp())?;
        writeln!(f, "prog: 0x{:08X}", s.get_prog_timer_timestamp())?;
        writeln!(f, "EN:   0x{:01X}", u8::from(s.get_prog_timer_enabled()))?;
        writeln!(f, "DATA: 0x{:02X}", s.get_prog_timer_data())?;
        writeln!(f, "RLD:  0x{:02X}", s.get_prog_timer_rld())?;
        writeln!(f, "call depth: 0x{:08X}", s.get_call_depth())?;
        writeln!(f)?;

        for (i, slot) in s.interrupts().iter().enumerate() {
            writeln!(f, "INT {:X} FLAG 0x{:01X}", i, slot.factor_flag_reg)?;
            writeln!(f, "INT {:X} MASK 0x{:01X}", i, slot.mask_reg)?;
            writeln!(f, "INT {:X} TRIG 0x{:01X}", i, u8::from(slot.triggered))?;
        }
        writeln!(f)?;

        // all-zero rows are skipped
        for (row, cells) in s.memory().chunks(ROW_CELLS).enumerate() {
            if cells.iter().all(|&c| c == 0) {
                continue;
            }
            write!(f, "{:03X}: ", row * ROW_CELLS)?;
            for &c in cells {
                write!(f, "{:01X}", c & 0xF)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
