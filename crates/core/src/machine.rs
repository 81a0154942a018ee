// NibSnap - 4-bit Microcontroller Snapshot Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{Geometry, InterruptSlot, MachineState};

/// Plain in-memory machine state with no hardware behind it.
///
/// Used by tools that inspect or convert snapshots without running an emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RamMachine {
    pub pc: u16,
    pub x: u16,
    pub y: u16,
    pub a: u8,
    pub b: u8,
    pub np: u8,
    pub sp: u8,
    pub flags: u8,
    pub tick_counter: u32,
    pub clk_timer_timestamp: u32,
    pub prog_timer_timestamp: u32,
    pub prog_timer_enabled: bool,
    pub prog_timer_data: u8,
    pub prog_timer_rld: u8,
    pub call_depth: u32,
    pub interrupts: Vec<InterruptSlot>,
    pub memory: Vec<u8>,
    /// Number of times `refresh_hardware_state` ran.
    pub refresh_count: u32,
}

impl RamMachine {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            pc: 0,
            x: 0,
            y: 0,
            a: 0,
            b: 0,
            np: 0,
            sp: 0,
            flags: 0,
            tick_counter: 0,
            clk_timer_timestamp: 0,
            prog_timer_timestamp: 0,
            prog_timer_enabled: false,
            prog_timer_data: 0,
            prog_timer_rld: 0,
            call_depth: 0,
            interrupts: vec![InterruptSlot::default(); geometry.interrupt_slots],
            memory: vec![0; geometry.memory_cells],
            refresh_count: 0,
        }
    }
}

impl Default for RamMachine {
    fn default() -> Self {
        Self::new(Geometry::default())
    }
}

impl MachineState for RamMachine {
    fn get_pc(&self) -> u16 {
        self.pc
    }
    fn set_pc(&mut self, val: u16) {
        self.pc = val;
    }
    fn get_x(&self) -> u16 {
        self.x
    }
    fn set_x(&mut self, val: u16) {
        self.x = val;
    }
    fn get_y(&self) -> u16 {
        self.y
    }
    fn set_y(&mut self, val: u16) {
        self.y = val;
    }
    fn get_a(&self) -> u8 {
        self.a
    }
    fn set_a(&mut self, val: u8) {
        self.a = val;
    }
    fn get_b(&self) -> u8 {
        self.b
    }
    fn set_b(&mut self, val: u8) {
        self.b = val;
    }
    fn get_np(&self) -> u8 {
        self.np
    }
    fn set_np(&mut self, val: u8) {
        self.np = val;
    }
    fn get_sp(&self) -> u8 {
        self.sp
    }
    fn set_sp(&mut self, val: u8) {
        self.sp = val;
    }
    fn get_flags(&self) -> u8 {
        self.flags
    }
    fn set_flags(&mut self, val: u8) {
        self.flags = val;
    }

    fn get_tick_counter(&self) -> u32 {
        self.tick_counter
    }
    fn set_tick_counter(&mut self, val: u32) {
        self.tick_counter = val;
    }
    fn get_clk_timer_timestamp(&self) -> u32 {
        self.clk_timer_timestamp
    }
    fn set_clk_timer_timestamp(&mut self, val: u32) {
        self.clk_timer_timestamp = val;
    }
    fn get_prog_timer_timestamp(&self) -> u32 {
        self.prog_timer_timestamp
    }
    fn set_prog_timer_timestamp(&mut self, val: u32) {
        self.prog_timer_timestamp = val;
    }
    fn get_prog_timer_enabled(&self) -> bool {
        self.prog_timer_enabled
    }
    fn set_prog_timer_enabled(&mut self, val: bool) {
        self.prog_timer_enabled = val;
    }
    fn get_prog_timer_data(&self) -> u8 {
        self.prog_timer_data
    }
    fn set_prog_timer_data(&mut self, val: u8) {
        self.prog_timer_data = val;
    }
    fn get_prog_timer_rld(&self) -> u8 {
        self.prog_timer_rld
    }
    fn set_prog_timer_rld(&mut self, val: u8) {
        self.prog_timer_rld = val;
    }

    fn get_call_depth(&self) -> u32 {
        self.call_depth
    }
    fn set_call_depth(&mut self, val: u32) {
        self.call_depth = val;
    }

    fn interrupts(&self) -> &[InterruptSlot] {
        &self.interrupts
    }
    fn interrupts_mut(&mut self) -> &mut [InterruptSlot] {
        &mut self.interrupts
    }

    fn memory(&self) -> &[u8] {
        &self.memory
    }
    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    fn refresh_hardware_state(&mut self) {
        self.refresh_count += 1;
        tracing::debug!("Hardware state refreshed (PC={:#06x})", self.pc);
    }
}
