// NibSnap - 4-bit Microcontroller Snapshot Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Self-delimited "small number" encoding.
//!
//! A 5-bit header holds `width - 1`, followed by `width` value bits, where
//! `width` is the bit length of the value (1 for zero).

use crate::bitstream::{BitReader, BitWriter};
use crate::SnapResult;
use std::io::{Read, Write};

const WIDTH_BITS: u8 = 5;

/// Bit length of `val`, counting zero as one bit wide.
pub fn bit_width(val: u32) -> u8 {
    (32 - val.leading_zeros()).max(1) as u8
}

/// Total encoded size of `val` in bits.
pub fn encoded_len(val: u32) -> usize {
    usize::from(WIDTH_BITS + bit_width(val))
}

pub fn write<W: Write>(w: &mut BitWriter<W>, val: u32) -> SnapResult<()> {
    let width = bit_width(val);
    w.write(u32::from(width - 1), WIDTH_BITS)?;
    w.write(val, width)
}

pub fn read<R: Read>(r: &mut BitReader<R>) -> SnapResult<u32> {
    let width = r.read(WIDTH_BITS)? as u8 + 1;
    r.read(width)
}
