// NibSnap - 4-bit Microcontroller Snapshot Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Run-length coding for mostly-zero nibble memory.
//!
//! Each token starts with a tag bit: `1` is followed by one literal nibble,
//! `0` by a varint holding `zero_run_len - 1`.

use crate::bitstream::{BitReader, BitWriter};
use crate::{varint, SnapResult, SnapshotError};
use std::io::{Read, Write};

const TAG_LITERAL: u32 = 1;
const TAG_ZERO_RUN: u32 = 0;

pub fn encode<W: Write>(w: &mut BitWriter<W>, cells: &[u8]) -> SnapResult<()> {
    let mut i = 0;
    while i < cells.len() {
        let nibble = cells[i] & 0xF;
        if nibble != 0 {
            w.write(TAG_LITERAL, 1)?;
            w.write(u32::from(nibble), 4)?;
            i += 1;
            continue;
        }

        let run = cells[i..].iter().take_while(|&&c| c & 0xF == 0).count();
        w.write(TAG_ZERO_RUN, 1)?;
        varint::write(w, (run - 1) as u32)?;
        i += run;
    }
    Ok(())
}

/// Fill `cells` completely from the stream.
///
/// A zero run reaching past the end of `cells` is rejected as corrupt input.
pub fn decode<R: Read>(r: &mut BitReader<R>, cells: &mut [u8]) -> SnapResult<()> {
    let mut i = 0;
    while i < cells.len() {
        if r.read(1)? == TAG_LITERAL {
            cells[i] = r.read(4)? as u8;
            i += 1;
            continue;
        }

        let run = (varint::read(r)? as usize).saturating_add(1);
        let remaining = cells.len() - i;
        if run > remaining {
            return Err(SnapshotError::CorruptInput {
                index: i,
                reason: "zero run exceeds memory size",
            });
        }
        cells[i..i + run].fill(0);
        i += run;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode_to_vec(cells: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut w = BitWriter::new(&mut out);
        encode(&mut w, cells).unwrap();
        w.flush().unwrap();
        out
    }

    fn decode_from(bytes: &[u8], len: usize) -> SnapResult<Vec<u8>> {
        let mut cells = vec![0xEE; len];
        decode(&mut BitReader::new(bytes), &mut cells)?;
        Ok(cells)
    }

    #[test]
    fn test_all_zero_is_one_token() {
        let cells = vec![0u8; 4096];
        let bytes = encode_to_vec(&cells);
        // tag + varint(4095): 1 + 5 + 12 bits
        assert_eq!(bytes.len(), 3);

        let mut r = BitReader::new(bytes.as_slice());
        assert_eq!(r.read(1).unwrap(), TAG_ZERO_RUN);
        assert_eq!(varint::read(&mut r).unwrap(), 4095);

        assert_eq!(decode_from(&bytes, 4096).unwrap(), cells);
    }

    #[test]
    fn test_all_nonzero() {
        let cells: Vec<u8> = (0..256).map(|i| (i % 15 + 1) as u8).collect();
        let bytes = encode_to_vec(&cells);
        // five bits per literal
        assert_eq!(bytes.len(), 256 * 5 / 8);
        assert_eq!(decode_from(&bytes, cells.len()).unwrap(), cells);
    }

    #[test]
    fn test_alternating() {
        let cells: Vec<u8> = (0..101).map(|i| if i % 2 == 0 { 0 } else { 0x9 }).collect();
        let bytes = encode_to_vec(&cells);
        assert_eq!(decode_from(&bytes, cells.len()).unwrap(), cells);
    }

    #[test]
    fn test_single_literal_in_zeros() {
        let mut cells = vec![0u8; 64];
        cells[10] = 0xA;
        let bytes = encode_to_vec(&cells);
        assert_eq!(decode_from(&bytes, cells.len()).unwrap(), cells);
    }

    #[test]
    fn test_high_bits_are_ignored() {
        let bytes = encode_to_vec(&[0x10, 0xF3]);
        assert_eq!(decode_from(&bytes, 2).unwrap(), vec![0x0, 0x3]);
    }

    #[test]
    fn test_empty_memory() {
        assert!(encode_to_vec(&[]).is_empty());
        assert_eq!(decode_from(&[], 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_run_past_end_is_corrupt() {
        let bytes = encode_to_vec(&[0u8; 32]);
        let err = decode_from(&bytes, 16).unwrap_err();
        assert!(matches!(err, SnapshotError::CorruptInput { index: 0, .. }));
    }

    #[test]
    fn test_run_past_end_after_literals_is_corrupt() {
        let mut cells = vec![0u8; 20];
        cells[0] = 1;
        cells[1] = 2;
        let bytes = encode_to_vec(&cells);
        let err = decode_from(&bytes, 10).unwrap_err();
        assert!(matches!(err, SnapshotError::CorruptInput { index: 2, .. }));
    }

    #[test]
    fn test_truncated_stream() {
        let cells: Vec<u8> = vec![0x5; 16];
        let bytes = encode_to_vec(&cells);
        let err = decode_from(&bytes[..bytes.len() - 2], 16).unwrap_err();
        assert!(matches!(err, SnapshotError::Truncated { .. }));
    }

    proptest! {
        #[test]
        fn property_round_trip(cells in proptest::collection::vec(
            prop_oneof![3 => Just(0u8), 1 => 1u8..16], 0..512)) {
            let bytes = encode_to_vec(&cells);
            prop_assert_eq!(decode_from(&bytes, cells.len()).unwrap(), cells);
        }
    }
}
