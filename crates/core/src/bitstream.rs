// NibSnap - 4-bit Microcontroller Snapshot Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! LSB-first bit streams over byte-oriented storage.
//!
//! Byte-aligned multi-byte reads and writes come out little-endian, which is
//! what the Legacy layout relies on.

use crate::{SnapResult, SnapshotError};
use std::io::{ErrorKind, Read, Write};

fn low_mask(bits: u8) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

pub struct BitWriter<W: Write> {
    inner: W,
    buf: u32,
    filled: u8,
    bytes_written: usize,
}

impl<W: Write> BitWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: 0,
            filled: 0,
            bytes_written: 0,
        }
    }

    /// Append the low `num_bits` of `value`. `num_bits` must not exceed 32.
    pub fn write(&mut self, value: u32, num_bits: u8) -> SnapResult<()> {
        debug_assert!(num_bits <= 32, "bit count {} out of range", num_bits);
        let value = value & low_mask(num_bits);
        let mut done = 0u8;
        while done < num_bits {
            let take = (num_bits - done).min(8 - self.filled);
            let chunk = (value >> done) & low_mask(take);
            self.buf |= chunk << self.filled;
            self.filled += take;
            done += take;
            if self.filled == 8 {
                self.emit()?;
            }
        }
        Ok(())
    }

    /// Zero-pad and emit a partial trailing byte, then flush the sink.
    pub fn flush(&mut self) -> SnapResult<()> {
        if self.filled > 0 {
            self.emit()?;
        }
        self.inner.flush()?;
        Ok(())
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn emit(&mut self) -> SnapResult<()> {
        self.inner.write_all(&[self.buf as u8])?;
        self.bytes_written += 1;
        self.buf = 0;
        self.filled = 0;
        Ok(())
    }
}

pub struct BitReader<R: Read> {
    inner: R,
    buf: u32,
    avail: u8,
    bytes_read: usize,
}

impl<R: Read> BitReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: 0,
            avail: 0,
            bytes_read: 0,
        }
    }

    pub fn read(&mut self, num_bits: u8) -> SnapResult<u32> {
        debug_assert!(num_bits <= 32, "bit count {} out of range", num_bits);
        let mut val = 0u32;
        let mut done = 0u8;
        while done < num_bits {
            if self.avail == 0 {
                self.fill()?;
            }
            let take = (num_bits - done).min(self.avail);
            val |= (self.buf & low_mask(take)) << done;
            self.buf >>= take;
            self.avail -= take;
            done += take;
        }
        Ok(val)
    }

    pub fn read_bool(&mut self) -> SnapResult<bool> {
        Ok(self.read(1)? == 1)
    }

    /// Bits still buffered from the last byte pulled from storage.
    pub fn buffered_bits(&self) -> u8 {
        self.avail
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    /// True once the underlying storage has no more bytes.
    ///
    /// Buffered bits are not considered; only call this on a byte boundary.
    pub fn at_end(&mut self) -> SnapResult<bool> {
        match self.fill() {
            Ok(()) => Ok(false),
            Err(SnapshotError::Truncated { .. }) => Ok(true),
            Err(e) => Err(e),
        }
    }

    fn fill(&mut self) -> SnapResult<()> {
        let mut byte = [0u8; 1];
        match self.inner.read_exact(&mut byte) {
            Ok(()) => {
                self.buf = u32::from(byte[0]);
                self.avail = 8;
                self.bytes_read += 1;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(SnapshotError::Truncated {
                offset: self.bytes_read,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(f: impl FnOnce(&mut BitWriter<&mut Vec<u8>>)) -> Vec<u8> {
        let mut out = Vec::new();
        let mut w = BitWriter::new(&mut out);
        f(&mut w);
        w.flush().unwrap();
        out
    }

    #[test]
    fn test_lsb_first_packing() {
        // 1, then 0b011, then 0b1111 -> 0b1111_011_1 = 0xF7
        let out = written(|w| {
            w.write(1, 1).unwrap();
            w.write(0b011, 3).unwrap();
            w.write(0xF, 4).unwrap();
        });
        assert_eq!(out, vec![0xF7]);
    }

    #[test]
    fn test_flush_pads_with_zeros() {
        let out = written(|w| w.write(0b101, 3).unwrap());
        assert_eq!(out, vec![0b0000_0101]);
    }

    #[test]
    fn test_flush_on_boundary_emits_nothing_extra() {
        let out = written(|w| w.write(0xAB, 8).unwrap());
        assert_eq!(out, vec![0xAB]);
    }

    #[test]
    fn test_aligned_words_are_little_endian() {
        let out = written(|w| {
            w.write(0x1234, 16).unwrap();
            w.write(0xDEAD_BEEF, 32).unwrap();
        });
        assert_eq!(out, vec![0x34, 0x12, 0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_write_masks_excess_bits() {
        let out = written(|w| w.write(0xFF, 4).unwrap());
        assert_eq!(out, vec![0x0F]);
    }

    #[test]
    fn test_read_spans_byte_boundaries() {
        let data = written(|w| {
            w.write(0x1ABC, 13).unwrap();
            w.write(1, 1).unwrap();
            w.write(0x3FF_FFFF, 26).unwrap();
            w.write(0, 0).unwrap();
            w.write(0xCAFE_F00D, 32).unwrap();
        });
        let mut r = BitReader::new(data.as_slice());
        assert_eq!(r.read(13).unwrap(), 0x1ABC);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read(26).unwrap(), 0x3FF_FFFF);
        assert_eq!(r.read(0).unwrap(), 0);
        assert_eq!(r.read(32).unwrap(), 0xCAFE_F00D);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "bit count 33 out of range")]
    fn test_oversized_write_panics_in_debug() {
        written(|w| w.write(0, 33).unwrap());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "bit count 40 out of range")]
    fn test_oversized_read_panics_in_debug() {
        let _ = BitReader::new(&[0u8; 8][..]).read(40);
    }

    #[test]
    fn test_read_past_end_fails() {
        let data = [0xFFu8];
        let mut r = BitReader::new(&data[..]);
        assert_eq!(r.read(6).unwrap(), 0x3F);
        let err = r.read(3).unwrap_err();
        assert!(matches!(err, SnapshotError::Truncated { offset: 1 }));
    }

    #[test]
    fn test_byte_counters() {
        let mut out = Vec::new();
        let mut w = BitWriter::new(&mut out);
        w.write(0, 9).unwrap();
        assert_eq!(w.bytes_written(), 1);
        w.flush().unwrap();
        assert_eq!(w.bytes_written(), 2);

        let mut r = BitReader::new(out.as_slice());
        r.read(1).unwrap();
        assert_eq!(r.bytes_read(), 1);
        assert_eq!(r.buffered_bits(), 7);
        r.read(7).unwrap();
        assert!(!r.at_end().unwrap());
        assert_eq!(r.bytes_read(), 2);
    }

    #[test]
    fn test_at_end_on_exhausted_stream() {
        let data = [0x01u8];
        let mut r = BitReader::new(&data[..]);
        r.read(8).unwrap();
        assert!(r.at_end().unwrap());
    }
}
