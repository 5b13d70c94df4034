// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A data-only encoding of [`BlockTable`] for tables that are loaded at runtime
//! instead of being compiled into the consumer.
//!
//! Unlike generated source, the decoder here can't hardcode the block size,
//! so it's part of the header. All integers are little-endian:
//!
//! ```text
//! "BTAB" | version: u16 | value width: u16 | block_size: u32 | len: u32
//! | block_count: u32 | sub_array_count: u32
//! | pointers: [u32; block_count]   (u32::MAX = uniform block)
//! | defaults: [T; block_count]
//! | sub-arrays, back to back, each as long as the block it stands for
//! ```

use crate::apperr::{Error, Result};
use crate::partition::{self, block_len};
use crate::table::BlockTable;

const MAGIC: [u8; 4] = *b"BTAB";
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 4 + 2 + 2 + 4 * 4;
const ABSENT: u32 = u32::MAX;

/// A value with a fixed-size little-endian encoding.
pub trait FixedWidth: Sized {
    const WIDTH: usize;

    fn write_le(&self, out: &mut Vec<u8>);
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_fixed_width {
    ($($ty:ty),*) => {
        $(
            impl FixedWidth for $ty {
                const WIDTH: usize = size_of::<$ty>();

                fn write_le(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0; size_of::<$ty>()];
                    buf.copy_from_slice(&bytes[..size_of::<$ty>()]);
                    <$ty>::from_le_bytes(buf)
                }
            }
        )*
    };
}

impl_fixed_width!(u8, u16, u32, u64, i8, i16, i32, i64);

impl<T: FixedWidth> BlockTable<T> {
    /// Serializes the table, block size included.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let width = u16::try_from(T::WIDTH).map_err(|_| Error::format("value too wide"))?;
        let header_u32 = |v: usize, what: &str| {
            u32::try_from(v).map_err(|_| Error::format(format!("{what} {v} doesn't fit in u32")))
        };

        let mut out = Vec::with_capacity(
            HEADER_SIZE + self.block_count() * (4 + T::WIDTH) + self.stored_values() * T::WIDTH,
        );
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&width.to_le_bytes());
        for (v, what) in [
            (self.block_size(), "block size"),
            (self.len(), "length"),
            (self.block_count(), "block count"),
            (self.sub_arrays().len(), "sub-array count"),
        ] {
            out.extend_from_slice(&header_u32(v, what)?.to_le_bytes());
        }

        for ptr in self.pointers() {
            out.extend_from_slice(&ptr.unwrap_or(ABSENT).to_le_bytes());
        }
        for v in self.defaults() {
            v.write_le(&mut out);
        }
        for sub in self.sub_arrays() {
            for v in sub.iter() {
                v.write_le(&mut out);
            }
        }

        Ok(out)
    }

    /// Parses bytes produced by [`BlockTable::to_bytes`].
    /// The result goes through the same checks as [`BlockTable::from_parts`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader { bytes, off: 0 };

        if r.take(4)? != MAGIC {
            return Err(Error::format("bad magic"));
        }
        let version = r.u16()?;
        if version != VERSION {
            return Err(Error::format(format!("unsupported version {version}")));
        }
        let width = r.u16()? as usize;
        if width != T::WIDTH {
            return Err(Error::format(format!(
                "value width is {width} bytes, expected {}",
                T::WIDTH
            )));
        }

        let block_size = r.u32()? as usize;
        let len = r.u32()? as usize;
        let block_count = r.u32()? as usize;
        let sub_array_count = r.u32()? as usize;
        if block_size == 0 || block_count != partition::block_count(len, block_size) {
            return Err(Error::format(format!(
                "{block_count} blocks don't cover {len} entries with a block size of {block_size}"
            )));
        }

        let mut pointers = Vec::with_capacity(block_count.min(bytes.len() / 4));
        for _ in 0..block_count {
            let ptr = r.u32()?;
            pointers.push((ptr != ABSENT).then_some(ptr));
        }
        let mut defaults = Vec::with_capacity(pointers.len());
        for _ in 0..block_count {
            defaults.push(r.value()?);
        }

        let mut sub_arrays = Vec::with_capacity(sub_array_count.min(pointers.len()));
        for (block, _) in pointers.iter().enumerate().filter(|(_, p)| p.is_some()) {
            let n = block_len(len, block_size, block);
            let mut sub = Vec::with_capacity(n.min(r.remaining() / T::WIDTH.max(1)));
            for _ in 0..n {
                sub.push(r.value()?);
            }
            sub_arrays.push(sub.into_boxed_slice());
        }
        if sub_arrays.len() != sub_array_count {
            return Err(Error::format(format!(
                "header announces {sub_array_count} sub-arrays, found {}",
                sub_arrays.len()
            )));
        }
        if r.off != bytes.len() {
            return Err(Error::format(format!("{} trailing bytes", bytes.len() - r.off)));
        }

        BlockTable::from_parts(block_size, len, pointers, defaults, sub_arrays)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    off: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.off.checked_add(n).filter(|&end| end <= self.bytes.len());
        let Some(end) = end else {
            return Err(Error::format(format!("truncated at offset {}", self.off)));
        };
        let s = &self.bytes[self.off..end];
        self.off = end;
        Ok(s)
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.off
    }

    fn u16(&mut self) -> Result<u16> {
        self.take(2).map(u16::read_le)
    }

    fn u32(&mut self) -> Result<u32> {
        self.take(4).map(u32::read_le)
    }

    fn value<T: FixedWidth>(&mut self) -> Result<T> {
        self.take(T::WIDTH).map(T::read_le)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BlockTable<u16> {
        let values: Vec<u16> =
            (0..1000).map(|i| if (200..300).contains(&i) { (i % 7) as u16 } else { 42 }).collect();
        BlockTable::compile(&values, 64, 0xFFFF).unwrap()
    }

    #[test]
    fn test_header() {
        let bytes = sample().to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"BTAB");
        assert_eq!(u16::read_le(&bytes[4..]), VERSION);
        assert_eq!(u16::read_le(&bytes[6..]), 2);
        assert_eq!(u32::read_le(&bytes[8..]), 64);
        assert_eq!(u32::read_le(&bytes[12..]), 1000);
        assert_eq!(u32::read_le(&bytes[16..]), 16);
    }

    #[test]
    fn test_reload_keeps_block_size() {
        let table = sample();
        let loaded = BlockTable::<u16>::from_bytes(&table.to_bytes().unwrap()).unwrap();
        assert_eq!(loaded, table);
        assert_eq!(loaded.block_size(), 64);
        assert_eq!(loaded.decode(250), Ok(&(250 % 7)));
        assert_eq!(loaded.decode(999), Ok(&42));
    }

    #[test]
    fn test_wrong_width() {
        let bytes = sample().to_bytes().unwrap();
        let err = BlockTable::<u32>::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_truncated() {
        let bytes = sample().to_bytes().unwrap();
        for n in [0, 3, HEADER_SIZE, bytes.len() - 1] {
            assert!(matches!(BlockTable::<u16>::from_bytes(&bytes[..n]), Err(Error::Format(_))));
        }
    }

    fn header(block_size: u32, len: u32, block_count: u32, sub_array_count: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&8u16.to_le_bytes());
        for v in [block_size, len, block_count, sub_array_count] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_huge_block_is_rejected_without_allocating() {
        // One mixed block of u32::MAX entries, with nothing but its default slot behind it.
        let mut bytes = header(u32::MAX, u32::MAX, 1, 1);
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        assert_eq!(bytes.len(), 36);
        assert!(matches!(BlockTable::<u64>::from_bytes(&bytes), Err(Error::Format(_))));
    }

    #[test]
    fn test_block_count_must_match_header() {
        let mut bytes = header(16, 64, 1, 0);
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        assert!(matches!(BlockTable::<u64>::from_bytes(&bytes), Err(Error::Format(_))));

        let bytes = header(0, 64, 0, 0);
        assert!(matches!(BlockTable::<u64>::from_bytes(&bytes), Err(Error::Format(_))));
    }

    #[test]
    fn test_corrupt_pointer() {
        let mut bytes = sample().to_bytes().unwrap();
        // Point the first (uniform) block at a sub-array.
        bytes[HEADER_SIZE..HEADER_SIZE + 4].copy_from_slice(&0u32.to_le_bytes());
        assert!(BlockTable::<u16>::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_signed_values() {
        let values: Vec<i32> = (0..300).map(|i| if i % 50 == 0 { i } else { -1 }).collect();
        let table = BlockTable::compile(&values, 16, -1).unwrap();
        let loaded = BlockTable::<i32>::from_bytes(&table.to_bytes().unwrap()).unwrap();
        assert_eq!(loaded.mismatch(&values), None);
    }
}
