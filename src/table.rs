// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The compiled two-level table.
//!
//! A dense array is cut into blocks of `block_size` entries. Each block gets one slot in
//! the pointer table and one slot in the default table:
//! * a uniform block leaves its pointer slot empty and stores its value in the default slot,
//! * a mixed block gets its own sub-array, referenced from the pointer slot,
//!   while the default slot holds a placeholder that is never read.

use std::fmt;
use std::ops::Index;

use crate::apperr::{Error, Result};
use crate::cost::select_block_size;
use crate::partition::{Block, block_count, block_len, blocks};

#[derive(Clone, PartialEq, Eq)]
pub struct BlockTable<T> {
    block_size: usize,
    len: usize,
    pointers: Vec<Option<u32>>,
    defaults: Vec<T>,
    sub_arrays: Vec<Box<[T]>>,
}

impl<T: Clone + PartialEq + Sync> BlockTable<T> {
    /// Selects the cheapest block size for `values` and compiles them with it.
    pub fn build(values: &[T], placeholder: T) -> Result<Self> {
        Self::compile(values, select_block_size(values), placeholder)
    }
}

impl<T: Clone + PartialEq> BlockTable<T> {
    /// Compiles `values` using the given `block_size`.
    ///
    /// `placeholder` is written into the default slot of every mixed block.
    pub fn compile(values: &[T], block_size: usize, placeholder: T) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::EmptyInput);
        }
        if block_size == 0 {
            return Err(Error::InvalidBlockSize(block_size));
        }

        let count = block_count(values.len(), block_size);
        let mut pointers = Vec::with_capacity(count);
        let mut defaults = Vec::with_capacity(count);
        let mut sub_arrays = Vec::new();

        for block in blocks(values, block_size) {
            match block {
                Block::Uniform(value) => {
                    pointers.push(None);
                    defaults.push(value.clone());
                }
                Block::Mixed(chunk) => {
                    let index = u32::try_from(sub_arrays.len())
                        .map_err(|_| Error::inconsistent("too many sub-arrays"))?;
                    pointers.push(Some(index));
                    defaults.push(placeholder.clone());
                    sub_arrays.push(Box::from(chunk));
                }
            }
        }

        Self::from_parts(block_size, values.len(), pointers, defaults, sub_arrays)
    }
}

impl<T> BlockTable<T> {
    /// Assembles a table from its parts, checking every structural invariant.
    ///
    /// Sub-arrays must be referenced exactly once, in increasing block order,
    /// and must be exactly as long as the block they stand for.
    pub fn from_parts(
        block_size: usize,
        len: usize,
        pointers: Vec<Option<u32>>,
        defaults: Vec<T>,
        sub_arrays: Vec<Box<[T]>>,
    ) -> Result<Self> {
        if len == 0 {
            return Err(Error::EmptyInput);
        }
        if block_size == 0 {
            return Err(Error::InvalidBlockSize(block_size));
        }

        let count = block_count(len, block_size);
        if pointers.len() != count {
            return Err(Error::inconsistent(format!(
                "expected {count} pointer slots, got {}",
                pointers.len()
            )));
        }
        if defaults.len() != pointers.len() {
            return Err(Error::inconsistent(format!(
                "{} pointer slots but {} default slots",
                pointers.len(),
                defaults.len()
            )));
        }

        let mut next = 0usize;
        for (block, ptr) in pointers.iter().enumerate() {
            let Some(ptr) = *ptr else { continue };
            let ptr = ptr as usize;
            if ptr != next {
                return Err(Error::inconsistent(format!(
                    "block {block} references sub-array {ptr}, expected {next}"
                )));
            }
            let Some(sub) = sub_arrays.get(ptr) else {
                return Err(Error::inconsistent(format!(
                    "block {block} references missing sub-array {ptr}"
                )));
            };
            let expected = block_len(len, block_size, block);
            if sub.len() != expected {
                return Err(Error::inconsistent(format!(
                    "sub-array of block {block} has {} entries, expected {expected}",
                    sub.len()
                )));
            }
            next += 1;
        }
        if next != sub_arrays.len() {
            return Err(Error::inconsistent(format!(
                "{} sub-arrays but only {next} are referenced",
                sub_arrays.len()
            )));
        }

        Ok(Self { block_size, len, pointers, defaults, sub_arrays })
    }

    /// Returns the value at `index`.
    #[inline]
    pub fn decode(&self, index: usize) -> Result<&T> {
        if index >= self.len {
            return Err(Error::OutOfRange { index, len: self.len });
        }
        let block = index / self.block_size;
        match self.pointers[block] {
            Some(ptr) => Ok(&self.sub_arrays[ptr as usize][index % self.block_size]),
            None => Ok(&self.defaults[block]),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of entries the table covers.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of blocks, which is also the length of both the pointer and the default table.
    pub fn block_count(&self) -> usize {
        self.pointers.len()
    }

    pub fn pointers(&self) -> &[Option<u32>] {
        &self.pointers
    }

    pub fn defaults(&self) -> &[T] {
        &self.defaults
    }

    pub fn sub_arrays(&self) -> &[Box<[T]>] {
        &self.sub_arrays
    }

    /// The sub-array of `block`, if it is a mixed one.
    pub fn sub_array(&self, block: usize) -> Option<&[T]> {
        let ptr = (*self.pointers.get(block)?)?;
        Some(&self.sub_arrays[ptr as usize])
    }

    /// Number of values stored across all sub-arrays.
    pub fn stored_values(&self) -> usize {
        self.sub_arrays.iter().map(|s| s.len()).sum()
    }
}

impl<T: PartialEq> BlockTable<T> {
    /// Decodes every index and compares it against the dense input.
    /// Returns the first index that doesn't round-trip.
    pub fn mismatch(&self, expected: &[T]) -> Option<usize> {
        if expected.len() != self.len {
            return Some(expected.len().min(self.len));
        }
        expected.iter().enumerate().position(|(i, v)| self.decode(i).ok() != Some(v))
    }
}

impl<T> Index<usize> for BlockTable<T> {
    type Output = T;

    /// # Panics
    ///
    /// Panics if `index` is out of range.
    fn index(&self, index: usize) -> &T {
        match self.decode(index) {
            Ok(v) => v,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T> fmt::Debug for BlockTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BlockTable")
            .field("block_size", &self.block_size)
            .field("len", &self.len)
            .field("blocks", &self.pointers.len())
            .field("sub_arrays", &self.sub_arrays.len())
            .finish()
    }
}
