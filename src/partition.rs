// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Splitting a dense array into fixed-size blocks.

use std::iter::FusedIterator;

/// One block of a dense array, classified by whether it can be
/// represented by a single repeated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block<'a, T> {
    /// Every entry equals the first one.
    Uniform(&'a T),
    /// At least one entry differs from the first one.
    Mixed(&'a [T]),
}

impl<T> Block<'_, T> {
    pub fn is_uniform(&self) -> bool {
        matches!(self, Block::Uniform(_))
    }
}

/// Iterates over the blocks of `values`, `block_size` entries at a time.
/// The final block holds the remainder if the length isn't a multiple of the block size.
pub struct Blocks<'a, T> {
    chunks: std::slice::Chunks<'a, T>,
}

impl<'a, T: PartialEq> Iterator for Blocks<'a, T> {
    type Item = Block<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks.next().map(classify)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<T: PartialEq> ExactSizeIterator for Blocks<'_, T> {}
impl<T: PartialEq> FusedIterator for Blocks<'_, T> {}

/// # Panics
///
/// Panics if `block_size` is 0.
pub fn blocks<T: PartialEq>(values: &[T], block_size: usize) -> Blocks<'_, T> {
    assert!(block_size > 0, "block size must be non-zero");
    Blocks { chunks: values.chunks(block_size) }
}

/// Number of blocks needed to cover `len` entries.
pub fn block_count(len: usize, block_size: usize) -> usize {
    len.div_ceil(block_size)
}

/// Length of the block at `block`, accounting for a short final block.
pub fn block_len(len: usize, block_size: usize, block: usize) -> usize {
    let start = block * block_size;
    block_size.min(len.saturating_sub(start))
}

fn classify<T: PartialEq>(chunk: &[T]) -> Block<'_, T> {
    let first = &chunk[0];
    if chunk[1..].iter().all(|v| v == first) { Block::Uniform(first) } else { Block::Mixed(chunk) }
}
