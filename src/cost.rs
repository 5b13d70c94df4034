// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Estimating the encoded size of a table and picking the block size that minimizes it.

use rayon::prelude::*;

use crate::partition::{Block, blocks};

/// The block sizes [`select_block_size`] chooses from.
/// `1` stands for "no compression": every entry is stored on its own.
pub const CANDIDATE_BLOCK_SIZES: [usize; 8] = [1, 16, 32, 64, 128, 256, 512, 1024];

/// Per-block cost of one pointer slot plus one default slot, in cells.
const BLOCK_OVERHEAD: usize = 1;

/// How block sizes are ranked.
pub enum CostModel<'a, T> {
    /// Every value is worth one cell, regardless of its encoded width.
    /// A uniform block costs [`BLOCK_OVERHEAD`], a mixed one costs the full block size on top
    /// of that, even when it is the short final block.
    Cells,
    /// Sizes in bytes. A block costs `slot_bytes` for its pointer slot plus the width of its
    /// default slot, and a mixed block additionally costs the width of every value it stores.
    ///
    /// This ranks tables with wide or variable-length values more accurately than
    /// [`CostModel::Cells`], but it may pick a different block size for the same input.
    Measured { slot_bytes: usize, value_bytes: &'a (dyn Fn(&T) -> usize + Sync) },
}

impl<T> CostModel<'_, T> {
    fn block_cost(&self, block: Block<'_, T>, block_size: usize) -> usize {
        match (self, block) {
            (CostModel::Cells, Block::Uniform(_)) => BLOCK_OVERHEAD,
            (CostModel::Cells, Block::Mixed(_)) => BLOCK_OVERHEAD + block_size,
            (CostModel::Measured { slot_bytes, value_bytes }, Block::Uniform(value)) => {
                slot_bytes + value_bytes(value)
            }
            (CostModel::Measured { slot_bytes, value_bytes }, Block::Mixed(values)) => {
                slot_bytes + value_bytes(&values[0]) + values.iter().map(value_bytes).sum::<usize>()
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CostModel::Cells => "cells",
            CostModel::Measured { .. } => "measured",
        }
    }
}

impl<T> Default for CostModel<'_, T> {
    fn default() -> Self {
        CostModel::Cells
    }
}

/// The outcome of a block size search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub block_size: usize,
    pub cost: usize,
}

/// Estimated size of `values` compressed with `block_size`, in cells.
///
/// # Panics
///
/// Panics if `block_size` is 0.
pub fn estimate_cost<T: PartialEq>(values: &[T], block_size: usize) -> usize {
    estimate_cost_with(values, block_size, &CostModel::Cells)
}

/// Like [`estimate_cost`], but ranked by the given model.
pub fn estimate_cost_with<T: PartialEq>(
    values: &[T],
    block_size: usize,
    model: &CostModel<T>,
) -> usize {
    blocks(values, block_size).map(|b| model.block_cost(b, block_size)).sum()
}

/// Picks the cheapest of [`CANDIDATE_BLOCK_SIZES`] for `values`.
pub fn select_block_size<T: PartialEq + Sync>(values: &[T]) -> usize {
    select_block_size_from(values, &CANDIDATE_BLOCK_SIZES, &CostModel::Cells).block_size
}

/// Evaluates the uncompressed baseline (block size 1) followed by each of `candidates`,
/// in that order, and returns the cheapest. Ties go to whichever size was evaluated first,
/// so the result is reproducible regardless of how the work is scheduled.
///
/// Zero-sized candidates are ignored. The result is always at least 1.
pub fn select_block_size_from<T: PartialEq + Sync>(
    values: &[T],
    candidates: &[usize],
    model: &CostModel<T>,
) -> Selection {
    if values.is_empty() {
        return Selection { block_size: 1, cost: 0 };
    }

    let sizes: Vec<usize> =
        std::iter::once(1).chain(candidates.iter().copied().filter(|&s| s > 0)).collect();

    sizes
        .par_iter()
        .enumerate()
        .map(|(order, &block_size)| {
            let cost = estimate_cost_with(values, block_size, model);
            tracing::debug!(block_size, cost, model = model.name(), "evaluated block size");
            (order, Selection { block_size, cost })
        })
        .min_by_key(|&(order, s)| (s.cost, order))
        .map(|(_, s)| s)
        .unwrap_or(Selection { block_size: 1, cost: values.len() })
}
