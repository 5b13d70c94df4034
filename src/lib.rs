// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Compiles dense per-codepoint property arrays into compact two-level lookup tables.
//!
//! The array is cut into blocks of a fixed size. Blocks whose entries are all equal
//! are stored as a single value, the others are stored verbatim. [`cost`] picks the
//! block size, [`table`] builds and decodes the result, and [`codegen`] and [`persist`]
//! write it out as source code or as bytes respectively.

pub mod apperr;
pub mod codegen;
pub mod cost;
pub mod partition;
pub mod persist;
pub mod table;

pub use apperr::{Error, Result};
pub use cost::{CANDIDATE_BLOCK_SIZES, CostModel, Selection, estimate_cost, select_block_size};
pub use table::BlockTable;

/// The largest Unicode scalar value, and therefore the last index of a codepoint table.
pub const MAX_CODEPOINT: u32 = 0x10FFFF;

/// Number of entries in a table covering every codepoint.
pub const DOMAIN_LEN: usize = MAX_CODEPOINT as usize + 1;
