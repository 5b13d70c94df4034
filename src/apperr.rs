// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::result;

use thiserror::Error;

pub type Result<T> = result::Result<T, Error>;

/// Every variant is a contract violation: a bad index from the caller,
/// a broken input from the array builder, or a broken artifact.
/// None of them are meant to be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("index {index:#x} is out of range for a table of {len:#x} entries")]
    OutOfRange { index: usize, len: usize },
    #[error("cannot compile an empty array")]
    EmptyInput,
    #[error("block size must be at least 1, got {0}")]
    InvalidBlockSize(usize),
    #[error("inconsistent table: {0}")]
    InconsistentArtifact(String),
    #[error("malformed table data: {0}")]
    Format(String),
}

impl Error {
    pub(crate) fn inconsistent(msg: impl Into<String>) -> Self {
        Self::InconsistentArtifact(msg.into())
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }
}
