//! Error types for live updates.

use plotclock_core::AlignError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A new row skipped indices. Nothing was stored.
    #[error("gap in live rows: expected index {expected}, got {got}")]
    Gap { expected: i64, got: i64 },
}

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("alignment error: {0}")]
    Align(#[from] AlignError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("config error: {0}")]
    Config(String),
}
