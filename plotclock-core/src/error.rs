//! Structured error types for the alignment engine.
//!
//! Only caller bugs and configuration mistakes are errors. Data
//! irregularities (empty series, NaN tails, out-of-range bounds) never reach
//! this type: they are clamped or propagated as NaN.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlignError {
    #[error("clock '{clock}' was queried without an open snapshot")]
    SnapshotNotOpen { clock: String },

    #[error("clock '{clock}' already has an open snapshot")]
    SnapshotAlreadyOpen { clock: String },

    #[error("no clock has been built yet")]
    ClockNotBuilt,

    #[error("unknown fill policy '{0}' (expected gaps, forward or interpolate)")]
    UnknownFillPolicy(String),

    #[error("unknown bucket edge '{0}' (expected left or right)")]
    UnknownBucketEdge(String),

    #[error("line '{line}' is listed in both fillnan and skipnan")]
    ConflictingFillOverride { line: String },

    #[error("object '{object}' has no line named '{line}'")]
    UnknownLine { object: String, line: String },

    #[error("object '{object}' declares line '{line}' twice")]
    DuplicateLine { object: String, line: String },

    #[error("object id '{0}' is used more than once")]
    DuplicateObjectId(String),

    #[error("object id must not be empty")]
    EmptyObjectId,

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("frame export error: {0}")]
    Frame(String),
}
