//! Bucket intervals owned by clock ticks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AlignError;

/// Which side of its bucket a clock timestamp sits on.
///
/// Feeds that stamp bars with their close time are right-edge: the tick at
/// 10:05 owns `(10:00, 10:05]`. Feeds that stamp with the open time are
/// left-edge: the tick at 10:05 owns `[10:05, 10:10)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketEdge {
    #[default]
    Left,
    Right,
}

impl FromStr for BucketEdge {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "leftedge" => Ok(Self::Left),
            "right" | "rightedge" => Ok(Self::Right),
            other => Err(AlignError::UnknownBucketEdge(other.to_string())),
        }
    }
}

impl fmt::Display for BucketEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

/// Half-open time interval of one clock tick.
///
/// Right-edge buckets are `(start, end]`, left-edge buckets `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub start: f64,
    pub end: f64,
    pub edge: BucketEdge,
}

impl Bucket {
    /// Bucket of tick `index` on sorted, deduplicated `ticks`.
    ///
    /// The missing neighbour at the open end of the clock is replaced by the
    /// nearest gap: the first right-edge bucket borrows the width of the
    /// second gap, the last left-edge bucket that of the last gap. With a
    /// single tick there is no gap to borrow and that side is unbounded.
    pub fn of(ticks: &[f64], index: usize, edge: BucketEdge) -> Self {
        let tick = ticks[index];
        match edge {
            BucketEdge::Right => {
                let start = if index > 0 {
                    ticks[index - 1]
                } else if ticks.len() > 1 {
                    tick - (ticks[1] - ticks[0])
                } else {
                    f64::NEG_INFINITY
                };
                Self {
                    start,
                    end: tick,
                    edge,
                }
            }
            BucketEdge::Left => {
                let end = if index + 1 < ticks.len() {
                    ticks[index + 1]
                } else if index > 0 {
                    tick + (tick - ticks[index - 1])
                } else {
                    f64::INFINITY
                };
                Self {
                    start: tick,
                    end,
                    edge,
                }
            }
        }
    }

    pub fn contains(&self, ts: f64) -> bool {
        match self.edge {
            BucketEdge::Right => self.start < ts && ts <= self.end,
            BucketEdge::Left => self.start <= ts && ts < self.end,
        }
    }

    /// True when `ts` lies entirely before this bucket.
    pub fn precedes(&self, ts: f64) -> bool {
        match self.edge {
            BucketEdge::Right => ts <= self.start,
            BucketEdge::Left => ts < self.start,
        }
    }
}
