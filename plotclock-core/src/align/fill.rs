//! Gap handling policies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AlignError;

/// What an aligned column shows where the source has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Leave NaN. A missing bar stays visible as a gap.
    #[serde(alias = "nofill")]
    Gaps,
    /// Hold the last known value across the gap.
    #[serde(alias = "fillnan")]
    Forward,
    /// Align without filling, then interpolate linearly across interior gaps.
    #[serde(alias = "skipnan")]
    Interpolate,
}

impl FillPolicy {
    /// Whether the merge itself holds values forward.
    pub(crate) fn fills_in_merge(self) -> bool {
        matches!(self, Self::Forward)
    }
}

impl FromStr for FillPolicy {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gaps" | "nofill" | "none" => Ok(Self::Gaps),
            "forward" | "ffill" | "fillnan" => Ok(Self::Forward),
            "interpolate" | "linear" | "skipnan" => Ok(Self::Interpolate),
            other => Err(AlignError::UnknownFillPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for FillPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gaps => f.write_str("gaps"),
            Self::Forward => f.write_str("forward"),
            Self::Interpolate => f.write_str("interpolate"),
        }
    }
}

/// Linearly interpolate interior NaN runs of `values` against positions `x`.
///
/// Runs touching either end stay NaN: there is nothing to interpolate
/// towards. `x` must have the same length as `values`.
pub fn interpolate_gaps(values: &mut [f64], x: &[f64]) {
    debug_assert_eq!(values.len(), x.len());
    let n = values.len().min(x.len());
    let mut left: Option<usize> = None;
    let mut i = 0;
    while i < n {
        if !values[i].is_nan() {
            left = Some(i);
            i += 1;
            continue;
        }
        let run_start = i;
        while i < n && values[i].is_nan() {
            i += 1;
        }
        let (Some(l), true) = (left, i < n) else {
            continue;
        };
        let (x0, y0) = (x[l], values[l]);
        let (x1, y1) = (x[i], values[i]);
        let span = x1 - x0;
        for j in run_start..i {
            values[j] = if span > 0.0 {
                y0 + (y1 - y0) * (x[j] - x0) / span
            } else {
                y0
            };
        }
    }
}
