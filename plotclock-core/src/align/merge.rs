//! Two-pointer merge of a source series onto a target clock window.

use serde::{Deserialize, Serialize};

use super::bucket::BucketEdge;
use super::fill::{interpolate_gaps, FillPolicy};
use crate::clock::{ClockSnapshot, Window};
use crate::series::TimeSeries;

/// How one source line is resampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignSpec {
    pub edge: BucketEdge,
    pub fill: FillPolicy,
}

impl AlignSpec {
    pub fn new(edge: BucketEdge, fill: FillPolicy) -> Self {
        Self { edge, fill }
    }
}

/// Resample `points` onto `window` of `target`, one value per tick.
///
/// Each tick takes the most recent non-NaN source value inside its bucket.
/// Empty buckets are NaN, or hold the last value seen when `fill_forward`.
/// A right-edge bucket ending after the last source timestamp has not
/// closed yet: its points are held back and it reads as empty, or as the
/// last value of a closed bucket when `fill_forward`.
///
/// The output always has `window.len()` entries; indices past the end of
/// the clock read as NaN.
pub fn align_points(
    points: &TimeSeries,
    target: &ClockSnapshot,
    window: Window,
    edge: BucketEdge,
    fill_forward: bool,
) -> Vec<f64> {
    let points = points.sorted_points();
    let source_end = points.last().map_or(f64::NEG_INFINITY, |(ts, _)| *ts);
    merge(&points, source_end, target, window, edge, fill_forward)
}

/// `source_end` is the last timestamp of the whole source, which may lie
/// past the end of `points` when the caller pre-sliced them.
fn merge(
    points: &[(f64, f64)],
    source_end: f64,
    target: &ClockSnapshot,
    window: Window,
    edge: BucketEdge,
    fill_forward: bool,
) -> Vec<f64> {
    let mut out = Vec::with_capacity(window.len());
    let mut cursor = 0;
    let mut last_valid = f64::NAN;
    // points past the last closed right-edge bucket never reach the output
    let limit = match edge {
        BucketEdge::Right => settled_until(target, source_end),
        BucketEdge::Left => f64::INFINITY,
    };

    for index in window.indices() {
        if index >= target.len() {
            out.push(f64::NAN);
            continue;
        }
        let bucket = target.bucket(index, edge);

        while cursor < points.len()
            && bucket.precedes(points[cursor].0)
            && points[cursor].0 <= limit
        {
            let value = points[cursor].1;
            if !value.is_nan() {
                last_valid = value;
            }
            cursor += 1;
        }

        if edge == BucketEdge::Right && bucket.end > source_end {
            out.push(if fill_forward { last_valid } else { f64::NAN });
            continue;
        }

        let mut value = f64::NAN;
        while cursor < points.len() && bucket.contains(points[cursor].0) {
            let current = points[cursor].1;
            if !current.is_nan() {
                value = current;
                last_valid = current;
            }
            cursor += 1;
        }

        if value.is_nan() && fill_forward {
            value = last_valid;
        }
        out.push(value);
    }
    out
}

/// End of the last right-edge bucket closed by a source ending at
/// `source_end`: the newest tick at or before it.
fn settled_until(target: &ClockSnapshot, source_end: f64) -> f64 {
    let ticks = target.ticks();
    let closed = ticks.partition_point(|t| *t <= source_end);
    ticks[..closed].last().copied().unwrap_or(f64::NEG_INFINITY)
}

/// Align one line owned by clock `own` onto `window` of `target`.
///
/// The line is indexed by the raw positions of its own clock's datetime
/// line. A line longer or shorter than its clock is clamped to the shorter of
/// the two, and only points inside the window's covered interval take part.
pub fn align_series(
    values: &[f64],
    own: &ClockSnapshot,
    target: &ClockSnapshot,
    window: Window,
    spec: AlignSpec,
) -> Vec<f64> {
    if target.is_empty() {
        return vec![f64::NAN; window.len()];
    }
    let last = target.len() - 1;
    let covered = Window::new(window.start.min(last), window.end.min(last));
    let (lo, hi) = target.window_span(covered, spec.edge);

    let raw = own.raw_timestamps();
    let n = raw.len().min(values.len());
    let mut points: Vec<(f64, f64)> = raw[..n]
        .iter()
        .copied()
        .zip(values[..n].iter().copied())
        .filter(|(ts, _)| !ts.is_nan())
        .collect();
    if points.windows(2).any(|w| w[1].0 < w[0].0) {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
    }

    let source_end = points.last().map_or(f64::NEG_INFINITY, |(ts, _)| *ts);

    // Keep one point before the window so forward fill can start from it.
    // Right-edge fill never holds a point from a bucket that is still open.
    let first_inside = points.partition_point(|(ts, _)| match spec.edge {
        BucketEdge::Right => *ts <= lo,
        BucketEdge::Left => *ts < lo,
    });
    let held_end = match spec.edge {
        BucketEdge::Right => {
            let bound = lo.min(settled_until(target, source_end));
            points.partition_point(|(ts, _)| *ts <= bound)
        }
        BucketEdge::Left => first_inside,
    };
    let keep_from = points[..held_end]
        .iter()
        .rposition(|(_, v)| !v.is_nan())
        .unwrap_or(first_inside);
    let past_end = points.partition_point(|(ts, _)| match spec.edge {
        BucketEdge::Right => *ts <= hi,
        BucketEdge::Left => *ts < hi,
    });
    let slice = &points[keep_from..past_end.max(keep_from)];

    let fill_forward = spec.fill.fills_in_merge();
    let mut aligned = merge(slice, source_end, target, window, spec.edge, fill_forward);
    if spec.fill == FillPolicy::Interpolate && window.end <= last {
        interpolate_gaps(&mut aligned, target.window_ticks(window));
    }
    aligned
}
