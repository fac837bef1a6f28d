//! Immutable read view of a clock.

use std::sync::Arc;

use chrono::NaiveDateTime;
use chrono_tz::Tz;

use super::range::{resolve_range, RangeQuery, Window};
use crate::align::bucket::{Bucket, BucketEdge};
use crate::time::epoch_to_wall;

/// Frozen copy of a clock taken when a snapshot is opened.
///
/// All index queries of one update cycle run against the same snapshot, so a
/// producer appending live bars in the meantime cannot be observed half-way.
#[derive(Debug, Clone)]
pub struct ClockSnapshot {
    name: String,
    ticks: Arc<[f64]>,
    raw: Arc<[f64]>,
    tz: Option<Tz>,
}

impl ClockSnapshot {
    pub(crate) fn new(name: String, ticks: Arc<[f64]>, raw: Arc<[f64]>, tz: Option<Tz>) -> Self {
        Self {
            name,
            ticks,
            raw,
            tz,
        }
    }

    /// Snapshot over an already sorted, deduplicated tick list. Mostly for tests
    /// and for callers that keep their own index grid.
    pub fn from_ticks(name: impl Into<String>, ticks: Vec<f64>, tz: Option<Tz>) -> Self {
        let ticks: Arc<[f64]> = ticks.into();
        Self {
            name: name.into(),
            raw: Arc::clone(&ticks),
            ticks,
            tz,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Clock length: number of distinct published ticks.
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn ticks(&self) -> &[f64] {
        &self.ticks
    }

    pub fn tick(&self, index: usize) -> Option<f64> {
        self.ticks.get(index).copied()
    }

    pub fn first(&self) -> Option<f64> {
        self.ticks.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.ticks.last().copied()
    }

    /// The raw datetime line up to its effective length, in producer order.
    ///
    /// Lines owned by this clock are indexed by these positions, not by tick
    /// positions: duplicates and out-of-order entries are still in here.
    pub fn raw_timestamps(&self) -> &[f64] {
        &self.raw
    }

    /// Effective length of the raw datetime line.
    pub fn published_len(&self) -> usize {
        self.raw.len()
    }

    pub fn timezone(&self) -> Option<Tz> {
        self.tz
    }

    pub fn resolve_range(&self, query: &RangeQuery) -> Option<Window> {
        resolve_range(&self.ticks, query)
    }

    /// Bucket owned by tick `index`. Panics if `index` is out of range.
    pub fn bucket(&self, index: usize, edge: BucketEdge) -> Bucket {
        Bucket::of(&self.ticks, index, edge)
    }

    /// Integer index column for `window`: absolute clock positions when
    /// `preserve` is set, otherwise 0-based.
    pub fn index_list(&self, window: Window, preserve: bool) -> Vec<i64> {
        let offset = if preserve { 0 } else { window.start };
        window.indices().map(|i| (i - offset) as i64).collect()
    }

    /// Tick timestamps covered by `window`.
    pub fn window_ticks(&self, window: Window) -> &[f64] {
        &self.ticks[window.start..=window.end]
    }

    /// Wall-clock datetimes for `window` in the snapshot's timezone.
    pub fn datetimes(&self, window: Window) -> Vec<Option<NaiveDateTime>> {
        self.window_ticks(window)
            .iter()
            .map(|ts| epoch_to_wall(*ts, self.tz))
            .collect()
    }

    /// Interval of time covered by the buckets of `window`, bounds included.
    pub(crate) fn window_span(&self, window: Window, edge: BucketEdge) -> (f64, f64) {
        let first = self.bucket(window.start, edge);
        let last = self.bucket(window.end, edge);
        (first.start, last.end)
    }
}
