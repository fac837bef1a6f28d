//! Raw time-series data as handed over by a data feed or an indicator.
//!
//! The engine never mutates these. Live producers append through a
//! [`LineBuffer`] handle while the engine reads through another clone of it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Ordered `(timestamp, value)` pairs. Timestamps are epoch seconds.
///
/// Timestamps are expected to be non-decreasing but duplicates and the odd
/// out-of-order backfill are tolerated: [`TimeSeries::sorted_points`] is what
/// the merge consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    timestamps: Vec<f64>,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let (timestamps, values) = pairs.into_iter().unzip();
        Self { timestamps, values }
    }

    /// Build from parallel columns. The longer column is truncated.
    pub fn from_columns(mut timestamps: Vec<f64>, mut values: Vec<f64>) -> Self {
        let n = timestamps.len().min(values.len());
        timestamps.truncate(n);
        values.truncate(n);
        Self { timestamps, values }
    }

    pub fn push(&mut self, timestamp: f64, value: f64) {
        self.timestamps.push(timestamp);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.timestamps
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /// Points with a NaN timestamp removed, stably sorted by timestamp.
    ///
    /// Stability matters: for repeated timestamps the later-written value
    /// stays later, so "most recent value" keeps its meaning.
    pub fn sorted_points(&self) -> Vec<(f64, f64)> {
        let mut points: Vec<(f64, f64)> = self.points().filter(|(ts, _)| !ts.is_nan()).collect();
        if points.windows(2).any(|w| w[1].0 < w[0].0) {
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
        }
        points
    }
}

/// Number of slots up to and including the last non-NaN one.
///
/// Trailing NaNs stand for bars that exist in the backing array but are not
/// populated yet (the live "current bar" placeholder and anything preallocated
/// after it), so they do not count. All-NaN or empty input gives 0.
pub fn effective_len(line: &[f64]) -> usize {
    line.iter()
        .rposition(|v| !v.is_nan())
        .map_or(0, |last_valid| last_valid + 1)
}

/// Shared handle to one growing line: a datetime line or a value line.
///
/// Clones share the same storage. The producer (a strategy loop feeding live
/// bars) writes through one clone; the alignment engine reads through another.
#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    inner: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    values: RwLock<Vec<f64>>,
    /// Bumped under the write lock by every write that may touch slots other
    /// than the last one.
    rewrites: AtomicU64,
}

impl LineBuffer {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            inner: Arc::new(Shared {
                values: RwLock::new(values),
                rewrites: AtomicU64::new(0),
            }),
        }
    }

    /// Read access. A poisoned lock still yields the last written data.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<f64>> {
        self.inner
            .values
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<f64>> {
        self.inner
            .values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of whole-line rewrites so far.
    ///
    /// Appends and [`set_last`](Self::set_last) leave it unchanged, so a
    /// reader holding [`read`](Self::read) that sees the same generation as
    /// before knows every slot except the last one it saw is untouched.
    pub fn generation(&self) -> u64 {
        self.inner.rewrites.load(Ordering::Acquire)
    }

    pub fn push(&self, value: f64) {
        self.write().push(value);
    }

    pub fn extend(&self, values: impl IntoIterator<Item = f64>) {
        self.write().extend(values);
    }

    /// Overwrite the last slot (the in-progress bar). No-op on an empty line.
    pub fn set_last(&self, value: f64) {
        if let Some(last) = self.write().last_mut() {
            *last = value;
        }
    }

    /// Replace the whole line, e.g. after a backfill.
    pub fn replace(&self, values: Vec<f64>) {
        let mut line = self.write();
        *line = values;
        self.inner.rewrites.fetch_add(1, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy of the current contents.
    pub fn to_vec(&self) -> Vec<f64> {
        self.read().clone()
    }
}

impl From<Vec<f64>> for LineBuffer {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}
