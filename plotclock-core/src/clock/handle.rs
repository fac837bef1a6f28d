//! Clock construction and the snapshot protocol.

use std::sync::Arc;

use chrono_tz::Tz;
use tracing::{debug, trace};

use super::range::{RangeQuery, Window};
use super::snapshot::ClockSnapshot;
use crate::error::AlignError;
use crate::series::{effective_len, LineBuffer};

/// Owns the sorted, deduplicated index grid derived from one datetime line.
///
/// Reads follow a two-phase protocol:
///
/// 1. [`open_snapshot`](Self::open_snapshot) refreshes the grid from the
///    producer's buffer and freezes it,
/// 2. queries run against the frozen [`ClockSnapshot`],
/// 3. [`close_snapshot`](Self::close_snapshot) drops it and records the last
///    served end index so the next cycle can resume there.
///
/// Any query while no snapshot is open is a caller bug and fails with
/// [`AlignError::SnapshotNotOpen`].
#[derive(Debug)]
pub struct ClockHandle {
    name: String,
    source: LineBuffer,
    tz: Option<Tz>,
    ticks: Vec<f64>,
    raw: Vec<f64>,
    /// Source generation `raw` was read at.
    generation: u64,
    snapshot: Option<Arc<ClockSnapshot>>,
    last_served_end: Option<usize>,
}

impl ClockHandle {
    /// Build the clock from `datetime` (epoch seconds, NaN = unpopulated).
    pub fn build(name: impl Into<String>, datetime: LineBuffer, tz: Option<Tz>) -> Self {
        let mut handle = Self {
            name: name.into(),
            source: datetime,
            tz,
            ticks: Vec::new(),
            raw: Vec::new(),
            generation: 0,
            snapshot: None,
            last_served_end: None,
        };
        handle.rebuild();
        handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timezone(&self) -> Option<Tz> {
        self.tz
    }

    pub fn source(&self) -> &LineBuffer {
        &self.source
    }

    pub fn is_open(&self) -> bool {
        self.snapshot.is_some()
    }

    /// End index recorded by the last `close_snapshot`, if any.
    pub fn last_served_end(&self) -> Option<usize> {
        self.last_served_end
    }

    /// Full rebuild: `sorted(unique(raw[..effective_len]))`.
    fn rebuild(&mut self) {
        let raw = self.source.read();
        let published = effective_len(&raw);
        self.raw = raw[..published].to_vec();
        self.generation = self.source.generation();
        drop(raw);

        let mut ticks: Vec<f64> = self.raw.iter().copied().filter(|t| !t.is_nan()).collect();
        ticks.sort_by(f64::total_cmp);
        ticks.dedup();
        debug!(
            clock = %self.name,
            raw = self.raw.len(),
            ticks = ticks.len(),
            "clock rebuilt"
        );
        self.ticks = ticks;
    }

    /// Bring the grid up to date with the producer's buffer.
    ///
    /// Pure appends at or after the last tick only scan the new slots. A
    /// replaced line, a shrunk line, a rewritten last timestamp or an
    /// out-of-order backfill falls back to a full rebuild.
    ///
    /// Between replacements the producer can only append or overwrite the
    /// buffer's last slot, which is either new or the last slot seen here,
    /// so comparing that one slot covers `set_last`.
    fn refresh(&mut self) {
        let raw = self.source.read();
        let published = effective_len(&raw);
        let seen = self.raw.len();

        let prefix_intact = self.source.generation() == self.generation
            && published >= seen
            && raw[..seen]
                .last()
                .zip(self.raw.last())
                .map_or(true, |(now, before)| now.to_bits() == before.to_bits());
        if !prefix_intact {
            drop(raw);
            self.rebuild();
            return;
        }

        let fresh = &raw[seen..published];
        let last_tick = self.ticks.last().copied().unwrap_or(f64::NEG_INFINITY);
        let in_order = fresh
            .iter()
            .filter(|t| !t.is_nan())
            .try_fold(last_tick, |prev, t| (*t >= prev).then_some(*t))
            .is_some();
        if !in_order {
            drop(raw);
            debug!(clock = %self.name, "out-of-order timestamps, full rebuild");
            self.rebuild();
            return;
        }

        for ts in fresh.iter().copied().filter(|t| !t.is_nan()) {
            if self.ticks.last().map_or(true, |last| ts > *last) {
                self.ticks.push(ts);
            }
        }
        self.raw.extend_from_slice(fresh);
        if !fresh.is_empty() {
            trace!(clock = %self.name, appended = fresh.len(), ticks = self.ticks.len(), "clock extended");
        }
    }

    /// Refresh and freeze the clock for one read burst.
    pub fn open_snapshot(&mut self) -> Result<Arc<ClockSnapshot>, AlignError> {
        if self.snapshot.is_some() {
            return Err(AlignError::SnapshotAlreadyOpen {
                clock: self.name.clone(),
            });
        }
        self.refresh();
        let snapshot = Arc::new(ClockSnapshot::new(
            self.name.clone(),
            self.ticks.as_slice().into(),
            self.raw.as_slice().into(),
            self.tz,
        ));
        self.snapshot = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Drop the snapshot and remember where serving stopped.
    pub fn close_snapshot(&mut self, last_served_end: Option<usize>) -> Result<(), AlignError> {
        if self.snapshot.take().is_none() {
            return Err(AlignError::SnapshotNotOpen {
                clock: self.name.clone(),
            });
        }
        if last_served_end.is_some() {
            self.last_served_end = last_served_end;
        }
        Ok(())
    }

    /// The open snapshot.
    pub fn snapshot(&self) -> Result<&Arc<ClockSnapshot>, AlignError> {
        self.snapshot
            .as_ref()
            .ok_or_else(|| AlignError::SnapshotNotOpen {
                clock: self.name.clone(),
            })
    }

    /// Clock length as seen by the open snapshot.
    pub fn len(&self) -> Result<usize, AlignError> {
        Ok(self.snapshot()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, AlignError> {
        Ok(self.snapshot()?.is_empty())
    }

    /// Resolve `query` on the open snapshot. `Ok(None)` only for an empty clock.
    pub fn resolve_range(&self, query: &RangeQuery) -> Result<Option<Window>, AlignError> {
        Ok(self.snapshot()?.resolve_range(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(raw: Vec<f64>) -> (LineBuffer, ClockHandle) {
        let buffer = LineBuffer::new(raw);
        let clock = ClockHandle::build("data0", buffer.clone(), None);
        (buffer, clock)
    }

    #[test]
    fn build_sorts_and_dedups() {
        let (_, mut clock) = handle(vec![3.0, 1.0, 2.0, 2.0, f64::NAN]);
        let snap = clock.open_snapshot().unwrap();
        assert_eq!(snap.ticks(), &[1.0, 2.0, 3.0]);
        assert_eq!(snap.published_len(), 4);
    }

    #[test]
    fn trailing_nan_truncates_length() {
        let (_, mut clock) = handle(vec![1.0, 2.0, 3.0, f64::NAN]);
        clock.open_snapshot().unwrap();
        assert_eq!(clock.len().unwrap(), 3);

        let (_, mut clock) = handle(vec![1.0, f64::NAN, f64::NAN]);
        clock.open_snapshot().unwrap();
        assert_eq!(clock.len().unwrap(), 1);

        let (_, mut clock) = handle(vec![f64::NAN; 4]);
        clock.open_snapshot().unwrap();
        assert_eq!(clock.len().unwrap(), 0);
    }

    #[test]
    fn queries_require_open_snapshot() {
        let (_, mut clock) = handle(vec![1.0, 2.0]);
        assert!(matches!(clock.len(), Err(AlignError::SnapshotNotOpen { .. })));
        assert!(matches!(
            clock.resolve_range(&RangeQuery::all()),
            Err(AlignError::SnapshotNotOpen { .. })
        ));
        clock.open_snapshot().unwrap();
        assert!(clock.len().is_ok());
        clock.close_snapshot(Some(1)).unwrap();
        assert!(matches!(clock.snapshot(), Err(AlignError::SnapshotNotOpen { .. })));
    }

    #[test]
    fn double_open_and_double_close_are_rejected() {
        let (_, mut clock) = handle(vec![1.0]);
        clock.open_snapshot().unwrap();
        assert!(matches!(
            clock.open_snapshot(),
            Err(AlignError::SnapshotAlreadyOpen { .. })
        ));
        clock.close_snapshot(None).unwrap();
        assert!(matches!(
            clock.close_snapshot(None),
            Err(AlignError::SnapshotNotOpen { .. })
        ));
    }

    #[test]
    fn snapshot_is_frozen_against_appends() {
        let (buffer, mut clock) = handle(vec![1.0, 2.0]);
        let snap = clock.open_snapshot().unwrap();
        buffer.push(3.0);
        assert_eq!(snap.len(), 2);
        assert_eq!(clock.len().unwrap(), 2);
        clock.close_snapshot(Some(1)).unwrap();

        let snap = clock.open_snapshot().unwrap();
        assert_eq!(snap.ticks(), &[1.0, 2.0, 3.0]);
        assert_eq!(clock.last_served_end(), Some(1));
    }

    #[test]
    fn live_placeholder_becomes_visible_once_written() {
        let (buffer, mut clock) = handle(vec![1.0, 2.0, f64::NAN]);
        assert_eq!(clock.open_snapshot().unwrap().len(), 2);
        clock.close_snapshot(None).unwrap();

        buffer.set_last(3.0);
        buffer.push(f64::NAN);
        assert_eq!(clock.open_snapshot().unwrap().ticks(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn rewritten_last_timestamp_triggers_rebuild() {
        let (buffer, mut clock) = handle(vec![10.0, 20.0, 30.0]);
        clock.open_snapshot().unwrap();
        clock.close_snapshot(None).unwrap();

        buffer.set_last(25.0);
        assert_eq!(clock.open_snapshot().unwrap().ticks(), &[10.0, 20.0, 25.0]);
    }

    #[test]
    fn out_of_order_append_triggers_rebuild() {
        let (buffer, mut clock) = handle(vec![10.0, 20.0]);
        clock.open_snapshot().unwrap();
        clock.close_snapshot(None).unwrap();

        buffer.extend([15.0, 30.0, 30.0]);
        let snap = clock.open_snapshot().unwrap();
        assert_eq!(snap.ticks(), &[10.0, 15.0, 20.0, 30.0]);
    }

    #[test]
    fn replaced_buffer_triggers_rebuild() {
        let (buffer, mut clock) = handle(vec![10.0, 20.0, 30.0]);
        clock.open_snapshot().unwrap();
        clock.close_snapshot(None).unwrap();

        buffer.replace(vec![5.0, 6.0]);
        assert_eq!(clock.open_snapshot().unwrap().ticks(), &[5.0, 6.0]);
        clock.close_snapshot(None).unwrap();

        // same length and same last timestamp, interior slot moved
        buffer.replace(vec![10.0, 20.0, 30.0]);
        clock.open_snapshot().unwrap();
        clock.close_snapshot(None).unwrap();
        buffer.replace(vec![10.0, 25.0, 30.0]);
        let snap = clock.open_snapshot().unwrap();
        assert_eq!(snap.ticks(), &[10.0, 25.0, 30.0]);
        assert_eq!(snap.raw_timestamps(), &[10.0, 25.0, 30.0]);
    }
}
