//! Range resolution: datetime bounds / lookback count -> index window.
//!
//! Both bounds use a lower-bound search (`first i with clock[i] >= t`).
//! For the end bound that means a query ending exactly on a tick includes
//! that tick, and a query ending between two ticks includes the *next*
//! tick as well. Consumers that want end-exclusive semantics must step back
//! themselves; see DESIGN.md.

use chrono::NaiveDateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::time::wall_to_epoch;

/// Inclusive index range into a clock. Always non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    /// Build a window, swapping the bounds if given in reverse.
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Number of clock ticks covered (`end - start + 1`).
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index <= self.end
    }

    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// A caller's window request. All parts optional; the default is full history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeQuery {
    /// Epoch seconds.
    pub start: Option<f64>,
    /// Epoch seconds.
    pub end: Option<f64>,
    /// Number of most recent ticks ending at `end`. Overrides `start`.
    pub lookback: Option<usize>,
}

impl RangeQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn last(lookback: usize) -> Self {
        Self {
            lookback: Some(lookback),
            ..Self::default()
        }
    }

    pub fn between(start: f64, end: f64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            lookback: None,
        }
    }

    pub fn from(start: f64) -> Self {
        Self {
            start: Some(start),
            ..Self::default()
        }
    }

    pub fn until(end: f64) -> Self {
        Self {
            end: Some(end),
            ..Self::default()
        }
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = Some(lookback);
        self
    }

    /// Build a query from wall-clock bounds interpreted in `tz` (UTC when `None`).
    pub fn from_wall(
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        lookback: Option<usize>,
        tz: Option<Tz>,
    ) -> Self {
        Self {
            start: start.and_then(|w| wall_to_epoch(w, tz)),
            end: end.and_then(|w| wall_to_epoch(w, tz)),
            lookback,
        }
    }
}

/// Index of the first tick `>= target` (`ticks.len()` when none).
pub(crate) fn lower_bound(ticks: &[f64], target: f64) -> usize {
    ticks.partition_point(|t| *t < target)
}

/// Resolve `query` against sorted, deduplicated `ticks`.
///
/// Total for any input: bounds past the data clamp to the last tick, a start
/// after the end collapses onto the end, a lookback longer than the data
/// stops at index 0. Only an empty clock yields `None`. A NaN bound or a
/// lookback of 0 counts as "not given".
pub fn resolve_range(ticks: &[f64], query: &RangeQuery) -> Option<Window> {
    let len = ticks.len();
    if len == 0 {
        return None;
    }
    let last = len - 1;

    let end = match query.end.filter(|t| !t.is_nan()) {
        Some(t) => lower_bound(ticks, t).min(last),
        None => last,
    };
    let start = match query.lookback.filter(|n| *n > 0) {
        Some(lookback) => (end + 1).saturating_sub(lookback),
        None => match query.start.filter(|t| !t.is_nan()) {
            Some(t) => lower_bound(ticks, t).min(last),
            None => 0,
        },
    };

    Some(Window {
        start: start.min(end),
        end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICKS: [f64; 5] = [100.0, 200.0, 300.0, 400.0, 500.0];

    #[test]
    fn defaults_to_full_history() {
        assert_eq!(
            resolve_range(&TICKS, &RangeQuery::all()),
            Some(Window { start: 0, end: 4 })
        );
    }

    #[test]
    fn empty_clock_has_no_window() {
        assert_eq!(resolve_range(&[], &RangeQuery::all()), None);
        assert_eq!(resolve_range(&[], &RangeQuery::last(10)), None);
    }

    #[test]
    fn start_is_lower_bound() {
        let w = resolve_range(&TICKS, &RangeQuery::from(150.0)).unwrap();
        assert_eq!(w.start, 1);
        let w = resolve_range(&TICKS, &RangeQuery::from(200.0)).unwrap();
        assert_eq!(w.start, 1);
    }

    #[test]
    fn end_on_tick_is_inclusive() {
        let w = resolve_range(&TICKS, &RangeQuery::until(300.0)).unwrap();
        assert_eq!(w.end, 2);
    }

    #[test]
    fn end_between_ticks_includes_next_tick() {
        // lower-bound policy: 250 resolves to the tick at 300
        let w = resolve_range(&TICKS, &RangeQuery::until(250.0)).unwrap();
        assert_eq!(w.end, 2);
    }

    #[test]
    fn out_of_range_bounds_clamp() {
        let w = resolve_range(&TICKS, &RangeQuery::between(900.0, 1000.0)).unwrap();
        assert_eq!(w, Window { start: 4, end: 4 });
        let w = resolve_range(&TICKS, &RangeQuery::between(0.0, 50.0)).unwrap();
        assert_eq!(w, Window { start: 0, end: 0 });
    }

    #[test]
    fn lookback_overrides_start() {
        let q = RangeQuery::between(100.0, 400.0).with_lookback(2);
        let w = resolve_range(&TICKS, &q).unwrap();
        assert_eq!(w, Window { start: 2, end: 3 });
    }

    #[test]
    fn lookback_longer_than_clock_clamps_to_zero() {
        let w = resolve_range(&TICKS[..3], &RangeQuery::last(10)).unwrap();
        assert_eq!(w, Window { start: 0, end: 2 });
    }

    #[test]
    fn zero_lookback_is_ignored() {
        let w = resolve_range(&TICKS, &RangeQuery::last(0)).unwrap();
        assert_eq!(w, Window { start: 0, end: 4 });
    }

    #[test]
    fn start_after_end_collapses() {
        let w = resolve_range(&TICKS, &RangeQuery::between(450.0, 150.0)).unwrap();
        assert_eq!(w, Window { start: 1, end: 1 });
    }

    #[test]
    fn window_len_and_contains() {
        let w = Window::new(5, 2);
        assert_eq!(w, Window { start: 2, end: 5 });
        assert_eq!(w.len(), 4);
        assert!(w.contains(2) && w.contains(5));
        assert!(!w.contains(6));
        assert_eq!(w.indices().count(), 4);
    }
}
