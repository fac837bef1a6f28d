//! Epoch timestamps <-> wall-clock datetimes.
//!
//! Every timestamp inside the engine is epoch seconds stored as `f64`, so
//! NaN can mark an unpopulated slot. Wall-clock values only appear at the
//! edges: range queries coming in and the `datetime` column going out.

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Convert epoch seconds to a UTC instant. `None` for NaN/inf or out-of-range input.
pub fn epoch_to_utc(ts: f64) -> Option<DateTime<Utc>> {
    if !ts.is_finite() {
        return None;
    }
    let secs = ts.floor();
    let nanos = ((ts - secs) * NANOS_PER_SEC).round() as u32;
    // rounding can carry a full second
    let (secs, nanos) = if nanos >= 1_000_000_000 {
        (secs + 1.0, 0)
    } else {
        (secs, nanos)
    };
    DateTime::from_timestamp(secs as i64, nanos)
}

/// Convert epoch seconds to the wall clock of `tz` (UTC when `None`).
pub fn epoch_to_wall(ts: f64, tz: Option<Tz>) -> Option<NaiveDateTime> {
    let utc = epoch_to_utc(ts)?;
    Some(match tz {
        Some(tz) => utc.with_timezone(&tz).naive_local(),
        None => utc.naive_utc(),
    })
}

/// Convert a wall-clock datetime in `tz` (UTC when `None`) to epoch seconds.
///
/// Ambiguous local times resolve to the earlier instant. Local times that
/// do not exist (spring-forward) move to the first instant after the gap.
pub fn wall_to_epoch(wall: NaiveDateTime, tz: Option<Tz>) -> Option<f64> {
    let utc = match tz {
        None => wall.and_utc(),
        Some(tz) => match tz.from_local_datetime(&wall) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            LocalResult::None => {
                // DST gaps are at most a couple of hours; probe forward minute by minute.
                let mut probe = wall;
                let mut found = None;
                for _ in 0..180 {
                    probe += chrono::Duration::minutes(1);
                    if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
                        found = Some(dt.with_timezone(&Utc));
                        break;
                    }
                }
                found?
            }
        },
    };
    Some(utc_to_epoch(utc))
}

/// Convert a UTC instant to epoch seconds.
pub fn utc_to_epoch(dt: DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / NANOS_PER_SEC
}

/// Epoch seconds -> wall-clock milliseconds, the unit of the exported `datetime` column.
pub(crate) fn epoch_to_wall_millis(ts: f64, tz: Option<Tz>) -> Option<i64> {
    epoch_to_wall(ts, tz).map(|wall| wall.and_utc().timestamp_millis())
}
