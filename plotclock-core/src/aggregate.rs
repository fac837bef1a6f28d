//! Multi-object aggregation: every plotted object onto one shared grid.

use std::collections::HashSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::align::align_series;
use crate::clock::{ClockSet, ClockSnapshot, RangeQuery, Window};
use crate::error::AlignError;
use crate::objects::PlotObject;
use crate::table::{AlignedColumn, AlignedTable, AlignmentIssue};

/// Output options of one aggregation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOptions {
    /// Emit absolute clock positions in the `index` column instead of
    /// positions relative to the window start.
    #[serde(default)]
    pub preserve_index: bool,
}

impl TableOptions {
    pub fn preserving_index() -> Self {
        Self {
            preserve_index: true,
        }
    }
}

/// Align every object onto `window` of the primary clock.
///
/// Each object is resampled against its own clock's open snapshot; only
/// the output grid is shared. An object whose clock is not registered is
/// reported in `issues` and gets all-NaN columns. Duplicate object ids and
/// closed snapshots are errors.
pub fn align_objects(
    objects: &[PlotObject],
    clocks: &ClockSet,
    window: Window,
    options: TableOptions,
) -> Result<AlignedTable, AlignError> {
    check_unique_ids(objects)?;
    let target = clocks.primary()?.snapshot()?;

    let per_object: Vec<Result<ObjectColumns, AlignError>> = objects
        .par_iter()
        .map(|object| align_one(object, clocks, target, window))
        .collect();

    let mut table = AlignedTable {
        index: target.index_list(window, options.preserve_index),
        datetime: window
            .indices()
            .map(|i| target.tick(i).unwrap_or(f64::NAN))
            .collect(),
        columns: Vec::new(),
        issues: Vec::new(),
        timezone: target.timezone(),
    };
    for result in per_object {
        let aligned = result?;
        if let Some(issue) = aligned.issue {
            warn!(object = %issue.object, reason = %issue.reason, "object not aligned");
            table.issues.push(issue);
        }
        table.columns.extend(aligned.columns);
    }

    debug!(
        clock = %target.name(),
        start = window.start,
        end = window.end,
        columns = table.columns.len(),
        "objects aligned"
    );
    Ok(table)
}

/// Resolve `query` on the primary clock and align every object onto it.
///
/// An empty primary clock yields an empty table.
pub fn align_query(
    objects: &[PlotObject],
    clocks: &ClockSet,
    query: &RangeQuery,
    options: TableOptions,
) -> Result<AlignedTable, AlignError> {
    let target = clocks.primary()?.snapshot()?;
    match target.resolve_range(query) {
        Some(window) => align_objects(objects, clocks, window, options),
        None => {
            check_unique_ids(objects)?;
            Ok(AlignedTable {
                timezone: target.timezone(),
                ..AlignedTable::default()
            })
        }
    }
}

fn check_unique_ids(objects: &[PlotObject]) -> Result<(), AlignError> {
    let mut seen = HashSet::new();
    for object in objects {
        if !seen.insert(object.id()) {
            return Err(AlignError::DuplicateObjectId(object.id().to_string()));
        }
    }
    Ok(())
}

struct ObjectColumns {
    columns: Vec<AlignedColumn>,
    issue: Option<AlignmentIssue>,
}

fn align_one(
    object: &PlotObject,
    clocks: &ClockSet,
    target: &ClockSnapshot,
    window: Window,
) -> Result<ObjectColumns, AlignError> {
    let Some(own) = clocks.resolve(object.clock()) else {
        let clock = object.clock().unwrap_or("<primary>");
        return Ok(ObjectColumns {
            columns: nan_columns(object, window.len()),
            issue: Some(AlignmentIssue {
                object: object.id().to_string(),
                reason: format!("unknown clock '{clock}'"),
            }),
        });
    };
    let own = own.snapshot()?;

    let config = object.config();
    let columns = object
        .lines()
        .iter()
        .map(|line| {
            let values = line.buffer.read();
            AlignedColumn {
                id: object.column_id(&line.name),
                object: object.id().to_string(),
                line: line.name.clone(),
                values: align_series(&values, own, target, window, config.spec_for(&line.name)),
            }
        })
        .collect();
    Ok(ObjectColumns {
        columns,
        issue: None,
    })
}

fn nan_columns(object: &PlotObject, len: usize) -> Vec<AlignedColumn> {
    object
        .lines()
        .iter()
        .map(|line| AlignedColumn {
            id: object.column_id(&line.name),
            object: object.id().to_string(),
            line: line.name.clone(),
            values: vec![f64::NAN; len],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockHandle;
    use crate::objects::{DerivedSeries, NamedLine, RawSeries, SourceConfig};
    use crate::series::LineBuffer;

    fn clocks() -> ClockSet {
        let primary = ClockHandle::build("m1", LineBuffer::new(vec![0.0, 60.0, 120.0]), None);
        let mut set = ClockSet::new(primary);
        set.open_all().unwrap();
        set
    }

    fn feed(id: &str) -> PlotObject {
        RawSeries::new(
            id,
            "m1",
            vec![NamedLine::new("close", vec![1.0, 2.0, 3.0])],
            SourceConfig::bars(),
        )
        .unwrap()
        .into()
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let set = clocks();
        let err = align_objects(&[feed("a"), feed("a")], &set, Window::new(0, 2), TableOptions::default())
            .unwrap_err();
        assert!(matches!(err, AlignError::DuplicateObjectId(id) if id == "a"));
    }

    #[test]
    fn closed_clock_is_an_error() {
        let mut set = clocks();
        set.close_all(None).unwrap();
        let err = align_objects(&[feed("a")], &set, Window::new(0, 2), TableOptions::default())
            .unwrap_err();
        assert!(matches!(err, AlignError::SnapshotNotOpen { .. }));
    }

    #[test]
    fn unknown_clock_is_isolated() {
        let set = clocks();
        let orphan: PlotObject = DerivedSeries::new(
            "sma",
            Some("h1".into()),
            vec![NamedLine::new("sma", vec![5.0])],
            SourceConfig::indicator(),
        )
        .unwrap()
        .into();
        let table = align_objects(&[orphan, feed("a")], &set, Window::new(0, 2), TableOptions::default())
            .unwrap();
        assert_eq!(table.issues.len(), 1);
        assert_eq!(table.issues[0].object, "sma");
        assert!(table.column("sma.sma").unwrap().iter().all(|v| v.is_nan()));
        assert_eq!(table.column("a.close").unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn index_and_datetime_columns() {
        let set = clocks();
        let table = align_objects(&[feed("a")], &set, Window::new(1, 2), TableOptions::preserving_index())
            .unwrap();
        assert_eq!(table.index, vec![1, 2]);
        assert_eq!(table.datetime, vec![60.0, 120.0]);
        let table = align_objects(&[feed("a")], &set, Window::new(1, 2), TableOptions::default())
            .unwrap();
        assert_eq!(table.index, vec![0, 1]);
    }

    #[test]
    fn empty_clock_query_gives_empty_table() {
        let mut set = ClockSet::new(ClockHandle::build("m1", LineBuffer::new(vec![f64::NAN]), None));
        set.open_all().unwrap();
        let table = align_query(&[feed("a")], &set, &RangeQuery::all(), TableOptions::default()).unwrap();
        assert!(table.is_empty());
        assert!(table.columns.is_empty());
    }
}
