//! Aligned tabular result of one aggregation call.

use chrono::NaiveDateTime;
use chrono_tz::Tz;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AlignError;
use crate::time::{epoch_to_wall, epoch_to_wall_millis};

/// One object line resampled onto the table's grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedColumn {
    /// Unique within the table: `"{object}.{line}"`.
    pub id: String,
    pub object: String,
    pub line: String,
    pub values: Vec<f64>,
}

/// An object that could not be aligned. Its columns are all-NaN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentIssue {
    pub object: String,
    pub reason: String,
}

/// A single row, as pushed to live consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub index: i64,
    pub datetime: f64,
    /// `(column id, value)` in table column order.
    pub values: Vec<(String, f64)>,
}

/// Columns of aligned data plus the mandatory `index` and `datetime` columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignedTable {
    pub index: Vec<i64>,
    /// Clock timestamps, epoch seconds.
    pub datetime: Vec<f64>,
    pub columns: Vec<AlignedColumn>,
    pub issues: Vec<AlignmentIssue>,
    #[serde(skip)]
    pub timezone: Option<Tz>,
}

impl AlignedTable {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn column(&self, id: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.values.as_slice())
    }

    pub fn column_ids(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.id.as_str())
    }

    /// `datetime` converted to the table's wall clock.
    pub fn wall_clock(&self) -> Vec<Option<NaiveDateTime>> {
        self.datetime
            .iter()
            .map(|ts| epoch_to_wall(*ts, self.timezone))
            .collect()
    }

    pub fn row(&self, position: usize) -> Option<Row> {
        let index = *self.index.get(position)?;
        Some(Row {
            index,
            datetime: self.datetime[position],
            values: self
                .columns
                .iter()
                .map(|c| (c.id.clone(), c.values.get(position).copied().unwrap_or(f64::NAN)))
                .collect(),
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.len()).filter_map(|p| self.row(p))
    }

    /// Rows whose `index` is greater than `index`.
    pub fn rows_after(&self, index: i64) -> impl Iterator<Item = Row> + '_ {
        self.rows().filter(move |r| r.index > index)
    }

    /// Export as a polars `DataFrame`: `index`, `datetime` (wall clock, ms)
    /// and one `f64` column per aligned line.
    pub fn to_frame(&self) -> Result<DataFrame, AlignError> {
        let millis: Vec<Option<i64>> = self
            .datetime
            .iter()
            .map(|ts| epoch_to_wall_millis(*ts, self.timezone))
            .collect();

        let mut columns = Vec::with_capacity(self.columns.len() + 2);
        columns.push(Column::new("index".into(), self.index.clone()));
        columns.push(
            Column::new("datetime".into(), millis)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
                .map_err(|e| AlignError::Frame(format!("datetime cast: {e}")))?,
        );
        for column in &self.columns {
            columns.push(Column::new(column.id.as_str().into(), column.values.clone()));
        }

        DataFrame::new(columns).map_err(|e| AlignError::Frame(format!("dataframe creation: {e}")))
    }

    /// Column-oriented JSON object (`{"index": [...], "datetime": [...], id: [...]}`)
    /// as consumed by browser charting data sources. NaN becomes `null` and
    /// `datetime` is wall-clock milliseconds.
    pub fn to_json_columns(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(self.columns.len() + 2);
        map.insert("index".into(), json!(self.index));
        let millis: Vec<Option<i64>> = self
            .datetime
            .iter()
            .map(|ts| epoch_to_wall_millis(*ts, self.timezone))
            .collect();
        map.insert("datetime".into(), json!(millis));
        for column in &self.columns {
            let values: Vec<Option<f64>> = column
                .values
                .iter()
                .map(|v| (!v.is_nan()).then_some(*v))
                .collect();
            map.insert(column.id.clone(), json!(values));
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> AlignedTable {
        AlignedTable {
            index: vec![5, 6, 7],
            datetime: vec![0.0, 60.0, 120.0],
            columns: vec![AlignedColumn {
                id: "data0.close".into(),
                object: "data0".into(),
                line: "close".into(),
                values: vec![1.0, f64::NAN, 3.0],
            }],
            issues: Vec::new(),
            timezone: None,
        }
    }

    #[test]
    fn rows_after_filters_by_index() {
        let t = table();
        let rows: Vec<Row> = t.rows_after(5).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 6);
        assert!(rows[0].values[0].1.is_nan());
        assert_eq!(rows[1].values[0], ("data0.close".to_string(), 3.0));
    }

    #[test]
    fn column_lookup() {
        let t = table();
        assert_eq!(t.column("data0.close").unwrap()[2], 3.0);
        assert!(t.column("data0.open").is_none());
        assert_eq!(t.column_ids().collect::<Vec<_>>(), vec!["data0.close"]);
    }

    #[test]
    fn frame_has_mandatory_columns() {
        let df = table().to_frame().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
        let idx = df.column("index").unwrap().i64().unwrap();
        assert_eq!(idx.get(0), Some(5));
        assert!(matches!(
            df.column("datetime").unwrap().dtype(),
            DataType::Datetime(TimeUnit::Milliseconds, _)
        ));
        let close = df.column("data0.close").unwrap().f64().unwrap();
        assert_eq!(close.get(2), Some(3.0));
    }

    #[test]
    fn json_columns_use_null_for_gaps() {
        let json = table().to_json_columns();
        assert_eq!(json["index"], json!([5, 6, 7]));
        assert_eq!(json["datetime"], json!([0, 60_000, 120_000]));
        assert_eq!(json["data0.close"], json!([1.0, null, 3.0]));
    }

    #[test]
    fn wall_clock_uses_timezone() {
        let mut t = table();
        t.timezone = Some(chrono_tz::Asia::Tokyo);
        let wall = t.wall_clock();
        assert_eq!(wall[1].unwrap().to_string(), "1970-01-01 09:01:00");
    }
}
