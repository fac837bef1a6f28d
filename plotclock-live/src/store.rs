//! Bounded row store mirrored to a live chart.
//!
//! Rows are keyed by absolute clock index. A freshly aligned table is
//! diffed against the store: rows already held become patches carrying only
//! their changed columns, rows past the end become adds.

use std::collections::VecDeque;

use plotclock_core::{AlignedTable, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::StoreError;

/// One change to push to the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RowUpdate {
    Add(Row),
    Patch {
        index: i64,
        values: Vec<(String, f64)>,
    },
}

impl RowUpdate {
    pub fn index(&self) -> i64 {
        match self {
            Self::Add(row) => row.index,
            Self::Patch { index, .. } => *index,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiveStore {
    lookback: usize,
    rows: VecDeque<Row>,
}

impl LiveStore {
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback: lookback.max(1),
            rows: VecDeque::new(),
        }
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_index(&self) -> Option<i64> {
        self.rows.front().map(|r| r.index)
    }

    pub fn last_index(&self) -> Option<i64> {
        self.rows.back().map(|r| r.index)
    }

    pub fn get(&self, index: i64) -> Option<&Row> {
        self.position(index).map(|p| &self.rows[p])
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    fn position(&self, index: i64) -> Option<usize> {
        self.rows.binary_search_by_key(&index, |r| r.index).ok()
    }

    /// Replace the contents with the newest `lookback` rows of `table`.
    pub fn fill(&mut self, table: &AlignedTable) {
        let skip = table.len().saturating_sub(self.lookback);
        self.rows = table.rows().skip(skip).collect();
        debug!(
            rows = self.rows.len(),
            first = ?self.first_index(),
            last = ?self.last_index(),
            "live store filled"
        );
    }

    /// Merge `table` into the store and return the resulting updates.
    ///
    /// A new row must directly follow the last stored one. On a gap nothing
    /// is stored and the caller should realign from [`Self::last_index`].
    pub fn apply(&mut self, table: &AlignedTable) -> Result<Vec<RowUpdate>, StoreError> {
        let mut updates = Vec::new();
        let mut next = self.last_index().map(|i| i + 1);
        let first = self.first_index();

        for row in table.rows() {
            if let Some(pos) = self.position(row.index) {
                let changed = changed_values(&self.rows[pos], &row);
                if !changed.is_empty() {
                    updates.push(RowUpdate::Patch {
                        index: row.index,
                        values: changed,
                    });
                }
            } else if first.is_some_and(|f| row.index < f) {
                trace!(index = row.index, "row already scrolled out, skipped");
            } else {
                if let Some(expected) = next {
                    if row.index > expected {
                        return Err(StoreError::Gap {
                            expected,
                            got: row.index,
                        });
                    }
                }
                next = Some(row.index + 1);
                updates.push(RowUpdate::Add(row));
            }
        }

        for update in &updates {
            match update {
                RowUpdate::Patch { index, values } => {
                    if let Some(pos) = self.position(*index) {
                        patch_row(&mut self.rows[pos], values);
                    }
                }
                RowUpdate::Add(row) => self.rows.push_back(row.clone()),
            }
        }
        while self.rows.len() > self.lookback {
            self.rows.pop_front();
        }
        if !updates.is_empty() {
            trace!(updates = updates.len(), last = ?self.last_index(), "live store updated");
        }
        Ok(updates)
    }
}

fn value_of<'a>(row: &'a Row, id: &str) -> Option<&'a f64> {
    row.values.iter().find(|(c, _)| c == id).map(|(_, v)| v)
}

/// Non-NaN values of `fresh` that differ from `stored`.
fn changed_values(stored: &Row, fresh: &Row) -> Vec<(String, f64)> {
    fresh
        .values
        .iter()
        .filter(|(_, v)| !v.is_nan())
        .filter(|(id, v)| value_of(stored, id).map_or(true, |old| old.to_bits() != v.to_bits()))
        .cloned()
        .collect()
}

fn patch_row(row: &mut Row, values: &[(String, f64)]) {
    for (id, value) in values {
        match row.values.iter_mut().find(|(c, _)| c == id) {
            Some(slot) => slot.1 = *value,
            None => row.values.push((id.clone(), *value)),
        }
    }
}
