//! plotclock core: clock alignment for multi-timeframe chart data.
//!
//! This crate turns independently sampled time series into one table on a
//! shared index grid:
//! - Clock construction from a growing datetime line, with an explicit
//!   snapshot open/close protocol for live producers
//! - Range resolution from datetime bounds and lookback counts
//! - Two-pointer resampling with left/right-edge buckets
//! - Per-line gap policies: gaps, forward fill, linear interpolation
//! - Multi-object aggregation into an [`AlignedTable`]

pub mod aggregate;
pub mod align;
pub mod clock;
pub mod config;
pub mod error;
pub mod objects;
pub mod series;
pub mod table;
pub mod time;

pub use aggregate::{align_objects, align_query, TableOptions};
pub use align::{align_points, align_series, AlignSpec, BucketEdge, FillPolicy};
pub use clock::{ClockHandle, ClockSet, ClockSnapshot, RangeQuery, Window};
pub use config::EngineConfig;
pub use error::AlignError;
pub use objects::{DerivedSeries, NamedLine, PlotObject, PlotRole, RawSeries, SourceConfig};
pub use series::{effective_len, LineBuffer, TimeSeries};
pub use table::{AlignedColumn, AlignedTable, AlignmentIssue, Row};
