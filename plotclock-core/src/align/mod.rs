//! Single-series alignment: resampling one source onto a clock window.
//!
//! Sources finer than the clock collapse to the most recent value in each
//! bucket. Sources coarser than the clock leave gaps between their points,
//! which stay NaN or get held forward depending on the [`FillPolicy`].
//! Interpolation is a separate pass over the merged output.

pub mod bucket;
pub mod fill;
pub mod merge;

pub use bucket::{Bucket, BucketEdge};
pub use fill::{interpolate_gaps, FillPolicy};
pub use merge::{align_points, align_series, AlignSpec};
