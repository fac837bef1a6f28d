//! Clocks: the common index grid every series is aligned onto.
//!
//! A clock is the sorted, deduplicated timestamp sequence of one datetime
//! line. Its length ignores trailing unpopulated (NaN) slots, so a live feed
//! that preallocates the current bar does not grow the grid early.

pub mod handle;
pub mod range;
pub mod set;
pub mod snapshot;

pub use handle::ClockHandle;
pub use range::{resolve_range, RangeQuery, Window};
pub use set::ClockSet;
pub use snapshot::ClockSnapshot;
