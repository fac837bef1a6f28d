//! plotclock live: streaming chart updates on top of the alignment engine.
//!
//! - [`LiveStore`]: bounded rows keyed by absolute clock index, diffed into
//!   add/patch updates
//! - [`LiveSession`]: snapshot-bracketed update cycles with checkpoint
//!   resumption, gap rebuilds, pause/resume and seeking
//! - [`UpdateThrottle`]: rate limiting of realignments
//! - [`log_sink`]: injected UI log sink and the `tracing` layer feeding it

pub mod config;
pub mod error;
pub mod log_sink;
pub mod session;
pub mod store;
pub mod throttle;

pub use config::LiveConfig;
pub use error::{LiveError, StoreError};
pub use log_sink::{LogLevel, LogLine, LogSink, MessageBuffer, UiLogLayer};
pub use session::LiveSession;
pub use store::{LiveStore, RowUpdate};
pub use throttle::UpdateThrottle;
