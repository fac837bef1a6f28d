//! Rate limiting of live realignments.

use std::time::{Duration, Instant};

use crate::config::LiveConfig;

/// Admits at most one realignment per `min_interval`, and only when the
/// clock has grown or a forced refresh is due.
#[derive(Debug, Clone)]
pub struct UpdateThrottle {
    min_interval: Duration,
    force_every: Option<Duration>,
    last_run: Option<Instant>,
    last_len: Option<usize>,
}

impl UpdateThrottle {
    pub fn new(min_interval: Duration, force_every: Option<Duration>) -> Self {
        Self {
            min_interval,
            force_every,
            last_run: None,
            last_len: None,
        }
    }

    pub fn from_config(config: &LiveConfig) -> Self {
        Self::new(config.min_update_interval(), config.force_refresh())
    }

    /// Decide whether to realign at `now` for a clock of `clock_len` ticks.
    /// An admitted call is recorded.
    pub fn admit(&mut self, now: Instant, clock_len: usize) -> bool {
        if let Some(last) = self.last_run {
            let since = now.saturating_duration_since(last);
            if since < self.min_interval {
                return false;
            }
            let advanced = self.last_len != Some(clock_len);
            let forced = self.force_every.is_some_and(|every| since >= every);
            if !advanced && !forced {
                return false;
            }
        }
        self.last_run = Some(now);
        self.last_len = Some(clock_len);
        true
    }

    /// Forget history so the next call is admitted.
    pub fn reset(&mut self) {
        self.last_run = None;
        self.last_len = None;
    }
}
