//! Live update cycles over a growing set of clocks.
//!
//! Every cycle runs the snapshot protocol end to end: open all clocks,
//! resolve the window, align, close with the served end as checkpoint, then
//! diff the table into the store. The next cycle starts at that checkpoint,
//! so the last served bar is realigned and patched if it changed.

use std::sync::Arc;
use std::time::Instant;

use plotclock_core::{
    align_objects, effective_len, AlignedTable, ClockSet, ClockSnapshot, PlotObject, TableOptions,
    Window,
};
use tracing::{debug, trace, warn};

use crate::config::LiveConfig;
use crate::error::{LiveError, StoreError};
use crate::log_sink::{LogLevel, LogLine, LogSink};
use crate::store::{LiveStore, RowUpdate};
use crate::throttle::UpdateThrottle;

pub struct LiveSession {
    clocks: ClockSet,
    objects: Vec<PlotObject>,
    store: LiveStore,
    throttle: UpdateThrottle,
    sink: Option<Arc<dyn LogSink>>,
    paused: bool,
    /// The shown window ends at the newest tick.
    following: bool,
}

impl LiveSession {
    pub fn new(
        clocks: ClockSet,
        objects: Vec<PlotObject>,
        config: &LiveConfig,
    ) -> Result<Self, LiveError> {
        config.validate()?;
        Ok(Self {
            clocks,
            objects,
            store: LiveStore::new(config.lookback),
            throttle: UpdateThrottle::from_config(config),
            sink: None,
            paused: false,
            following: true,
        })
    }

    /// Send rebuild notices to a UI-visible sink as well as to `tracing`.
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn store(&self) -> &LiveStore {
        &self.store
    }

    pub fn clocks(&self) -> &ClockSet {
        &self.clocks
    }

    pub fn clocks_mut(&mut self) -> &mut ClockSet {
        &mut self.clocks
    }

    pub fn objects(&self) -> &[PlotObject] {
        &self.objects
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_following(&self) -> bool {
        self.following
    }

    /// Fill the store with the newest `lookback` ticks.
    pub fn initial(&mut self) -> Result<&LiveStore, LiveError> {
        let lookback = self.store.lookback();
        let table = self.cycle(|snap, _| newest(snap, lookback))?;
        self.store.fill(&table);
        self.following = true;
        Ok(&self.store)
    }

    /// Run one incremental cycle if the throttle admits it.
    pub fn poll(&mut self, now: Instant) -> Result<Vec<RowUpdate>, LiveError> {
        if self.paused || !self.following {
            return Ok(Vec::new());
        }
        let published = effective_len(&self.clocks.primary()?.source().read());
        if !self.throttle.admit(now, published) {
            trace!(published, "live update throttled");
            return Ok(Vec::new());
        }

        let lookback = self.store.lookback();
        let table = self.cycle(|snap, checkpoint| {
            let last = snap.len().checked_sub(1)?;
            match checkpoint {
                Some(start) => Some(Window::new(start.min(last), last)),
                None => newest(snap, lookback),
            }
        })?;

        match self.store.apply(&table) {
            Ok(updates) => Ok(updates),
            Err(StoreError::Gap { expected, got }) => {
                self.notify(
                    LogLevel::Warn,
                    format!("live rows jumped from {expected} to {got}, rebuilding"),
                );
                self.rebuild_from(expected - 1)
            }
        }
    }

    /// Stop applying polls.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume following the newest tick. The store is refilled.
    pub fn resume(&mut self) -> Result<&LiveStore, LiveError> {
        self.paused = false;
        self.throttle.reset();
        self.initial()
    }

    /// Show the `lookback` ticks ending at `end_index`.
    ///
    /// `end_index` is clamped so the window is full when enough data exists
    /// and never passes the newest tick. Seeking to the newest tick resumes
    /// following.
    pub fn seek(&mut self, end_index: usize) -> Result<&LiveStore, LiveError> {
        let lookback = self.store.lookback();
        let mut at_newest = true;
        let table = self.cycle(|snap, _| {
            let last = snap.len().checked_sub(1)?;
            let end = end_index.max(lookback - 1).min(last);
            at_newest = end == last;
            Some(Window::new((end + 1).saturating_sub(lookback), end))
        })?;
        self.store.fill(&table);
        self.following = at_newest;
        debug!(end_index, following = self.following, "live session seeked");
        Ok(&self.store)
    }

    fn rebuild_from(&mut self, start: i64) -> Result<Vec<RowUpdate>, LiveError> {
        let start = usize::try_from(start).unwrap_or(0);
        let table = self.cycle(|snap, _| {
            let last = snap.len().checked_sub(1)?;
            Some(Window::new(start.min(last), last))
        })?;
        Ok(self.store.apply(&table)?)
    }

    /// One open → align → close pass. The snapshot is closed even when
    /// alignment fails. An empty primary clock yields an empty table.
    fn cycle<F>(&mut self, choose: F) -> Result<AlignedTable, LiveError>
    where
        F: FnOnce(&ClockSnapshot, Option<usize>) -> Option<Window>,
    {
        let checkpoint = self.clocks.primary()?.last_served_end();
        let snapshot = self.clocks.open_all()?;

        let window = choose(snapshot.as_ref(), checkpoint);
        let aligned = match window {
            Some(window) => align_objects(
                &self.objects,
                &self.clocks,
                window,
                TableOptions::preserving_index(),
            ),
            None => Ok(AlignedTable::default()),
        };
        let served = aligned.as_ref().ok().and(window).map(|w| w.end);
        self.clocks.close_all(served)?;

        let table = aligned?;
        for issue in &table.issues {
            self.notify(
                LogLevel::Warn,
                format!("{} not plotted: {}", issue.object, issue.reason),
            );
        }
        trace!(rows = table.len(), checkpoint = ?served, "live cycle done");
        Ok(table)
    }

    fn notify(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Warn | LogLevel::Error => warn!("{message}"),
            _ => debug!("{message}"),
        }
        if let Some(sink) = &self.sink {
            sink.emit(LogLine::new(level, module_path!(), message));
        }
    }
}

fn newest(snap: &ClockSnapshot, lookback: usize) -> Option<Window> {
    let last = snap.len().checked_sub(1)?;
    Some(Window::new((last + 1).saturating_sub(lookback), last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotclock_core::{ClockHandle, LineBuffer, NamedLine, RawSeries, SourceConfig};

    fn session(ticks: Vec<f64>, lookback: usize) -> LiveSession {
        let n = ticks.len();
        let clock = ClockHandle::build("m1", LineBuffer::new(ticks), None);
        let feed = RawSeries::new(
            "data0",
            "m1",
            vec![NamedLine::new("close", (0..n).map(|i| i as f64).collect::<Vec<_>>())],
            SourceConfig::bars(),
        )
        .unwrap();
        let config = LiveConfig {
            lookback,
            ..LiveConfig::default()
        };
        LiveSession::new(ClockSet::new(clock), vec![feed.into()], &config).unwrap()
    }

    #[test]
    fn initial_fills_lookback_rows() {
        let mut s = session((0..10).map(|i| i as f64 * 60.0).collect(), 4);
        let store = s.initial().unwrap();
        assert_eq!(store.first_index(), Some(6));
        assert_eq!(store.last_index(), Some(9));
        assert_eq!(s.clocks().primary().unwrap().last_served_end(), Some(9));
        assert!(!s.clocks().primary().unwrap().is_open());
    }

    #[test]
    fn empty_clock_gives_empty_store() {
        let mut s = session(vec![f64::NAN], 4);
        assert!(s.initial().unwrap().is_empty());
        assert!(s.poll(Instant::now()).unwrap().is_empty());
    }

    #[test]
    fn seek_clamps_and_stops_following() {
        let mut s = session((0..10).map(|i| i as f64 * 60.0).collect(), 4);
        s.initial().unwrap();
        let store = s.seek(1).unwrap();
        assert_eq!(store.first_index(), Some(0));
        assert_eq!(store.last_index(), Some(3));
        assert!(!s.is_following());
        assert!(s.poll(Instant::now()).unwrap().is_empty());

        s.seek(100).unwrap();
        assert!(s.is_following());
        assert_eq!(s.store().last_index(), Some(9));
    }

    #[test]
    fn pause_blocks_polls_until_resume() {
        let mut s = session((0..5).map(|i| i as f64 * 60.0).collect(), 3);
        s.initial().unwrap();
        s.pause();
        assert!(s.is_paused());
        assert!(s.poll(Instant::now()).unwrap().is_empty());
        s.resume().unwrap();
        assert!(!s.is_paused());
        assert_eq!(s.store().last_index(), Some(4));
    }

    #[test]
    fn config_is_validated() {
        let clock = ClockHandle::build("m1", LineBuffer::new(vec![0.0]), None);
        let config = LiveConfig {
            lookback: 0,
            ..LiveConfig::default()
        };
        assert!(matches!(
            LiveSession::new(ClockSet::new(clock), Vec::new(), &config),
            Err(LiveError::Config(_))
        ));
    }
}
