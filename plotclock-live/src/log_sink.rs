//! Bridge from `tracing` events to UI-visible log lines.
//!
//! The sink is injected where it is needed: a [`UiLogLayer`] installed on a
//! subscriber forwards events to it, and components can also emit to it
//! directly. [`MessageBuffer`] keeps lines in memory for a UI to poll.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<&Level> for LogLevel {
    fn from(level: &Level) -> Self {
        match *level {
            Level::TRACE => Self::Trace,
            Level::DEBUG => Self::Debug,
            Level::INFO => Self::Info,
            Level::WARN => Self::Warn,
            Level::ERROR => Self::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub level: LogLevel,
    pub target: String,
    pub message: String,
}

impl LogLine {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Receiver of UI log lines.
pub trait LogSink: Send + Sync {
    fn emit(&self, line: LogLine);
}

/// In-memory sink polled by cursor. Keeps the newest `capacity` lines.
#[derive(Debug)]
pub struct MessageBuffer {
    capacity: usize,
    inner: Mutex<BufferInner>,
}

#[derive(Debug, Default)]
struct BufferInner {
    lines: VecDeque<LogLine>,
    /// Lines dropped from the front so far; cursors are absolute.
    dropped: usize,
}

impl MessageBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(BufferInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BufferInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lines emitted at or after `cursor`, and the cursor to poll with next.
    /// Lines already dropped are skipped.
    pub fn messages_since(&self, cursor: usize) -> (Vec<LogLine>, usize) {
        let inner = self.lock();
        let end = inner.dropped + inner.lines.len();
        let skip = cursor.saturating_sub(inner.dropped);
        let lines = inner.lines.iter().skip(skip).cloned().collect();
        (lines, end)
    }

    pub fn len(&self) -> usize {
        self.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl LogSink for MessageBuffer {
    fn emit(&self, line: LogLine) {
        let mut inner = self.lock();
        inner.lines.push_back(line);
        while inner.lines.len() > self.capacity {
            inner.lines.pop_front();
            inner.dropped += 1;
        }
    }
}

/// `tracing` layer forwarding events to a [`LogSink`].
pub struct UiLogLayer<K: ?Sized> {
    sink: Arc<K>,
    targets: Vec<String>,
}

impl<K: LogSink + ?Sized> UiLogLayer<K> {
    pub fn new(sink: Arc<K>) -> Self {
        Self {
            sink,
            targets: Vec::new(),
        }
    }

    /// Only forward events whose target starts with one of `prefixes`.
    pub fn with_targets<I, T>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.targets = prefixes.into_iter().map(Into::into).collect();
        self
    }

    fn accepts(&self, target: &str) -> bool {
        self.targets.is_empty() || self.targets.iter().any(|p| target.starts_with(p.as_str()))
    }
}

impl<S, K> Layer<S> for UiLogLayer<K>
where
    S: Subscriber,
    K: LogSink + ?Sized + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if !self.accepts(meta.target()) {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.sink.emit(LogLine::new(
            LogLevel::from(meta.level()),
            meta.target(),
            visitor.finish(),
        ));
    }
}

/// Renders `message` followed by the remaining fields as `key=value`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::prelude::*;

    #[test]
    fn buffer_cursor_and_capacity() {
        let buffer = MessageBuffer::new(2);
        for i in 0..3 {
            buffer.emit(LogLine::new(LogLevel::Info, "t", format!("line {i}")));
        }
        let (lines, cursor) = buffer.messages_since(0);
        assert_eq!(cursor, 3);
        assert_eq!(
            lines.iter().map(|l| l.message.as_str()).collect::<Vec<_>>(),
            vec!["line 1", "line 2"]
        );
        let (lines, cursor) = buffer.messages_since(cursor);
        assert!(lines.is_empty());
        assert_eq!(cursor, 3);
        buffer.emit(LogLine::new(LogLevel::Warn, "t", "line 3"));
        let (lines, _) = buffer.messages_since(3);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].level, LogLevel::Warn);
    }

    #[test]
    fn layer_forwards_matching_targets() {
        let buffer = Arc::new(MessageBuffer::default());
        let layer = UiLogLayer::new(Arc::clone(&buffer)).with_targets(["plotclock"]);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "plotclock_live::session", rows = 3, "store rebuilt");
            tracing::info!(target: "hyper::proto", "ignored");
        });

        let (lines, _) = buffer.messages_since(0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].level, LogLevel::Warn);
        assert_eq!(lines[0].target, "plotclock_live::session");
        assert_eq!(lines[0].message, "store rebuilt rows=3");
    }

    #[test]
    fn layer_accepts_trait_object_sink() {
        let buffer = Arc::new(MessageBuffer::default());
        let sink: Arc<dyn LogSink> = buffer.clone();
        let subscriber = tracing_subscriber::registry().with(UiLogLayer::new(sink));
        tracing::subscriber::with_default(subscriber, || tracing::info!("hello"));
        assert_eq!(buffer.messages_since(0).0[0].message, "hello");
    }
}
