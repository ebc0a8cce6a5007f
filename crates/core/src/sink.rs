//! Message sink abstraction
//!
//! The resolver never decides how its messages are shown. It reports through
//! three independent channels (error, informational, verbose) and the
//! embedding application chooses what to do with them.

use parking_lot::Mutex;

/// Receiver for resolver messages
///
/// Thread safety: implementations are shared between every thread that
/// resolves paths (requires Send + Sync).
pub trait MessageSink: Send + Sync {
    /// A failure the caller should know about
    fn error(&self, message: &str);

    /// A notable lifecycle event
    fn info(&self, message: &str);

    /// Diagnostic detail
    fn verbose(&self, message: &str);
}

/// Forwards messages to `tracing` under the `snapvol::fs` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn error(&self, message: &str) {
        tracing::error!(target: "snapvol::fs", "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "snapvol::fs", "{}", message);
    }

    fn verbose(&self, message: &str) {
        tracing::debug!(target: "snapvol::fs", "{}", message);
    }
}

/// Discards every message
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MessageSink for NullSink {
    fn error(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn verbose(&self, _message: &str) {}
}

/// Channel a collected message arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    /// `MessageSink::error`
    Error,
    /// `MessageSink::info`
    Info,
    /// `MessageSink::verbose`
    Verbose,
}

/// Keeps every message in memory, in arrival order
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<(MessageLevel, String)>>,
}

impl CollectingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages received so far
    pub fn messages(&self) -> Vec<(MessageLevel, String)> {
        self.messages.lock().clone()
    }

    /// Messages received on one channel
    pub fn messages_at(&self, level: MessageLevel) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Number of error messages received so far
    pub fn error_count(&self) -> usize {
        self.messages
            .lock()
            .iter()
            .filter(|(l, _)| *l == MessageLevel::Error)
            .count()
    }

    fn push(&self, level: MessageLevel, message: &str) {
        self.messages.lock().push((level, message.to_string()));
    }
}

impl MessageSink for CollectingSink {
    fn error(&self, message: &str) {
        self.push(MessageLevel::Error, message);
    }

    fn info(&self, message: &str) {
        self.push(MessageLevel::Info, message);
    }

    fn verbose(&self, message: &str) {
        self.push(MessageLevel::Verbose, message);
    }
}
