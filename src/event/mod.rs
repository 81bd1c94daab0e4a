//! Session events and diagnostics.
//!
//! The host publishes what happens on the link as [`Event`]s. Subscribers
//! receive them over a broadcast channel; registered [`DiagnosticSink`]s get
//! one text line per event.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::broadcast;

use crate::commands::TransferReport;
use crate::protocol::Command;
use crate::types::DeviceInfo;

/// Number of lines kept by [`MessageLog`].
pub const MESSAGE_LOG_CAPACITY: usize = 25;

/// Event types that can be dispatched.
#[derive(Debug, Clone)]
pub enum Event {
    /// A session started on the given interface.
    Connected(DeviceInfo),
    /// The session ended.
    Disconnected,
    /// A command frame was decoded.
    CommandReceived(Command),
    /// The inbound stream was resynchronized after a protocol error.
    Resynced { discarded: usize, reason: String },
    /// A block transfer finished.
    TransferCompleted(TransferReport),
    /// Free-form diagnostic text.
    Diagnostic(String),
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(info) => write!(f, "connected: {} {}", info.version, info.description),
            Self::Disconnected => f.write_str("nowind disconnected!"),
            Self::CommandReceived(command) => write!(f, "{command}"),
            Self::Resynced { discarded, reason } => {
                write!(f, "{reason}, {discarded} bytes removed")
            }
            Self::TransferCompleted(report) => write!(
                f,
                "transfer of {} bytes in {} blocks, {} rounds, {} retransmissions",
                report.bytes, report.blocks, report.rounds, report.retransmissions
            ),
            Self::Diagnostic(line) => f.write_str(line),
        }
    }
}

/// Receiver of human-readable diagnostic lines.
pub trait DiagnosticSink: Send + Sync {
    /// Appends one line.
    fn append_line(&self, line: &str);
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event, skipping over lag.
    ///
    /// Returns `None` once every dispatcher is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("event subscriber lagged, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}

struct EventDispatcherInner {
    sender: broadcast::Sender<Event>,
    sinks: RwLock<Vec<Arc<dyn DiagnosticSink>>>,
}

/// Dispatches events to subscribers and diagnostic sinks.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(EventDispatcherInner {
                sender,
                sinks: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Registers a sink that receives every event as a text line.
    pub fn add_sink(&self, sink: Arc<dyn DiagnosticSink>) {
        self.inner
            .sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    /// Dispatches an event to all subscribers and sinks.
    pub fn dispatch(&self, event: Event) {
        {
            let sinks = self
                .inner
                .sinks
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if !sinks.is_empty() {
                let line = event.to_string();
                for sink in sinks.iter() {
                    sink.append_line(&line);
                }
            }
        }
        // No subscribers is fine
        let _ = self.inner.sender.send(event);
    }

    /// Dispatches a free-form diagnostic line.
    pub fn diagnostic(&self, line: impl Into<String>) {
        self.dispatch(Event::Diagnostic(line.into()));
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscribers", &self.inner.sender.receiver_count())
            .finish_non_exhaustive()
    }
}

/// Keeps the most recent diagnostic lines, oldest first.
#[derive(Debug)]
pub struct MessageLog {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl MessageLog {
    /// Creates a log holding [`MESSAGE_LOG_CAPACITY`] lines.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MESSAGE_LOG_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Returns a copy of the retained lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticSink for MessageLog {
    fn append_line(&self, line: &str) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.to_owned());
    }
}

/// Forwards diagnostic lines to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn append_line(&self, line: &str) {
        tracing::info!(target: "nowind::diagnostic", "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_dispatch() {
        let dispatcher = EventDispatcher::new(16);
        let mut sub = dispatcher.subscribe();

        dispatcher.dispatch(Event::Disconnected);

        let event = tokio::time::timeout(std::time::Duration::from_millis(100), sub.recv())
            .await
            .unwrap();

        assert!(matches!(event, Some(Event::Disconnected)));
    }

    #[test]
    fn test_sink_receives_lines() {
        let dispatcher = EventDispatcher::new(16);
        let log = Arc::new(MessageLog::new());
        dispatcher.add_sink(log.clone());

        dispatcher.dispatch(Event::CommandReceived(Command::decode(
            0, 0xF500, 0x20C2, 0x45, 0x01, 0x92,
        )));
        dispatcher.diagnostic("hello");

        assert_eq!(
            log.lines(),
            vec![
                "GETDOSVERSION (92) BC=0000, DE=F500, HL=20C2, F=45, A=01".to_string(),
                "hello".to_string(),
            ]
        );
    }

    #[test]
    fn test_message_log_keeps_latest() {
        let log = MessageLog::with_capacity(3);
        for i in 0..5 {
            log.append_line(&format!("line {i}"));
        }
        assert_eq!(log.lines(), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_resync_display() {
        let event = Event::Resynced {
            discarded: 4,
            reason: "nowind protocol timeout after 700ms".into(),
        };
        assert_eq!(
            event.to_string(),
            "nowind protocol timeout after 700ms, 4 bytes removed"
        );
    }

    #[test]
    fn test_dispatch_without_subscribers() {
        let dispatcher = EventDispatcher::default();
        dispatcher.dispatch(Event::Disconnected);
        assert!(dispatcher.subscribe().try_recv().is_none());
    }
}
