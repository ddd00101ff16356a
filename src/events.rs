use std::{collections::VecDeque, fmt::Display};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

/// A device has told us its name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdInfo {
    /// The device node path.
    pub device: String,

    /// The name the device reported.
    pub name: String,
}

/// A device said something while not bound to a stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceivedInfo {
    /// The device node path.
    pub device: String,

    /// The line the device sent, trimmed.
    pub data: String,
}

/// Events the gateway publishes on the outbound bus.
///
/// The serialized form is the wire protocol:
/// each variant becomes a single-key JSON document,
/// e.g. `{"device": "/dev/ttyUSB0"}` or `{"sent": "/dev/ttyUSB0"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Event {
    /// A device node appeared and was opened.
    Device(String),

    /// A device completed the identification handshake.
    Id(IdInfo),

    /// A device node vanished and its connection was torn down.
    Removed(String),

    /// A line from a device which is not bound to a stream.
    Received(ReceivedInfo),

    /// Data was written to this device.
    Sent(String),

    /// Something non-fatal went wrong.
    Error(String),
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Device(path) => write!(f, "device: {path}"),
            Event::Id(IdInfo { device, name }) => write!(f, "id: {name} ({device})"),
            Event::Removed(path) => write!(f, "removed: {path}"),
            Event::Received(ReceivedInfo { device, data }) => {
                write!(f, "received: {data} from {device}")
            }
            Event::Sent(path) => write!(f, "sent to {path}"),
            Event::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// An event and when it happened.
/// Only kept in the in-memory log; the timestamp never goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampedEvent {
    /// The event.
    pub inner: Event,

    /// When the event happened.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl TimestampedEvent {
    fn new(event: Event) -> Self {
        Self {
            inner: event,
            timestamp: chrono::Utc::now(),
        }
    }
}

impl Display for TimestampedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// An event logger and broadcaster.
///
/// The bus transport subscribes and forwards every event to its
/// connected clients; tests subscribe directly.
#[derive(Debug)]
pub struct Events {
    log: VecDeque<TimestampedEvent>,
    log_size: usize,

    tx: broadcast::Sender<Event>,
    #[allow(dead_code)]
    rx: broadcast::Receiver<Event>,
}

impl Events {
    /// Create a new events handler.
    /// It will keep a log of at most `log_size` events.
    pub fn new(log_size: usize) -> Self {
        let (tx, rx) = broadcast::channel(1024);
        Self {
            tx,
            rx,
            log: VecDeque::new(),
            log_size,
        }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// The broadcast side, for handing to the bus transport.
    pub(crate) fn sender(&self) -> broadcast::Sender<Event> {
        self.tx.clone()
    }

    /// Publish an event: append it to the log and broadcast it to subscribers.
    pub fn publish(&mut self, event: Event) {
        info!(%event, "Publishing event");
        self.log.push_front(TimestampedEvent::new(event.clone()));

        // Keep a log of at most this number of recent events.
        // Truncate removes from the back, so older events go first.
        self.log.truncate(self.log_size);

        self.tx.send(event).expect("Broadcast should work");
    }
}
