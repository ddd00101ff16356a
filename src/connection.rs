use std::fmt::Display;

use crate::{
    error::Error,
    events::{Event, Events, IdInfo},
    serial::SerialLink,
};

/// The identification request line sent to a freshly opened device.
pub const ID_REQUEST: &str = "ID";

/// Where a device's lines should be forwarded once bound to a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    /// The user the forwarded lines belong to.
    pub user: String,

    /// The stream to forward to.
    pub stream: String,

    /// Optional sequence within the stream.
    pub sequence: Option<String>,
}

/// What one drained line from a device amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    /// The first non-empty line after open: the device's identity.
    Identified {
        /// The device node path.
        device: String,

        /// The reported identity, trimmed.
        name: String,
    },

    /// A line from a stream-bound device, to be relayed downstream.
    Routed {
        /// The bound route.
        target: RouteTarget,

        /// The line, trimmed.
        text: String,
    },

    /// A line from an identified but unbound device.
    Data {
        /// The device node path.
        device: String,

        /// The line, trimmed.
        data: String,
    },
}

/// One serial device's session.
///
/// Starts out awaiting identification; the first non-empty line read
/// becomes the device's identity, exactly once per physical open.
pub struct Connection {
    path: String,
    id: Option<String>,
    awaiting_id: bool,
    route: Option<RouteTarget>,
    link: Box<dyn SerialLink>,
}

impl Connection {
    /// Wrap a freshly opened link.
    pub fn new(path: &str, link: Box<dyn SerialLink>) -> Self {
        Self {
            path: path.to_string(),
            id: None,
            awaiting_id: true,
            route: None,
            link,
        }
    }

    /// The device node path. Stable for the connection's lifetime.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The reported identity, if the handshake has completed.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Whether this connection's device reported the given identity.
    pub fn matches_id(&self, id: &str) -> bool {
        self.id.as_deref() == Some(id)
    }

    /// Whether this connection sits on the given device node path.
    pub fn matches_path(&self, path: &str) -> bool {
        self.path == path
    }

    /// Whether the underlying link is open and error free.
    /// Callers must check this before [`Connection::write`].
    pub fn is_good(&self) -> bool {
        self.link.is_good()
    }

    /// Bind (or rebind) this device to a stream.
    pub fn bind_route(&mut self, target: RouteTarget) {
        self.route = Some(target);
    }

    /// Write data to the device. The line terminator is appended by the link.
    pub fn write(&mut self, data: &str) -> Result<(), Error> {
        self.link.write_line(data)
    }

    /// Drop any device output buffered so far.
    pub fn clear(&mut self) {
        self.link.clear();
    }

    /// One non-blocking read attempt, run through the state machine.
    ///
    /// Empty and whitespace-only lines are swallowed; they neither
    /// identify the device nor produce output.
    pub fn try_read(&mut self) -> Option<LineRead> {
        let line = self.link.try_read_line()?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            return None;
        }

        if self.awaiting_id {
            self.awaiting_id = false;
            self.id = Some(trimmed.to_string());

            return Some(LineRead::Identified {
                device: self.path.clone(),
                name: trimmed.to_string(),
            });
        }

        if let Some(target) = &self.route {
            return Some(LineRead::Routed {
                target: target.clone(),
                text: trimmed.to_string(),
            });
        }

        Some(LineRead::Data {
            device: self.path.clone(),
            data: trimmed.to_string(),
        })
    }

    /// Publish this connection's appearance event and, if identified,
    /// its identity. Used to bring a freshly connected client up to speed.
    pub fn announce(&self, events: &mut Events) {
        events.publish(Event::Device(self.path.clone()));

        if let Some(name) = &self.id {
            events.publish(Event::Id(IdInfo {
                device: self.path.clone(),
                name: name.clone(),
            }));
        }
    }

    /// Release the underlying link. Calling this twice is a no-op.
    pub fn close(&mut self) {
        self.link.close();
    }
}

impl Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}){}",
            self.id.as_deref().unwrap_or("no id"),
            self.path,
            if self.link.is_good() {
                ", open"
            } else {
                ", has error"
            }
        )
    }
}
