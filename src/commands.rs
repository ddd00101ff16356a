use std::fmt::Display;

use serde_json::Value;

/// Commands clients can put on the inbound bus.
///
/// A raw document is interpreted as exactly one of these,
/// in the priority order `connected` > `stream` > `send`.
/// Anything else is ignored so that unknown messages are never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A client announced its presence. The name is only used for logging;
    /// the gateway answers by re-announcing every live connection.
    Connected {
        /// The client's self-reported name.
        name: String,
    },

    /// Bind a device to a stream so its lines are relayed downstream.
    Stream {
        /// The stream to forward to.
        stream: String,

        /// The user the forwarded lines belong to.
        user: String,

        /// The device node path to bind.
        device: String,

        /// Optional sequence within the stream.
        sequence: Option<String>,
    },

    /// Deliver data to a device.
    Send {
        /// The data to put on the wire, without terminator.
        data: String,

        /// Select the target by its reported identity.
        id: Option<String>,

        /// Select the target by its device node path.
        /// Ignored when `id` is present.
        device: Option<String>,
    },
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Connected { name } => write!(f, "connected: {name}"),
            Command::Stream {
                stream,
                user,
                device,
                ..
            } => write!(f, "stream: {stream} for {user} on {device}"),
            Command::Send { data, id, device } => {
                write!(f, "send: {data}")?;
                if let Some(id) = id {
                    write!(f, " to id {id}")?;
                }
                if let Some(device) = device {
                    write!(f, " to device {device}")?;
                }
                Ok(())
            }
        }
    }
}

/// A recognized command shape with a required field missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// A `stream` command without a `user`.
    MissingUser,

    /// A `stream` command without a `device`.
    MissingDevice,

    /// A `send` command without `data`.
    MissingData,
}

impl Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::MissingUser => write!(f, "no user"),
            CommandError::MissingDevice => write!(f, "no device"),
            CommandError::MissingData => write!(f, "missing data"),
        }
    }
}

impl CommandError {
    /// Whether this problem is published on the bus as an error event,
    /// or only logged.
    pub fn publishes_event(&self) -> bool {
        match self {
            CommandError::MissingUser | CommandError::MissingDevice => true,
            CommandError::MissingData => false,
        }
    }
}

fn get_string(doc: &Value, name: &str) -> Option<String> {
    doc.get(name).and_then(Value::as_str).map(str::to_owned)
}

impl Command {
    /// Interpret a raw bus document.
    ///
    /// `Ok(None)` means the document matched no known shape and
    /// should be ignored.
    pub fn interpret(doc: &Value) -> Result<Option<Command>, CommandError> {
        if let Some(name) = get_string(doc, "connected") {
            return Ok(Some(Command::Connected { name }));
        }

        if let Some(stream) = get_string(doc, "stream") {
            let user = get_string(doc, "user").ok_or(CommandError::MissingUser)?;
            let device = get_string(doc, "device").ok_or(CommandError::MissingDevice)?;
            let sequence = get_string(doc, "sequence");

            return Ok(Some(Command::Stream {
                stream,
                user,
                device,
                sequence,
            }));
        }

        if let Some(send) = doc.get("send") {
            let data = get_string(send, "data").ok_or(CommandError::MissingData)?;

            return Ok(Some(Command::Send {
                data,
                id: get_string(send, "id"),
                device: get_string(send, "device"),
            }));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn connected() {
        let doc = json!({ "connected": "my-client" });

        assert_eq!(
            Command::interpret(&doc),
            Ok(Some(Command::Connected {
                name: "my-client".into()
            }))
        );
    }

    #[test]
    fn connected_takes_priority() {
        // A weird client putting several shapes in one document
        // gets the highest priority one.
        let doc = json!({
            "connected": "my-client",
            "send": { "data": "LED_ON" },
        });

        assert!(matches!(
            Command::interpret(&doc),
            Ok(Some(Command::Connected { .. }))
        ));
    }

    #[test]
    fn stream_with_all_fields() {
        let doc = json!({
            "stream": "s-1",
            "user": "u-1",
            "device": "/dev/ttyUSB0",
            "sequence": "q-1",
        });

        assert_eq!(
            Command::interpret(&doc),
            Ok(Some(Command::Stream {
                stream: "s-1".into(),
                user: "u-1".into(),
                device: "/dev/ttyUSB0".into(),
                sequence: Some("q-1".into()),
            }))
        );
    }

    #[test]
    fn stream_sequence_is_optional() {
        let doc = json!({
            "stream": "s-1",
            "user": "u-1",
            "device": "/dev/ttyUSB0",
        });

        let Ok(Some(Command::Stream { sequence, .. })) = Command::interpret(&doc) else {
            panic!("should interpret as stream");
        };
        assert_eq!(sequence, None);
    }

    #[test]
    fn stream_missing_user() {
        let doc = json!({ "stream": "s-1", "device": "/dev/ttyUSB0" });

        assert_eq!(Command::interpret(&doc), Err(CommandError::MissingUser));
        assert!(CommandError::MissingUser.publishes_event());
    }

    #[test]
    fn stream_missing_device() {
        let doc = json!({ "stream": "s-1", "user": "u-1" });

        assert_eq!(Command::interpret(&doc), Err(CommandError::MissingDevice));
    }

    #[test]
    fn send_by_id() {
        let doc = json!({ "send": { "data": "LED_ON", "id": "bot-1" } });

        assert_eq!(
            Command::interpret(&doc),
            Ok(Some(Command::Send {
                data: "LED_ON".into(),
                id: Some("bot-1".into()),
                device: None,
            }))
        );
    }

    #[test]
    fn send_missing_data_is_logged_not_published() {
        let doc = json!({ "send": { "id": "bot-1" } });

        assert_eq!(Command::interpret(&doc), Err(CommandError::MissingData));
        assert!(!CommandError::MissingData.publishes_event());
    }

    #[test]
    fn unknown_shapes_are_ignored() {
        for doc in [
            json!({ "disconnect": true }),
            json!({ "hello": "world" }),
            json!(42),
            json!(null),
        ] {
            assert_eq!(Command::interpret(&doc), Ok(None));
        }
    }
}
