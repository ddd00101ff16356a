use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::debug;

use crate::events::Event;

/// A minimal bus client: pushes commands to the inbound port and
/// reads events from the outbound port. Integration tests use this;
/// it doubles as a reference for writing real clients.
pub struct BusClient {
    commands: Framed<TcpStream, LinesCodec>,
    events: Framed<TcpStream, LinesCodec>,
}

impl BusClient {
    /// Connect to a running gateway on localhost.
    pub async fn connect(inbound_port: u16, outbound_port: u16) -> std::io::Result<Self> {
        let commands = TcpStream::connect(("127.0.0.1", inbound_port)).await?;
        let events = TcpStream::connect(("127.0.0.1", outbound_port)).await?;

        debug!(%inbound_port, %outbound_port, "Client connected");

        Ok(Self {
            commands: Framed::new(commands, LinesCodec::new()),
            events: Framed::new(events, LinesCodec::new()),
        })
    }

    /// Put one command document on the bus.
    pub async fn send(&mut self, doc: &Value) -> std::io::Result<()> {
        self.send_raw(&doc.to_string()).await
    }

    /// Put one raw line on the bus, JSON or not.
    pub async fn send_raw(&mut self, line: &str) -> std::io::Result<()> {
        self.commands
            .send(line.to_string())
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Await the next event from the gateway.
    /// `None` means the gateway hung up.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            let line = self.events.next().await?.ok()?;

            match serde_json::from_str(&line) {
                Ok(event) => return Some(event),
                // Skip anything a future gateway version might add.
                Err(e) => debug!(?e, "Skipping unknown event"),
            }
        }
    }
}
