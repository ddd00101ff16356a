use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{broadcast, mpsc},
};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    error::Error,
    events::{Event, Events},
};

/// The bus transport: newline-delimited JSON over TCP.
///
/// Clients push commands to the inbound port; every client connected
/// to the outbound port receives every published event. The listeners
/// run on their own tasks; the router only ever sees the command feed.
pub struct Bus {
    inbound_port: u16,
    outbound_port: u16,
}

impl Bus {
    /// Bind both ports and start accepting clients.
    ///
    /// Failing to bind is the one fatal startup error; everything a
    /// client does later is survivable.
    ///
    /// Returns the bus and the inbound command feed. Passing port `0`
    /// binds an arbitrary free port, see [`Bus::inbound_port`].
    pub async fn bind(
        inbound_port: u16,
        outbound_port: u16,
        events: &Events,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Value>), Error> {
        let inbound = TcpListener::bind(("127.0.0.1", inbound_port))
            .await
            .map_err(|source| Error::Bind {
                role: "inbound",
                port: inbound_port,
                source,
            })?;

        let outbound = TcpListener::bind(("127.0.0.1", outbound_port))
            .await
            .map_err(|source| Error::Bind {
                role: "outbound",
                port: outbound_port,
                source,
            })?;

        let bus = Self {
            inbound_port: local_port(&inbound),
            outbound_port: local_port(&outbound),
        };

        info!(
            inbound = bus.inbound_port,
            outbound = bus.outbound_port,
            "Bus ready"
        );

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        tokio::spawn(
            accept_inbound(inbound, commands_tx).instrument(info_span!("bus-inbound")),
        );
        tokio::spawn(
            accept_outbound(outbound, events.sender()).instrument(info_span!("bus-outbound")),
        );

        Ok((bus, commands_rx))
    }

    /// The actually bound inbound port.
    pub fn inbound_port(&self) -> u16 {
        self.inbound_port
    }

    /// The actually bound outbound port.
    pub fn outbound_port(&self) -> u16 {
        self.outbound_port
    }
}

fn local_port(listener: &TcpListener) -> u16 {
    listener
        .local_addr()
        .expect("A bound listener has a local address")
        .port()
}

async fn accept_inbound(listener: TcpListener, commands: mpsc::UnboundedSender<Value>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!(%addr, "Inbound client connected");
                tokio::spawn(read_commands(stream, commands.clone()));
            }
            Err(e) => warn!(?e, "Inbound accept failed"),
        }
    }
}

async fn read_commands(stream: TcpStream, commands: mpsc::UnboundedSender<Value>) {
    let mut lines = Framed::new(stream, LinesCodec::new());

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(?e, "Inbound read failed");
                break;
            }
        };

        match serde_json::from_str::<Value>(&line) {
            Ok(doc) => {
                if commands.send(doc).is_err() {
                    // The router is gone; nothing left to feed.
                    return;
                }
            }
            Err(e) => warn!(?e, "Ignoring a line that is not valid JSON"),
        }
    }

    debug!("Inbound client hung up");
}

async fn accept_outbound(listener: TcpListener, events: broadcast::Sender<Event>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!(%addr, "Outbound client connected");
                tokio::spawn(write_events(stream, events.subscribe()));
            }
            Err(e) => warn!(?e, "Outbound accept failed"),
        }
    }
}

async fn write_events(stream: TcpStream, mut events: broadcast::Receiver<Event>) {
    let mut sink = Framed::new(stream, LinesCodec::new());

    loop {
        match events.recv().await {
            Ok(event) => {
                let json = serde_json::to_string(&event).expect("Events serialize");

                if sink.send(json).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(%skipped, "Outbound client lagging, events skipped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    debug!("Outbound client hung up");
}
