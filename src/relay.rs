use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::{net::TcpStream, sync::mpsc};
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use crate::error::Error;

/// How many times a failed send is retried before the message is dropped.
const SEND_RETRIES: usize = 4;

/// How long to wait between send retries.
const RETRY_DELAY: Duration = Duration::from_millis(20);

/// How long the receive side waits between polls of the channel.
const POLL_PERIOD: Duration = Duration::from_millis(500);

/// How long to wait before re-attempting a connection to the peer.
const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// A strict request/reply channel to the downstream peer.
///
/// There is no buffering on such a channel: a send while the peer is
/// not ready fails immediately instead of queuing, which is why the
/// relay wraps it in a bounded retry.
pub trait RequestChannel: Send {
    /// One send attempt. Fails immediately when the peer is not ready.
    fn try_send(&mut self, msg: &str) -> Result<(), Error>;

    /// One non-blocking receive attempt for a reply.
    fn try_recv(&mut self) -> Option<String>;
}

/// A handler for one reply type.
pub type ReplyHandler = Box<dyn Fn(&Value) + Send>;

/// The fixed reply-type dispatch table.
/// Registered at construction, read-only afterwards.
#[derive(Default)]
pub struct ReplyHandlers(HashMap<String, ReplyHandler>);

impl ReplyHandlers {
    /// No handlers at all. Useful as a starting point for [`ReplyHandlers::on`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for the given reply type.
    pub fn on(mut self, kind: &str, handler: impl Fn(&Value) + Send + 'static) -> Self {
        self.0.insert(kind.to_string(), Box::new(handler));
        self
    }

    /// The replies the downstream peer is expected to send.
    pub fn defaults() -> Self {
        Self::new()
            .on("ack", |_| info!("acknowledged"))
            .on("err", |doc| error!(%doc, "err"))
    }
}

/// Builds the payload for one stream-bound device line.
pub(crate) fn idea_payload(user: &str, stream: &str, sequence: Option<&str>, text: &str) -> Value {
    json!({
        "type": "addobject",
        "objtype": "idea",
        "me": user,
        "stream": stream,
        "text": text,
        "sequence": sequence.unwrap_or(""),
    })
}

/// A fire-and-forget handle to the relay.
///
/// Cheap to clone; all messages funnel through the relay's own task,
/// which serializes delivery and reply handling on the one channel.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    tx: mpsc::UnboundedSender<Value>,
}

impl RelayHandle {
    /// Queue a message for delivery. Delivery is at-least-one-attempt:
    /// a send that keeps failing is eventually dropped.
    pub fn deliver(&self, message: Value) {
        if self.tx.send(message).is_err() {
            warn!("Relay is gone, dropping message");
        }
    }

    /// Queue one stream-bound device line for delivery.
    pub fn deliver_idea(&self, user: &str, stream: &str, sequence: Option<&str>, text: &str) {
        self.deliver(idea_payload(user, stream, sequence, text));
    }
}

/// The relay actor. Owns the request/reply channel and the handler table.
pub struct Relay {
    channel: Box<dyn RequestChannel>,
    handlers: ReplyHandlers,
    rx: mpsc::UnboundedReceiver<Value>,
}

impl Relay {
    /// Spawn the relay with the default reply handlers.
    pub fn spawn(channel: Box<dyn RequestChannel>) -> RelayHandle {
        Self::spawn_with_handlers(channel, ReplyHandlers::defaults())
    }

    /// Spawn the relay with the given reply handlers.
    pub fn spawn_with_handlers(
        channel: Box<dyn RequestChannel>,
        handlers: ReplyHandlers,
    ) -> RelayHandle {
        let (tx, rx) = mpsc::unbounded_channel();

        let relay = Self {
            channel,
            handlers,
            rx,
        };
        tokio::spawn(relay.run().instrument(info_span!("relay")));

        RelayHandle { tx }
    }

    async fn run(mut self) {
        trace!("start receiving");

        loop {
            tokio::select! {
                outgoing = self.rx.recv() => match outgoing {
                    Some(message) => self.deliver(message).await,
                    // Every handle is gone.
                    None => break,
                },
                _ = tokio::time::sleep(POLL_PERIOD) => {
                    while let Some(reply) = self.channel.try_recv() {
                        self.handle_reply(&reply);
                    }
                }
            }
        }

        debug!("Relay stopped");
    }

    async fn deliver(&mut self, message: Value) {
        let msg = message.to_string();
        trace!(%msg, "try sending");

        if self.channel.try_send(&msg).is_ok() {
            return;
        }

        for _ in 0..SEND_RETRIES {
            tokio::time::sleep(RETRY_DELAY).await;
            trace!("retrying send");

            if self.channel.try_send(&msg).is_ok() {
                return;
            }
        }

        warn!("Peer never became ready, dropping message");
    }

    fn handle_reply(&self, raw: &str) {
        trace!("handling reply");

        let doc: Value = match serde_json::from_str(raw) {
            Ok(doc) => doc,
            Err(e) => {
                error!(?e, "Reply is not valid JSON");
                return;
            }
        };

        debug!(%doc, "<-");

        let Some(kind) = doc.get("type").and_then(Value::as_str) else {
            error!("no type");
            return;
        };

        match self.handlers.0.get(kind) {
            Some(handler) => handler(&doc),
            None => error!(%kind, "unknown reply type"),
        }
    }
}

/// A [`RequestChannel`] over a TCP connection with newline-delimited
/// messages. A socket task keeps (re)connecting to the peer; while it
/// is down, sends fail immediately, which is what drives the retry.
pub struct TcpRequestChannel {
    out_tx: mpsc::UnboundedSender<String>,
    in_rx: mpsc::UnboundedReceiver<String>,
    connected: Arc<AtomicBool>,
}

impl TcpRequestChannel {
    /// Start connecting to the peer on localhost at `port`.
    pub fn connect(port: u16) -> Self {
        info!(%port, "Connecting to downstream peer");

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        tokio::spawn(
            socket_task(port, out_rx, in_tx, Arc::clone(&connected))
                .instrument(info_span!("peer", %port)),
        );

        Self {
            out_tx,
            in_rx,
            connected,
        }
    }
}

async fn socket_task(
    port: u16,
    mut out_rx: mpsc::UnboundedReceiver<String>,
    in_tx: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
) {
    loop {
        let stream = match TcpStream::connect(("127.0.0.1", port)).await {
            Ok(stream) => stream,
            Err(e) => {
                debug!(?e, "Peer connection failed, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        info!("Connected to downstream peer");
        connected.store(true, Ordering::Relaxed);

        let (mut sink, mut lines) = tokio_util::codec::Framed::new(
            stream,
            tokio_util::codec::LinesCodec::new(),
        )
        .split();

        loop {
            tokio::select! {
                outgoing = out_rx.recv() => match outgoing {
                    Some(msg) => {
                        if let Err(e) = sink.send(msg).await {
                            warn!(?e, "Peer send failed");
                            break;
                        }
                    }
                    None => return,
                },
                incoming = lines.next() => match incoming {
                    Some(Ok(line)) => {
                        let _ = in_tx.send(line);
                    }
                    Some(Err(e)) => {
                        warn!(?e, "Peer read failed");
                        break;
                    }
                    None => {
                        info!("Peer hung up");
                        break;
                    }
                },
            }
        }

        connected.store(false, Ordering::Relaxed);
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

impl RequestChannel for TcpRequestChannel {
    fn try_send(&mut self, msg: &str) -> Result<(), Error> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(Error::PeerNotReady);
        }

        self.out_tx
            .send(msg.to_string())
            .map_err(|_| Error::PeerNotReady)
    }

    fn try_recv(&mut self) -> Option<String> {
        self.in_rx.try_recv().ok()
    }
}
