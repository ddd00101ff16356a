use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::{Decoder, LinesCodec};
use tracing::{error, info, info_span, trace, Instrument};

use crate::{
    error::Error,
    serial::{SerialLink, SerialOpener},
};

fn try_create_serial_stream(path: &str, baud: u32) -> Result<SerialStream, Error> {
    tokio_serial::new(path, baud)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| Error::SerialOpen {
            path: path.to_string(),
            problem: format!("{e}"),
        })
}

/// A serial link whose I/O lives on its own task.
///
/// The task owns the framed serial stream; the link talks to it through
/// channels, which is what keeps this surface non-blocking.
pub(crate) struct SerialPortLink {
    path: String,
    to_wire: mpsc::UnboundedSender<String>,
    from_wire: mpsc::UnboundedReceiver<String>,
    healthy: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl SerialPortLink {
    pub(crate) fn open(path: &str, baud: u32) -> Result<Self, Error> {
        info!(%path, %baud, "Starting serial port handler");

        let stream = try_create_serial_stream(path, baud)?;

        let (to_wire_tx, to_wire_rx) = mpsc::unbounded_channel();
        let (from_wire_tx, from_wire_rx) = mpsc::unbounded_channel();
        let healthy = Arc::new(AtomicBool::new(true));

        let task = spawn_io_task(
            stream,
            path.to_string(),
            to_wire_rx,
            from_wire_tx,
            Arc::clone(&healthy),
        );

        Ok(Self {
            path: path.to_string(),
            to_wire: to_wire_tx,
            from_wire: from_wire_rx,
            healthy,
            task: Some(task),
        })
    }
}

fn spawn_io_task(
    stream: SerialStream,
    path: String,
    mut to_wire: mpsc::UnboundedReceiver<String>,
    from_wire: mpsc::UnboundedSender<String>,
    healthy: Arc<AtomicBool>,
) -> JoinHandle<()> {
    let span = info_span!("tty", %path);

    tokio::spawn(
        async move {
            // Sink: put things on the wire, stream: lines from the wire.
            let (mut sink, mut lines) = LinesCodec::new().framed(stream).split();

            loop {
                tokio::select! {
                    outgoing = to_wire.recv() => match outgoing {
                        Some(line) => {
                            if let Err(e) = sink.send(line).await {
                                error!(?e, "Serial port error in send, exiting");
                                healthy.store(false, Ordering::Relaxed);
                                break;
                            }
                        }
                        // The owning link was dropped.
                        None => break,
                    },
                    incoming = lines.next() => match incoming {
                        Some(Ok(line)) => {
                            trace!(?line, "Line from port");

                            if from_wire.send(line).is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            error!(?e, "Serial port error in read, exiting");
                            healthy.store(false, Ordering::Relaxed);
                            break;
                        }
                        None => {
                            // The port is gone, e.g. the device was unplugged.
                            healthy.store(false, Ordering::Relaxed);
                            break;
                        }
                    },
                }
            }
        }
        .instrument(span),
    )
}

impl SerialLink for SerialPortLink {
    fn try_read_line(&mut self) -> Option<String> {
        self.from_wire.try_recv().ok()
    }

    fn write_line(&mut self, line: &str) -> Result<(), Error> {
        self.to_wire
            .send(line.to_string())
            .map_err(|_| Error::LinkClosed(self.path.clone()))
    }

    fn clear(&mut self) {
        while self.from_wire.try_recv().is_ok() {}
    }

    fn is_good(&self) -> bool {
        self.task.is_some() && self.healthy.load(Ordering::Relaxed)
    }

    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            trace!(path = %self.path, "Closing serial link");
            task.abort();
            self.healthy.store(false, Ordering::Relaxed);
        }
    }
}

impl Drop for SerialPortLink {
    fn drop(&mut self) {
        self.close();
    }
}

/// The production opener: tokio-serial, 8N1, no flow control.
pub struct SystemOpener;

impl SerialOpener for SystemOpener {
    fn open(&self, path: &str, baud: u32) -> Result<Box<dyn SerialLink>, Error> {
        Ok(Box::new(SerialPortLink::open(path, baud)?))
    }
}
