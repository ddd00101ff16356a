//! Scripted stand-ins for the hardware boundaries: a serial link whose
//! device side is driven by the test, an opener producing such links,
//! and a request/reply channel with scripted failures and replies.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use tokio::sync::mpsc;

use crate::{
    error::Error,
    relay::RequestChannel,
    serial::{SerialLink, SerialOpener},
};

/// The test's side of a [`MockLink`]: plays the device.
#[derive(Debug)]
pub struct MockDevice {
    lines: mpsc::UnboundedSender<String>,
    written: mpsc::UnboundedReceiver<String>,
    good: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl MockDevice {
    /// Make the device print a line.
    pub fn say(&self, line: &str) {
        self.lines
            .send(line.to_string())
            .expect("Mock link should outlive the device handle");
    }

    /// The next line the gateway wrote to the device, if any.
    pub fn next_written(&mut self) -> Option<String> {
        self.written.try_recv().ok()
    }

    /// All lines the gateway has written so far.
    pub fn drain_written(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.written.try_recv() {
            lines.push(line);
        }
        lines
    }

    /// Put the device in or out of an error state.
    pub fn set_good(&self, good: bool) {
        self.good.store(good, Ordering::Relaxed);
    }

    /// Whether the gateway has closed its side.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

/// A scripted serial link.
#[derive(Debug)]
pub struct MockLink {
    path: String,
    incoming: mpsc::UnboundedReceiver<String>,
    written: mpsc::UnboundedSender<String>,
    good: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

/// Create a link and the device handle driving it.
pub fn mock_link(path: &str) -> (MockLink, MockDevice) {
    let (lines_tx, lines_rx) = mpsc::unbounded_channel();
    let (written_tx, written_rx) = mpsc::unbounded_channel();
    let good = Arc::new(AtomicBool::new(true));
    let closed = Arc::new(AtomicBool::new(false));

    let link = MockLink {
        path: path.to_string(),
        incoming: lines_rx,
        written: written_tx,
        good: Arc::clone(&good),
        closed: Arc::clone(&closed),
    };

    let device = MockDevice {
        lines: lines_tx,
        written: written_rx,
        good,
        closed,
    };

    (link, device)
}

impl SerialLink for MockLink {
    fn try_read_line(&mut self) -> Option<String> {
        self.incoming.try_recv().ok()
    }

    fn write_line(&mut self, line: &str) -> Result<(), Error> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::LinkClosed(self.path.clone()));
        }

        self.written
            .send(line.to_string())
            .map_err(|_| Error::LinkClosed(self.path.clone()))
    }

    fn clear(&mut self) {
        while self.incoming.try_recv().is_ok() {}
    }

    fn is_good(&self) -> bool {
        self.good.load(Ordering::Relaxed) && !self.closed.load(Ordering::Relaxed)
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct OpenerState {
    fail_next: HashSet<String>,
    devices: HashMap<String, MockDevice>,
    opened: Vec<String>,
}

/// A [`SerialOpener`] producing [`MockLink`]s.
///
/// Clones share state, so a test can keep one clone and hand the
/// other to the reconciler.
#[derive(Debug, Default, Clone)]
pub struct MockOpener {
    state: Arc<Mutex<OpenerState>>,
}

impl MockOpener {
    /// A fresh opener with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next open of `path` to fail.
    pub fn fail_next(&self, path: &str) {
        self.lock().fail_next.insert(path.to_string());
    }

    /// Take the device handle for an opened path.
    ///
    /// Panics if the path has not been (successfully) opened.
    pub fn device(&self, path: &str) -> MockDevice {
        self.lock()
            .devices
            .remove(path)
            .unwrap_or_else(|| panic!("no mock device was opened at `{path}`"))
    }

    /// Every successfully opened path, in open order.
    pub fn opened(&self) -> Vec<String> {
        self.lock().opened.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, OpenerState> {
        self.state.lock().expect("Mock opener state should lock")
    }
}

impl SerialOpener for MockOpener {
    fn open(&self, path: &str, _baud: u32) -> Result<Box<dyn SerialLink>, Error> {
        let mut state = self.lock();

        if state.fail_next.remove(path) {
            return Err(Error::SerialOpen {
                path: path.to_string(),
                problem: "scripted open failure".to_string(),
            });
        }

        let (link, device) = mock_link(path);
        state.devices.insert(path.to_string(), device);
        state.opened.push(path.to_string());

        Ok(Box::new(link))
    }
}

#[derive(Debug, Default)]
struct ChannelState {
    fail_next: usize,
    attempts: usize,
    sent: Vec<String>,
    replies: VecDeque<String>,
}

/// A scripted [`RequestChannel`].
///
/// Clones share state, so a test can keep one clone and hand the
/// other to the relay.
#[derive(Debug, Default, Clone)]
pub struct MockChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl MockChannel {
    /// A channel which accepts every send.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next `n` send attempts to fail.
    pub fn fail_next(&self, n: usize) {
        self.lock().fail_next = n;
    }

    /// Script a reply for the relay's receive loop to pick up.
    pub fn push_reply(&self, raw: &str) {
        self.lock().replies.push_back(raw.to_string());
    }

    /// How many send attempts have been made, failed ones included.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    /// The messages which made it through.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        self.state.lock().expect("Mock channel state should lock")
    }
}

impl RequestChannel for MockChannel {
    fn try_send(&mut self, msg: &str) -> Result<(), Error> {
        let mut state = self.lock();
        state.attempts += 1;

        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(Error::PeerNotReady);
        }

        state.sent.push(msg.to_string());
        Ok(())
    }

    fn try_recv(&mut self) -> Option<String> {
        self.lock().replies.pop_front()
    }
}
