use std::{collections::BTreeSet, time::Duration};

use serde_json::Value;
use tokio::{sync::mpsc, time::Instant};
use tracing::{error, info};

use crate::{
    commands::Command,
    connection::{LineRead, RouteTarget},
    events::{Event, Events, IdInfo, ReceivedInfo},
    hotplug::Reconciler,
    registry::Registry,
    relay::RelayHandle,
    scanner::Scanner,
};

/// So we don't hammer the CPU, the loop sleeps a little each iteration.
const SLEEP_TIME: Duration = Duration::from_millis(20);

/// The main loop: commands in, device output out, hotplug on a cadence.
///
/// Single-task and cooperative. It owns the registry and every
/// connection; the relay and the bus transport are only reached over
/// channels, so nothing here needs a lock.
pub struct Router {
    commands: mpsc::UnboundedReceiver<Value>,
    events: Events,
    registry: Registry,
    scanner: Scanner,
    reconciler: Reconciler,
    relay: RelayHandle,
    cadence: Duration,
    last_check: Instant,
}

impl Router {
    /// Assemble a router. `commands` is the inbound bus feed.
    pub fn new(
        commands: mpsc::UnboundedReceiver<Value>,
        events: Events,
        relay: RelayHandle,
        reconciler: Reconciler,
        cadence: Duration,
    ) -> Self {
        Self {
            commands,
            events,
            registry: Registry::new(),
            scanner: Scanner::new(),
            reconciler,
            relay,
            cadence,
            last_check: Instant::now(),
        }
    }

    /// Subscribe to the events this router publishes.
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Run forever. Opens everything currently plugged in, then loops.
    pub async fn run(mut self) {
        let current = self.scanner.scan();
        self.reconcile_now(current).await;
        self.last_check = Instant::now();

        loop {
            self.step().await;
        }
    }

    /// One iteration: at most one inbound command, a short sleep, one
    /// read attempt per connection, and a reconciliation pass once the
    /// cadence has elapsed.
    pub async fn step(&mut self) {
        if let Ok(doc) = self.commands.try_recv() {
            self.handle_message(&doc);
        }

        tokio::time::sleep(SLEEP_TIME).await;

        self.drain_device_input();

        if self.last_check.elapsed() >= self.cadence {
            let current = self.scanner.scan();
            self.reconcile_now(current).await;
            self.last_check = Instant::now();
        }
    }

    /// One hotplug pass against the given device path set.
    pub async fn reconcile_now(&mut self, current: BTreeSet<String>) {
        self.reconciler
            .reconcile(current, &mut self.registry, &mut self.events)
            .await;
    }

    /// Interpret one inbound bus document and act on it.
    pub fn handle_message(&mut self, doc: &Value) {
        match Command::interpret(doc) {
            Ok(Some(Command::Connected { name })) => {
                info!(%name, "client connected");

                // Bring the fresh client up to speed on the device set.
                for connection in self.registry.iter() {
                    connection.announce(&mut self.events);
                }
            }
            Ok(Some(Command::Stream {
                stream,
                user,
                device,
                sequence,
            })) => {
                info!(%stream, %user, %device, "binding stream");

                match self.registry.find_by_path_mut(&device) {
                    Some(connection) => connection.bind_route(RouteTarget {
                        user,
                        stream,
                        sequence,
                    }),
                    None => {
                        error!(%device, "device not found");
                        self.events
                            .publish(Event::Error("device not found".to_string()));
                    }
                }
            }
            Ok(Some(Command::Send { data, id, device })) => {
                self.handle_send(&data, id.as_deref(), device.as_deref());
            }
            // Not a shape we know; fine, clients may speak newer dialects.
            Ok(None) => {}
            Err(problem) => {
                error!(%problem, "malformed message");

                if problem.publishes_event() {
                    self.events.publish(Event::Error(problem.to_string()));
                }
            }
        }
    }

    fn handle_send(&mut self, data: &str, id: Option<&str>, device: Option<&str>) {
        let connection = if let Some(id) = id {
            self.registry.find_by_id_mut(id)
        } else if let Some(device) = device {
            self.registry.find_by_path_mut(device)
        } else if self.registry.is_empty() {
            self.events.publish(Event::Error(
                "no id or device or no devices connected".to_string(),
            ));
            return;
        } else {
            self.registry.first_mut()
        };

        let Some(connection) = connection else {
            self.events.publish(Event::Error("not connected".to_string()));
            return;
        };

        info!(path = %connection.path(), %data, "sending");

        if !connection.is_good() {
            error!("error while sending");
            self.events.publish(Event::Error("couldnt send".to_string()));
            return;
        }

        let path = connection.path().to_string();
        if let Err(e) = connection.write(data) {
            error!(%e, "error while sending");
            self.events.publish(Event::Error("couldnt send".to_string()));
            return;
        }

        self.events.publish(Event::Sent(path));
    }

    /// One non-blocking read attempt per live connection.
    pub fn drain_device_input(&mut self) {
        for connection in self.registry.iter_mut() {
            let Some(read) = connection.try_read() else {
                continue;
            };

            match read {
                LineRead::Identified { device, name } => {
                    info!("added {connection}");
                    self.events.publish(Event::Id(IdInfo { device, name }));
                }
                LineRead::Routed { target, text } => {
                    self.relay.deliver_idea(
                        &target.user,
                        &target.stream,
                        target.sequence.as_deref(),
                        &text,
                    );
                }
                LineRead::Data { device, data } => {
                    self.events
                        .publish(Event::Received(ReceivedInfo { device, data }));
                }
            }
        }
    }

    /// The live connection count, mostly for assertions and logs.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }
}
