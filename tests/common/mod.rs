#![allow(dead_code)]

use std::{collections::BTreeSet, time::Duration};

use serde_json::Value;
use serial_bridge::{
    events::{Event, Events},
    hotplug::Reconciler,
    mock::{MockChannel, MockDevice, MockOpener},
    relay::Relay,
    router::Router,
};
use tokio::sync::{broadcast, mpsc};

/// The hotplug cadence used by the rigs.
pub const CADENCE: Duration = Duration::from_millis(200);

/// A router wired to scripted hardware: a mock opener instead of real
/// serial ports and a mock channel instead of the downstream peer.
pub struct Rig {
    pub router: Router,
    pub opener: MockOpener,
    pub channel: MockChannel,
    pub events: broadcast::Receiver<Event>,
    pub commands: mpsc::UnboundedSender<Value>,
}

pub fn rig() -> Rig {
    let opener = MockOpener::new();
    let channel = MockChannel::new();

    let relay = Relay::spawn(Box::new(channel.clone()));
    let reconciler = Reconciler::new(Box::new(opener.clone()), 9600);

    let events = Events::new(100);
    let events_rx = events.subscribe();

    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let router = Router::new(commands_rx, events, relay, reconciler, CADENCE);

    Rig {
        router,
        opener,
        channel,
        events: events_rx,
        commands: commands_tx,
    }
}

/// Shorthand for a set of device paths.
pub fn paths(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Everything published since the last drain.
pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Complete the identification handshake for a plugged device and
/// swallow the events and `ID` requests it produced.
pub fn identify(rig: &mut Rig, device: &mut MockDevice, name: &str) {
    device.drain_written();
    device.say(name);
    rig.router.drain_device_input();
    drain_events(&mut rig.events);
}
