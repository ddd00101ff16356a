use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use serial_bridge::{
    bus::Bus,
    client::BusClient,
    config::Config,
    error::Error,
    events::{Event, Events},
    server,
};
use tokio::{sync::oneshot, time::timeout};

#[tokio::test]
async fn client_commands_reach_the_feed() {
    let events = Events::new(10);
    let (bus, mut commands) = Bus::bind(0, 0, &events).await.unwrap();

    let mut client = BusClient::connect(bus.inbound_port(), bus.outbound_port())
        .await
        .unwrap();
    client.send(&json!({ "connected": "test-client" })).await.unwrap();

    let doc = timeout(Duration::from_secs(5), commands.recv())
        .await
        .expect("command should arrive")
        .expect("feed should stay open");

    assert_eq!(doc, json!({ "connected": "test-client" }));
}

#[tokio::test]
async fn lines_that_are_not_json_are_skipped() {
    let events = Events::new(10);
    let (bus, mut commands) = Bus::bind(0, 0, &events).await.unwrap();

    let mut client = BusClient::connect(bus.inbound_port(), bus.outbound_port())
        .await
        .unwrap();
    client.send_raw("this is not json").await.unwrap();
    client.send(&json!({ "connected": "after-garbage" })).await.unwrap();

    let doc = timeout(Duration::from_secs(5), commands.recv())
        .await
        .expect("command should arrive")
        .expect("feed should stay open");

    assert_eq!(doc, json!({ "connected": "after-garbage" }));
}

#[tokio::test]
async fn published_events_reach_a_subscribed_client() {
    let mut events = Events::new(10);
    let (bus, _commands) = Bus::bind(0, 0, &events).await.unwrap();

    let mut client = BusClient::connect(bus.inbound_port(), bus.outbound_port())
        .await
        .unwrap();

    // The outbound side subscribes when the accept lands; give it a moment.
    tokio::time::sleep(Duration::from_millis(100)).await;

    events.publish(Event::Device("/dev/ttyUSB0".into()));

    let event = timeout(Duration::from_secs(5), client.next_event())
        .await
        .expect("event should arrive")
        .expect("gateway should not hang up");

    assert_eq!(event, Event::Device("/dev/ttyUSB0".into()));
}

#[tokio::test]
async fn full_server_answers_over_the_bus() {
    let (bound_tx, bound_rx) = oneshot::channel();

    let config = Config {
        inbound_port: 0,
        outbound_port: 0,
        relay_port: 0,
        ..Default::default()
    };
    tokio::spawn(server::run_reporting_ports(config, bound_tx));

    let (inbound, outbound) = bound_rx.await.expect("server should report its ports");

    let mut client = BusClient::connect(inbound, outbound).await.unwrap();

    // Let the outbound subscription land before provoking an event.
    tokio::time::sleep(Duration::from_millis(100)).await;

    client.send(&json!({ "send": { "data": "PING" } })).await.unwrap();

    let expected = Event::Error("no id or device or no devices connected".into());

    timeout(Duration::from_secs(5), async {
        // The machine running this may produce hotplug events of its
        // own; skip anything until the answer to our send shows up.
        loop {
            let event = client.next_event().await.expect("gateway should stay up");

            if event == expected {
                break;
            }
        }
    })
    .await
    .expect("the error event should arrive");
}

#[tokio::test]
async fn duplicate_ports_refuse_to_start() {
    let config = Config {
        inbound_port: 5599,
        outbound_port: 5599,
        ..Default::default()
    };

    let err = server::run(config).await.unwrap_err();

    assert!(matches!(err, Error::BadConfig(_)));
}

#[tokio::test]
async fn occupied_port_refuses_to_start() {
    let taken = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let config = Config {
        inbound_port: port,
        // Port 0 everywhere else so nothing collides.
        outbound_port: 0,
        relay_port: 0,
        ..Default::default()
    };

    let err = server::run(config).await.unwrap_err();

    assert!(matches!(err, Error::Bind { role: "inbound", .. }));
}
