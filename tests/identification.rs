mod common;

use std::time::Duration;

use common::{drain_events, identify, paths, rig};
use pretty_assertions::assert_eq;
use serde_json::json;
use serial_bridge::events::{Event, IdInfo, ReceivedInfo};

#[tokio::test(start_paused = true)]
async fn first_line_identifies_later_lines_are_data() {
    let mut rig = rig();

    rig.router.reconcile_now(paths(&["/dev/ttyUSB0"])).await;
    drain_events(&mut rig.events);

    // Nothing said yet; draining produces nothing.
    rig.router.drain_device_input();
    assert_eq!(drain_events(&mut rig.events), vec![]);

    let device = rig.opener.device("/dev/ttyUSB0");
    device.say("bot-1");
    rig.router.drain_device_input();

    assert_eq!(
        drain_events(&mut rig.events),
        vec![Event::Id(IdInfo {
            device: "/dev/ttyUSB0".into(),
            name: "bot-1".into(),
        })]
    );

    device.say("temp 21.4");
    rig.router.drain_device_input();

    assert_eq!(
        drain_events(&mut rig.events),
        vec![Event::Received(ReceivedInfo {
            device: "/dev/ttyUSB0".into(),
            data: "temp 21.4".into(),
        })]
    );
}

#[tokio::test(start_paused = true)]
async fn connected_client_gets_the_device_set_replayed() {
    let mut rig = rig();

    rig.router.reconcile_now(paths(&["/dev/ttyUSB0"])).await;
    let mut device = rig.opener.device("/dev/ttyUSB0");
    identify(&mut rig, &mut device, "bot-1");

    rig.router.handle_message(&json!({ "connected": "ui" }));

    assert_eq!(
        drain_events(&mut rig.events),
        vec![
            Event::Device("/dev/ttyUSB0".into()),
            Event::Id(IdInfo {
                device: "/dev/ttyUSB0".into(),
                name: "bot-1".into(),
            }),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn unidentified_device_is_replayed_without_an_id() {
    let mut rig = rig();

    rig.router.reconcile_now(paths(&["/dev/ttyUSB0"])).await;
    drain_events(&mut rig.events);

    rig.router.handle_message(&json!({ "connected": "ui" }));

    assert_eq!(
        drain_events(&mut rig.events),
        vec![Event::Device("/dev/ttyUSB0".into())]
    );
}

#[tokio::test(start_paused = true)]
async fn stream_bound_device_lines_are_relayed() {
    let mut rig = rig();

    rig.router.reconcile_now(paths(&["/dev/ttyUSB0"])).await;
    let mut device = rig.opener.device("/dev/ttyUSB0");
    identify(&mut rig, &mut device, "bot-1");

    rig.router.handle_message(&json!({
        "stream": "s-1",
        "user": "u-1",
        "device": "/dev/ttyUSB0",
        "sequence": "q-1",
    }));

    device.say("a thought");
    rig.router.drain_device_input();

    // Give the relay task a chance to pick the message up.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let sent = rig.channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&sent[0]).unwrap(),
        json!({
            "type": "addobject",
            "objtype": "idea",
            "me": "u-1",
            "stream": "s-1",
            "text": "a thought",
            "sequence": "q-1",
        })
    );
}

#[tokio::test(start_paused = true)]
async fn stream_for_an_unknown_device_is_an_error() {
    let mut rig = rig();

    rig.router.handle_message(&json!({
        "stream": "s-1",
        "user": "u-1",
        "device": "/dev/ttyUSB0",
    }));

    assert_eq!(
        drain_events(&mut rig.events),
        vec![Event::Error("device not found".into())]
    );
}

#[tokio::test(start_paused = true)]
async fn stream_without_a_user_is_an_error() {
    let mut rig = rig();

    rig.router.handle_message(&json!({ "stream": "s-1" }));

    assert_eq!(
        drain_events(&mut rig.events),
        vec![Event::Error("no user".into())]
    );
}
