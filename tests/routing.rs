mod common;

use common::{drain_events, identify, paths, rig, Rig};
use pretty_assertions::assert_eq;
use serde_json::json;
use serial_bridge::events::Event;
use serial_bridge::mock::MockDevice;

async fn two_identified_devices(rig: &mut Rig) -> (MockDevice, MockDevice) {
    rig.router
        .reconcile_now(paths(&["/dev/ttyUSB0", "/dev/ttyUSB1"]))
        .await;

    let mut device_0 = rig.opener.device("/dev/ttyUSB0");
    let mut device_1 = rig.opener.device("/dev/ttyUSB1");
    identify(rig, &mut device_0, "bot-0");
    identify(rig, &mut device_1, "bot-1");

    (device_0, device_1)
}

#[tokio::test(start_paused = true)]
async fn send_by_id() {
    let mut rig = rig();
    let (mut device_0, mut device_1) = two_identified_devices(&mut rig).await;

    rig.router
        .handle_message(&json!({ "send": { "data": "LED_ON", "id": "bot-1" } }));

    assert_eq!(device_1.drain_written(), vec!["LED_ON"]);
    assert_eq!(device_0.drain_written(), Vec::<String>::new());
    assert_eq!(
        drain_events(&mut rig.events),
        vec![Event::Sent("/dev/ttyUSB1".into())]
    );
}

#[tokio::test(start_paused = true)]
async fn send_by_device_path() {
    let mut rig = rig();
    let (mut device_0, mut device_1) = two_identified_devices(&mut rig).await;

    rig.router.handle_message(&json!({
        "send": { "data": "LED_OFF", "device": "/dev/ttyUSB0" }
    }));

    assert_eq!(device_0.drain_written(), vec!["LED_OFF"]);
    assert_eq!(device_1.drain_written(), Vec::<String>::new());
}

#[tokio::test(start_paused = true)]
async fn id_wins_over_device_path() {
    let mut rig = rig();
    let (mut device_0, mut device_1) = two_identified_devices(&mut rig).await;

    rig.router.handle_message(&json!({
        "send": { "data": "LED_ON", "id": "bot-1", "device": "/dev/ttyUSB0" }
    }));

    assert_eq!(device_1.drain_written(), vec!["LED_ON"]);
    assert_eq!(device_0.drain_written(), Vec::<String>::new());
}

#[tokio::test(start_paused = true)]
async fn send_without_a_target_picks_the_first_device() {
    let mut rig = rig();
    let (mut device_0, mut device_1) = two_identified_devices(&mut rig).await;

    rig.router
        .handle_message(&json!({ "send": { "data": "PING" } }));

    assert_eq!(device_0.drain_written(), vec!["PING"]);
    assert_eq!(device_1.drain_written(), Vec::<String>::new());
}

#[tokio::test(start_paused = true)]
async fn send_with_nothing_connected_is_an_error() {
    let mut rig = rig();

    rig.router
        .handle_message(&json!({ "send": { "data": "PING" } }));

    assert_eq!(
        drain_events(&mut rig.events),
        vec![Event::Error(
            "no id or device or no devices connected".into()
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn send_to_an_unknown_id_is_an_error() {
    let mut rig = rig();
    let (mut device_0, _device_1) = two_identified_devices(&mut rig).await;

    rig.router
        .handle_message(&json!({ "send": { "data": "PING", "id": "bot-9" } }));

    assert_eq!(
        drain_events(&mut rig.events),
        vec![Event::Error("not connected".into())]
    );
    assert_eq!(device_0.drain_written(), Vec::<String>::new());
}

#[tokio::test(start_paused = true)]
async fn send_to_a_faulted_device_is_an_error() {
    let mut rig = rig();
    let (mut device_0, _device_1) = two_identified_devices(&mut rig).await;

    device_0.set_good(false);

    rig.router
        .handle_message(&json!({ "send": { "data": "PING", "id": "bot-0" } }));

    assert_eq!(
        drain_events(&mut rig.events),
        vec![Event::Error("couldnt send".into())]
    );
    assert_eq!(device_0.drain_written(), Vec::<String>::new());
}

#[tokio::test(start_paused = true)]
async fn send_missing_data_is_ignored_on_the_bus() {
    let mut rig = rig();
    let (mut device_0, _device_1) = two_identified_devices(&mut rig).await;

    rig.router
        .handle_message(&json!({ "send": { "id": "bot-0" } }));

    assert_eq!(drain_events(&mut rig.events), vec![]);
    assert_eq!(device_0.drain_written(), Vec::<String>::new());
}
