use std::time::Duration;

use tokio::sync::oneshot;
use tracing::info;

use crate::{
    bus::Bus,
    config::Config,
    error::Error,
    events::Events,
    hotplug::Reconciler,
    relay::{Relay, TcpRequestChannel},
    router::Router,
    serial::port::SystemOpener,
};

/// How many recent events the in-memory log keeps.
const EVENT_LOG_SIZE: usize = 1000;

async fn run_inner(config: Config, bound: Option<oneshot::Sender<(u16, u16)>>) -> Result<(), Error> {
    config.validate()?;

    let events = Events::new(EVENT_LOG_SIZE);
    let (bus, commands) = Bus::bind(config.inbound_port, config.outbound_port, &events).await?;

    if let Some(bound) = bound {
        bound
            .send((bus.inbound_port(), bus.outbound_port()))
            .expect("The receiver of the bound ports should not be dropped");
    }

    let relay = Relay::spawn(Box::new(TcpRequestChannel::connect(config.relay_port)));
    let reconciler = Reconciler::new(Box::new(SystemOpener), config.baud);

    info!(cadence_ms = config.cadence_ms, baud = config.baud, "Starting router");

    let router = Router::new(
        commands,
        events,
        relay,
        reconciler,
        Duration::from_millis(config.cadence_ms),
    );

    router.run().await;

    Ok(())
}

/// Run the gateway with the given configuration. Only returns on a
/// failed startup: once the router loop begins, it runs until the
/// process is terminated.
pub async fn run(config: Config) -> Result<(), Error> {
    run_inner(config, None).await
}

/// Like [`run`], but reports the actually bound bus ports on the
/// provided channel. Use port `0` in the config to let the OS pick.
pub async fn run_reporting_ports(
    config: Config,
    bound: oneshot::Sender<(u16, u16)>,
) -> Result<(), Error> {
    run_inner(config, Some(bound)).await
}
