#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

/// The command line interface.
pub mod cli;

/// Relates to config files.
pub mod config;

/// Possible errors in this library.
pub mod error;

/// Logging/tracing setup.
pub mod logging;

/// Inbound bus commands and how raw documents map onto them.
pub mod commands;

/// Events the gateway publishes on the bus.
pub mod events;

/// The serial link boundary: what the gateway requires of a serial session.
pub mod serial;

/// Mocked serial links and request channels, useful to test without
/// the actual hardware or a live downstream peer.
pub mod mock;

/// One serial device's session and its identification state machine.
pub mod connection;

/// The live set of connections.
pub mod registry;

/// Lists the OS device nodes that look like serial-over-USB devices.
pub mod scanner;

/// Reconciles the live connection set against the device nodes.
pub mod hotplug;

/// The main loop: drains the bus, the devices and the device tree.
pub mod router;

/// Relays stream-bound device output to a downstream request/reply peer.
pub mod relay;

/// The bus transport: inbound commands, outbound events.
pub mod bus;

/// Binds the transports and wires the router together.
pub mod server;

/// A small bus client, mostly for tests and experiments.
pub mod client;
