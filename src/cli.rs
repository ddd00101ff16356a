use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::Level;

use crate::config::Config;

/// The command line interface for serial bridge.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a configuration file
    pub config: Option<PathBuf>,

    /// The port clients push commands to, overrides the config file
    #[arg(long)]
    pub inbound_port: Option<u16>,

    /// The port events are published on, overrides the config file
    #[arg(long)]
    pub outbound_port: Option<u16>,

    /// The port of the downstream request/reply peer, overrides the config file
    #[arg(long)]
    pub relay_port: Option<u16>,

    /// Device check cadence in milliseconds, overrides the config file
    #[arg(long)]
    pub cadence: Option<u64>,

    /// Baud rate, overrides the config file
    #[arg(long)]
    pub baud: Option<u32>,

    /// Log verbosity level [trace, debug, info, warn, error]
    #[arg(long, default_value = "info")]
    pub log_level: Level,

    /// Also log to daily-rolling files in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The effective configuration: file (or defaults), then flag overrides.
    pub fn effective_config(&self) -> Config {
        let mut config = match &self.config {
            Some(path) => Config::new_from_path(path),
            None => Config::default(),
        };

        if let Some(port) = self.inbound_port {
            config.inbound_port = port;
        }
        if let Some(port) = self.outbound_port {
            config.outbound_port = port;
        }
        if let Some(port) = self.relay_port {
            config.relay_port = port;
        }
        if let Some(cadence) = self.cadence {
            config.cadence_ms = cadence;
        }
        if let Some(baud) = self.baud {
            config.baud = baud;
        }

        config
    }
}

/// Commands available in the command line interface.
#[derive(Subcommand)]
pub enum Commands {
    /// Examples for user convenience.
    #[clap(subcommand)]
    Examples(Examples),
}

/// Helpful examples for users.
#[derive(Subcommand, Clone)]
pub enum Examples {
    /// Show an example of a configuration file's contents.
    Config,

    /// Show example JSON commands a client may send.
    Commands,

    /// Show example JSON events the gateway publishes.
    Events,
}

/// Print whatever the given subcommand asks for.
pub fn handle_command(command: Commands) {
    let Commands::Examples(example) = command;

    match example {
        Examples::Config => println!("{}", Config::example().serialize_pretty()),
        Examples::Commands => {
            for doc in [
                json!({ "connected": "my-client" }),
                json!({
                    "stream": "stream-id",
                    "user": "user-id",
                    "device": "/dev/ttyUSB0",
                    "sequence": "sequence-id",
                }),
                json!({ "send": { "data": "LED_ON", "id": "bot-1" } }),
                json!({ "send": { "data": "LED_ON", "device": "/dev/ttyUSB0" } }),
                json!({ "send": { "data": "LED_ON" } }),
            ] {
                println!("{doc}");
            }
        }
        Examples::Events => {
            for doc in [
                json!({ "device": "/dev/ttyUSB0" }),
                json!({ "id": { "device": "/dev/ttyUSB0", "name": "bot-1" } }),
                json!({ "received": { "device": "/dev/ttyUSB0", "data": "hello" } }),
                json!({ "sent": "/dev/ttyUSB0" }),
                json!({ "removed": "/dev/ttyUSB0" }),
                json!({ "error": "couldnt send" }),
            ] {
                println!("{doc}");
            }
        }
    }
}
