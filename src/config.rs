use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::Error;

fn default_inbound_port() -> u16 {
    5558
}

fn default_outbound_port() -> u16 {
    5559
}

fn default_relay_port() -> u16 {
    3013
}

fn default_cadence_ms() -> u64 {
    200
}

fn default_baud() -> u32 {
    9600
}

/// The configuration used for running the gateway.
///
/// Every field has a default, so a config file may name only what it
/// wants to change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The port clients push commands to.
    #[serde(default = "default_inbound_port")]
    pub inbound_port: u16,

    /// The port events are published on.
    #[serde(default = "default_outbound_port")]
    pub outbound_port: u16,

    /// The port of the downstream request/reply peer.
    #[serde(default = "default_relay_port")]
    pub relay_port: u16,

    /// How often to check the device tree, in milliseconds.
    #[serde(default = "default_cadence_ms")]
    pub cadence_ms: u64,

    /// The baud rate devices are opened with.
    #[serde(default = "default_baud")]
    pub baud: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inbound_port: default_inbound_port(),
            outbound_port: default_outbound_port(),
            relay_port: default_relay_port(),
            cadence_ms: default_cadence_ms(),
            baud: default_baud(),
        }
    }
}

impl Config {
    fn ron() -> ron::Options {
        ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .with_default_extension(ron::extensions::Extensions::UNWRAP_NEWTYPES)
    }

    /// Deserialize a .ron file's contents.
    /// Panics if the input is not valid .ron.
    pub fn deserialize(input: &str) -> Self {
        Self::ron().from_str::<Config>(input).unwrap()
    }

    /// An example configuration: the defaults, spelled out.
    pub fn example() -> Self {
        Self::default()
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> String {
        Self::ron()
            .to_string_pretty(self, ron::ser::PrettyConfig::default())
            .unwrap()
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Self {
        let s = std::fs::read_to_string(p).unwrap();

        Self::deserialize(&s)
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        let duplicates = [self.inbound_port, self.outbound_port, self.relay_port]
            .into_iter()
            .filter(|port| *port != 0)
            .duplicates()
            .collect::<Vec<_>>();

        if duplicates.is_empty() {
            Ok(())
        } else {
            Err(Error::BadConfig(format!(
                "The bus and relay ports must be distinct. Duplicates: {duplicates:?}"
            )))
        }
    }
}
