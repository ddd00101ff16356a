use std::collections::BTreeSet;

use tracing::warn;

/// Lists the OS device nodes that look like serial-over-USB devices.
///
/// A pure query apart from remembering the last good listing: a
/// transient enumeration failure returns the previous set unchanged
/// so the router's loop never trips over it.
#[derive(Debug, Default)]
pub struct Scanner {
    last: BTreeSet<String>,
}

#[cfg(target_os = "macos")]
fn is_usb_serial(path: &str) -> bool {
    path.contains("cu.usb")
}

#[cfg(not(target_os = "macos"))]
fn is_usb_serial(path: &str) -> bool {
    path.contains("ttyUSB") || path.contains("ttyACM")
}

impl Scanner {
    /// A scanner with no previous listing.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current set of matching device paths.
    pub fn scan(&mut self) -> BTreeSet<String> {
        match serialport::available_ports() {
            Ok(ports) => {
                self.last = ports
                    .into_iter()
                    .map(|port| port.port_name)
                    .filter(|name| is_usb_serial(name))
                    .collect();
            }
            Err(e) => {
                warn!(?e, "Could not list device nodes, keeping the previous set");
            }
        }

        self.last.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_os = "macos"))]
    fn usb_serial_pattern() {
        assert!(is_usb_serial("/dev/ttyUSB0"));
        assert!(is_usb_serial("/dev/ttyACM3"));

        assert!(!is_usb_serial("/dev/ttyS0"));
        assert!(!is_usb_serial("/dev/null"));
    }

    #[test]
    #[cfg(target_os = "macos")]
    fn usb_serial_pattern() {
        assert!(is_usb_serial("/dev/cu.usbmodem1101"));
        assert!(!is_usb_serial("/dev/cu.Bluetooth-Incoming-Port"));
    }
}
