use crate::error::Error;

/// The tokio-serial backed link and its opener.
pub mod port;

/// A line-oriented serial session as the gateway sees it.
///
/// The implementation owns the actual I/O (see [`port`]); this surface
/// is deliberately non-blocking so the router's loop can poll every
/// link once per iteration without ever stalling on a device.
pub trait SerialLink: Send {
    /// One non-blocking read attempt.
    /// Returns a line without its terminator, if one is buffered.
    fn try_read_line(&mut self) -> Option<String>;

    /// Queue a line for writing. The line terminator is the link's concern.
    ///
    /// Callers are expected to check [`SerialLink::is_good`] first;
    /// this still fails if the link died in between.
    fn write_line(&mut self, line: &str) -> Result<(), Error>;

    /// Drop any input buffered so far.
    fn clear(&mut self);

    /// Whether the underlying handle is open and has seen no errors.
    fn is_good(&self) -> bool;

    /// Release the underlying handle. Calling this twice is a no-op.
    fn close(&mut self);
}

/// Opens serial links. The seam between the hotplug reconciler and
/// the actual hardware; tests substitute a scripted opener.
pub trait SerialOpener: Send + Sync {
    /// Attempt to open the device node at `path`.
    fn open(&self, path: &str, baud: u32) -> Result<Box<dyn SerialLink>, Error>;
}
