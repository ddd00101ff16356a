use thiserror::Error;

/// Errors that may occur in this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration makes no sense.
    #[error("Bad config: {0}")]
    BadConfig(String),

    /// A bus port could not be bound.
    /// This is the only fatal startup error.
    #[error("Could not bind the {role} port {port}: {source}")]
    Bind {
        /// Which transport the port belongs to.
        role: &'static str,

        /// The requested port.
        port: u16,

        /// The underlying bind failure.
        source: std::io::Error,
    },

    /// A serial device could not be opened.
    #[error("Could not open the port at `{path}`: {problem}")]
    SerialOpen {
        /// The device node path.
        path: String,

        /// What went wrong while opening.
        problem: String,
    },

    /// The serial link's I/O task is gone.
    #[error("The serial link for `{0}` is closed")]
    LinkClosed(String),

    /// The downstream peer is not ready to receive.
    #[error("The downstream peer is not ready to receive")]
    PeerNotReady,
}

impl Error {
    /// Get the inner message if this is a bad config error.
    pub fn try_into_bad_config(self) -> Result<String, Self> {
        match self {
            Error::BadConfig(message) => Ok(message),
            others => Err(others),
        }
    }
}
