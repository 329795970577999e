//! Destination identity for the websocket session.

use std::fmt;

use url::Url;

/// Remote websocket endpoint named on the command line.
///
/// The display form, `host:port/path`, is embedded in every status line and
/// diagnostic so failures can be attributed without further context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Destination {
    host: String,
    port: u16,
    path: String,
}

impl Destination {
    /// Builds a destination from its parts.
    #[must_use]
    pub(crate) fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.into(),
        }
    }

    /// Returns the host name or address.
    #[must_use]
    pub(crate) fn host(&self) -> &str {
        &self.host
    }

    /// Returns the TCP port.
    #[must_use]
    pub(crate) const fn port(&self) -> u16 {
        self.port
    }

    /// Builds the `ws://` URL used for the opening handshake.
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] when the host or path cannot form a URL.
    pub(crate) fn url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("ws://{}:{}{}", self.host, self.port, self.path))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}{}", self.host, self.port, self.path)
    }
}
