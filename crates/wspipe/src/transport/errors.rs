//! Error types for the websocket transport.

use std::io;

use thiserror::Error;

/// Errors surfaced while preparing, servicing, or writing to the transport.
#[derive(Debug, Error)]
pub(crate) enum TransportError {
    #[error("invalid websocket URL for {endpoint}: {source}")]
    InvalidUrl {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid websocket handshake request for {endpoint}: {source}")]
    InvalidRequest {
        endpoint: String,
        #[source]
        source: Box<tungstenite::Error>,
    },
    #[error("failed to resolve websocket address {endpoint}: {source}")]
    Resolve {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("websocket at {endpoint} is not connected")]
    NotConnected { endpoint: String },
    #[error("failed to wait for websocket readiness on {endpoint}: {source}")]
    Poll {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("websocket service failed on {endpoint}: {source}")]
    Service {
        endpoint: String,
        #[source]
        source: Box<tungstenite::Error>,
    },
    #[error("websocket write failed on {endpoint}: {source}")]
    Write {
        endpoint: String,
        #[source]
        source: Box<tungstenite::Error>,
    },
    #[error("websocket close handshake failed on {endpoint}: {source}")]
    Close {
        endpoint: String,
        #[source]
        source: Box<tungstenite::Error>,
    },
}
