//! Transport seam between the session and the websocket connection.
//!
//! The session never touches sockets directly. It reacts to
//! [`TransportEvent`]s returned by [`Transport::service`] and drives writes
//! through [`Transport::send_text`], so tests can substitute a scripted
//! transport for the real [`WebSocketTransport`].

mod errors;
mod poll;
mod websocket;

use std::time::Duration;

pub(crate) use self::errors::TransportError;
pub(crate) use self::websocket::{TransportSettings, WebSocketTransport};

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Events reported by a single service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TransportEvent {
    /// The opening handshake completed.
    Established,
    /// The connection could not be established.
    ConnectionError(String),
    /// A previously requested writable opportunity is ready.
    Writable,
    /// The connection closed, by the peer or by the network.
    Closed,
    /// The peer sent a message; inbound data is not forwarded anywhere.
    Inbound { len: usize },
}

/// Connection abstraction driven by the event loop.
pub(crate) trait Transport {
    /// Waits at most `timeout` for activity and returns the events that are
    /// ready, in the order they should be handled.
    ///
    /// An error here ends the event loop without failing the run.
    fn service(&mut self, timeout: Duration) -> Result<Vec<TransportEvent>, TransportError>;

    /// Asks for one [`TransportEvent::Writable`] from a later service call.
    ///
    /// Requests do not accumulate: asking again before the event is
    /// delivered still yields a single opportunity.
    fn request_writable(&mut self);

    /// Attempts one non-blocking write of `data` as part of a text message.
    ///
    /// `continuation` is true when earlier bytes of the same message were
    /// already accepted. Returns how many leading bytes of `data` the
    /// transport accepted; fewer than `data.len()` means the message stays
    /// open and the remainder must be offered again.
    fn send_text(&mut self, data: &[u8], continuation: bool) -> Result<usize, TransportError>;

    /// Performs the closing handshake after the last message was sent.
    fn close(&mut self) -> Result<(), TransportError>;
}
