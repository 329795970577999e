//! Event loop driving a session to completion.

use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::SessionError;
use crate::line_source::LineSource;
use crate::session::{CloseReason, Session};
use crate::transport::Transport;

const DRIVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::driver");

/// How the event loop ended without a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DriveOutcome {
    /// Every line was handed to the transport.
    InputExhausted,
    /// The connection closed first.
    PeerClosed,
    /// Servicing the transport failed; treated as a disconnection.
    ServiceFailed,
}

/// Services `transport` until the session closes, dispatching each event to
/// `session` in the order the transport reported it.
///
/// When input ran out, the connection is closed gracefully afterwards. A
/// failure during that close is logged only.
///
/// # Errors
///
/// Returns the first fatal [`SessionError`] raised by the session.
pub(crate) fn drive<S, T>(
    session: &mut Session,
    transport: &mut T,
    source: &mut S,
    timeout: Duration,
) -> Result<DriveOutcome, SessionError>
where
    S: LineSource + ?Sized,
    T: Transport + ?Sized,
{
    while !session.is_closed() {
        let events = match transport.service(timeout) {
            Ok(events) => events,
            Err(error) => {
                warn!(
                    target: DRIVER_TARGET,
                    endpoint = %session.destination(),
                    %error,
                    "servicing the connection failed"
                );
                return Ok(DriveOutcome::ServiceFailed);
            }
        };
        for event in events {
            session.handle_event(event, source, transport)?;
        }
    }

    match session.close_reason() {
        Some(CloseReason::EndOfInput) => {
            debug!(target: DRIVER_TARGET, "closing connection after end of input");
            if let Err(error) = transport.close() {
                warn!(
                    target: DRIVER_TARGET,
                    endpoint = %session.destination(),
                    %error,
                    "closing handshake failed"
                );
            }
            Ok(DriveOutcome::InputExhausted)
        }
        Some(CloseReason::PeerClosed) | None => Ok(DriveOutcome::PeerClosed),
    }
}
