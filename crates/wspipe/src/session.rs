//! Connection session and lifecycle handling.
//!
//! A [`Session`] is owned by the caller for the whole run. The driver hands
//! it every transport event; the session reacts to lifecycle changes itself
//! and delegates writable opportunities to its [`WritePump`].

use tracing::{debug, info, trace};

use crate::endpoint::Destination;
use crate::errors::SessionError;
use crate::line_source::LineSource;
#[cfg(test)]
use crate::pump::PumpState;
use crate::pump::{PumpError, WriteOutcome, WritePump};
use crate::transport::{Transport, TransportEvent};

const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Why a session stopped accepting events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseReason {
    /// The line source reported end-of-stream.
    EndOfInput,
    /// The transport reported that the connection closed.
    PeerClosed,
}

/// Totals reported when the session ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionStats {
    pub(crate) messages: u64,
    pub(crate) bytes: u64,
}

/// State for one connection, from context creation to disconnection.
#[derive(Debug)]
pub(crate) struct Session {
    destination: Destination,
    closed: Option<CloseReason>,
    pump: WritePump,
    stats: SessionStats,
}

impl Session {
    pub(crate) const fn new(destination: Destination) -> Self {
        Self {
            destination,
            closed: None,
            pump: WritePump::new(),
            stats: SessionStats {
                messages: 0,
                bytes: 0,
            },
        }
    }

    pub(crate) const fn destination(&self) -> &Destination {
        &self.destination
    }

    /// True once the session has closed; never reverts.
    pub(crate) const fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    pub(crate) const fn close_reason(&self) -> Option<CloseReason> {
        self.closed
    }

    pub(crate) const fn stats(&self) -> SessionStats {
        self.stats
    }

    #[cfg(test)]
    pub(crate) const fn pump_state(&self) -> &PumpState {
        self.pump.state()
    }

    /// Records the close. Later calls keep the first reason.
    const fn mark_closed(&mut self, reason: CloseReason) {
        if self.closed.is_none() {
            self.closed = Some(reason);
        }
    }

    /// Reacts to one transport event.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] for connection failures and for fatal pump
    /// failures. Nothing is retried.
    pub(crate) fn handle_event<S, T>(
        &mut self,
        event: TransportEvent,
        source: &mut S,
        transport: &mut T,
    ) -> Result<(), SessionError>
    where
        S: LineSource + ?Sized,
        T: Transport + ?Sized,
    {
        match event {
            TransportEvent::Established => {
                info!(
                    target: SESSION_TARGET,
                    endpoint = %self.destination,
                    "connected to websocket at {}",
                    self.destination
                );
                transport.request_writable();
            }
            TransportEvent::ConnectionError(reason) => {
                return Err(SessionError::ConnectionFailed {
                    endpoint: self.destination.to_string(),
                    reason,
                });
            }
            TransportEvent::Closed => {
                debug!(
                    target: SESSION_TARGET,
                    pump = ?self.pump.state(),
                    "connection closed"
                );
                self.mark_closed(CloseReason::PeerClosed);
            }
            TransportEvent::Writable => self.on_writable(source, transport)?,
            TransportEvent::Inbound { len } => {
                trace!(target: SESSION_TARGET, len, "ignoring inbound message");
            }
        }
        Ok(())
    }

    fn on_writable<S, T>(&mut self, source: &mut S, transport: &mut T) -> Result<(), SessionError>
    where
        S: LineSource + ?Sized,
        T: Transport + ?Sized,
    {
        if self.is_closed() {
            debug!(target: SESSION_TARGET, "discarding writable opportunity after close");
            return Ok(());
        }

        let outcome = self
            .pump
            .on_writable(source, transport)
            .map_err(|error| self.pump_failure(error))?;
        match outcome {
            WriteOutcome::Partial { sent, remaining } => {
                trace!(target: SESSION_TARGET, sent, remaining, "message partly sent");
                self.record_bytes(sent);
            }
            WriteOutcome::Completed { sent, len } => {
                trace!(target: SESSION_TARGET, sent, len, "message sent");
                self.stats.messages += 1;
                self.record_bytes(sent);
            }
            WriteOutcome::Drained => {
                debug!(target: SESSION_TARGET, "input exhausted");
                self.mark_closed(CloseReason::EndOfInput);
            }
        }
        Ok(())
    }

    fn record_bytes(&mut self, sent: usize) {
        self.stats.bytes = self
            .stats
            .bytes
            .saturating_add(u64::try_from(sent).unwrap_or(u64::MAX));
    }

    fn pump_failure(&self, error: PumpError) -> SessionError {
        match error {
            PumpError::Input(source) => SessionError::Input {
                endpoint: self.destination.to_string(),
                source,
            },
            PumpError::Write(source) => SessionError::WriteFailed(source),
        }
    }
}
