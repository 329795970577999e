//! Outbound write pump.
//!
//! The pump runs once per writable opportunity. It either fetches the next
//! line or resumes the message already in flight, makes exactly one write
//! attempt, and then asks the transport for the next opportunity. Only one
//! message is ever pending and only one opportunity is ever requested.

use thiserror::Error;
use tracing::trace;

use crate::line_source::{InputError, LineSource};
use crate::message::PendingMessage;
use crate::transport::{Transport, TransportError};

const PUMP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pump");

/// Where the pump stands between writable opportunities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PumpState {
    /// No pending message; the next opportunity fetches a line.
    NeedLine,
    /// A message is partly accepted by the transport.
    Sending(PendingMessage),
    /// The last message was fully accepted; behaves like `NeedLine`.
    Complete,
    /// Input is exhausted; the session is closing.
    Draining,
}

/// Result of one writable opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOutcome {
    /// Part of the message was accepted; it remains pending.
    Partial { sent: usize, remaining: usize },
    /// The last `sent` bytes of a `len`-byte message were accepted.
    Completed { sent: usize, len: usize },
    /// The line source is exhausted; no further opportunity was requested.
    Drained,
}

/// Failures that end the session from inside the pump.
#[derive(Debug, Error)]
pub(crate) enum PumpError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Write(TransportError),
}

/// State machine feeding lines to the transport.
#[derive(Debug)]
pub(crate) struct WritePump {
    state: PumpState,
}

impl Default for WritePump {
    fn default() -> Self {
        Self::new()
    }
}

impl WritePump {
    pub(crate) const fn new() -> Self {
        Self {
            state: PumpState::NeedLine,
        }
    }

    pub(crate) const fn state(&self) -> &PumpState {
        &self.state
    }

    /// Handles one writable opportunity.
    ///
    /// Errors are fatal to the session: the line source failed, or the
    /// transport rejected the write outright.
    pub(crate) fn on_writable<S, T>(
        &mut self,
        source: &mut S,
        transport: &mut T,
    ) -> Result<WriteOutcome, PumpError>
    where
        S: LineSource + ?Sized,
        T: Transport + ?Sized,
    {
        let mut message = match std::mem::replace(&mut self.state, PumpState::NeedLine) {
            PumpState::Sending(message) => message,
            PumpState::NeedLine | PumpState::Complete => match source.next_line()? {
                Some(line) => PendingMessage::from_line(line),
                None => {
                    self.state = PumpState::Draining;
                    return Ok(WriteOutcome::Drained);
                }
            },
            PumpState::Draining => {
                self.state = PumpState::Draining;
                return Ok(WriteOutcome::Drained);
            }
        };

        let requested = message.unsent().len();
        let sent = transport
            .send_text(message.unsent(), message.is_continuation())
            .map_err(PumpError::Write)?;
        message.advance(sent);
        let cursor = message.cursor();

        let outcome = if message.is_complete() {
            self.state = PumpState::Complete;
            WriteOutcome::Completed {
                sent,
                len: message.logical_len(),
            }
        } else {
            let remaining = message.unsent().len();
            self.state = PumpState::Sending(message);
            WriteOutcome::Partial { sent, remaining }
        };
        trace!(target: PUMP_TARGET, requested, sent, cursor, "write attempt");

        transport.request_writable();
        Ok(outcome)
    }
}
