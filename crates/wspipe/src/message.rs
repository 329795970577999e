//! The single in-flight outbound message.

use crate::line_source::Line;

/// One line being handed to the transport, with a resumable send cursor.
///
/// The payload is immutable once built; only the cursor moves. Transport
/// framing is not represented here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingMessage {
    payload: Vec<u8>,
    cursor: usize,
}

impl PendingMessage {
    /// Builds a message from a terminated line with the cursor at the start.
    #[must_use]
    pub(crate) fn from_line(line: Line) -> Self {
        Self {
            payload: line.into_bytes(),
            cursor: 0,
        }
    }

    /// Number of payload bytes, terminator included.
    #[must_use]
    pub(crate) const fn logical_len(&self) -> usize {
        self.payload.len()
    }

    /// Offset of the first byte not yet accepted by the transport.
    #[must_use]
    pub(crate) const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Bytes from the cursor to the end of the payload.
    #[must_use]
    pub(crate) fn unsent(&self) -> &[u8] {
        self.payload.get(self.cursor..).unwrap_or_default()
    }

    /// True once part of the message has already been accepted.
    #[must_use]
    pub(crate) const fn is_continuation(&self) -> bool {
        self.cursor > 0
    }

    /// Moves the cursor forward by `sent` bytes, saturating at the end.
    pub(crate) fn advance(&mut self, sent: usize) {
        self.cursor = self.cursor.saturating_add(sent).min(self.payload.len());
    }

    /// True when every byte has been accepted.
    #[must_use]
    pub(crate) const fn is_complete(&self) -> bool {
        self.cursor == self.payload.len()
    }
}
