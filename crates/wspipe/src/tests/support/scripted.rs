//! Scripted stand-ins for the line source and the transport.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use crate::line_source::{InputError, Line, LineSource};
use crate::transport::{Transport, TransportError, TransportEvent};

/// Display form of the destination the scripted transport reports in errors.
pub(crate) const SCRIPTED_ENDPOINT: &str = "localhost:9000/feed";

/// Service calls allowed before the scripted transport gives up, so a stuck
/// event loop fails the test instead of hanging it.
const SERVICE_BUDGET: usize = 10_000;

/// Line source fed from a fixed list.
pub(crate) struct ScriptedLines {
    lines: VecDeque<String>,
    failing: bool,
    fetched: usize,
}

impl ScriptedLines {
    pub(crate) fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|line| (*line).to_owned()).collect(),
            failing: false,
            fetched: 0,
        }
    }

    /// A source whose every read fails.
    pub(crate) fn failing() -> Self {
        Self {
            lines: VecDeque::new(),
            failing: true,
            fetched: 0,
        }
    }

    /// Number of lines handed out so far.
    pub(crate) const fn fetched(&self) -> usize {
        self.fetched
    }
}

impl LineSource for ScriptedLines {
    fn next_line(&mut self) -> Result<Option<Line>, InputError> {
        if self.failing {
            return Err(InputError::Read(io::Error::other("scripted read failure")));
        }
        let line = self.lines.pop_front().map(Line::from_unterminated);
        if line.is_some() {
            self.fetched += 1;
        }
        Ok(line)
    }
}

/// Transport that accepts a scripted number of bytes per write.
///
/// Queued events are returned by the next service call. A pending writable
/// request is answered with [`TransportEvent::Writable`] after them. Asking
/// for a second opportunity before the first is delivered panics.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    limits: VecDeque<usize>,
    default_limit: Option<usize>,
    pending: VecDeque<TransportEvent>,
    requests: usize,
    peak_requests: usize,
    writes: Vec<(Vec<u8>, bool)>,
    fail_writes: bool,
    fail_service: bool,
    fail_close: bool,
    closed_gracefully: bool,
    services: usize,
}

impl ScriptedTransport {
    /// Accepts every write in full.
    pub(crate) fn unlimited() -> Self {
        Self::default()
    }

    /// Accepts at most `limit` bytes per write.
    pub(crate) fn with_limit(limit: usize) -> Self {
        Self {
            default_limit: Some(limit),
            ..Self::default()
        }
    }

    /// Uses `limits` for successive writes, then accepts writes in full.
    pub(crate) fn with_limits(limits: &[usize]) -> Self {
        Self {
            limits: limits.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub(crate) fn push_event(&mut self, event: TransportEvent) {
        self.pending.push_back(event);
    }

    pub(crate) const fn fail_writes(&mut self) {
        self.fail_writes = true;
    }

    pub(crate) const fn fail_service(&mut self) {
        self.fail_service = true;
    }

    pub(crate) const fn fail_close(&mut self) {
        self.fail_close = true;
    }

    /// Writable requests made since the last delivered opportunity.
    pub(crate) const fn outstanding_requests(&self) -> usize {
        self.requests
    }

    /// Consumes the outstanding request, as a delivered opportunity would.
    pub(crate) fn take_writable(&mut self) -> bool {
        std::mem::take(&mut self.requests) > 0
    }

    /// Most writable requests ever outstanding at once.
    pub(crate) const fn peak_requests(&self) -> usize {
        self.peak_requests
    }

    pub(crate) const fn closed_gracefully(&self) -> bool {
        self.closed_gracefully
    }

    /// Bytes accepted by each non-empty write, in order.
    pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.iter().map(|(bytes, _)| bytes.clone()).collect()
    }

    /// Accepted writes reassembled into messages as a peer would see them.
    pub(crate) fn messages(&self) -> Vec<String> {
        let mut messages: Vec<Vec<u8>> = Vec::new();
        for (bytes, continuation) in &self.writes {
            match messages.last_mut() {
                Some(current) if *continuation => current.extend_from_slice(bytes),
                _ => messages.push(bytes.clone()),
            }
        }
        messages
            .into_iter()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .collect()
    }

    fn scripted_failure(message: &str) -> Box<tungstenite::Error> {
        Box::new(tungstenite::Error::Io(io::Error::other(message.to_owned())))
    }
}

impl Transport for ScriptedTransport {
    fn service(&mut self, _timeout: Duration) -> Result<Vec<TransportEvent>, TransportError> {
        self.services += 1;
        if self.fail_service || self.services > SERVICE_BUDGET {
            return Err(TransportError::Service {
                endpoint: SCRIPTED_ENDPOINT.to_owned(),
                source: Self::scripted_failure("scripted service failure"),
            });
        }
        let mut events: Vec<TransportEvent> = self.pending.drain(..).collect();
        if self.take_writable() {
            events.push(TransportEvent::Writable);
        }
        Ok(events)
    }

    fn request_writable(&mut self) {
        assert_eq!(
            self.requests, 0,
            "writable opportunity requested while one is outstanding"
        );
        self.requests += 1;
        self.peak_requests = self.peak_requests.max(self.requests);
    }

    fn send_text(&mut self, data: &[u8], continuation: bool) -> Result<usize, TransportError> {
        if self.fail_writes {
            return Err(TransportError::Write {
                endpoint: SCRIPTED_ENDPOINT.to_owned(),
                source: Self::scripted_failure("scripted write failure"),
            });
        }
        let limit = self.limits.pop_front().or(self.default_limit);
        let accepted = limit.map_or(data.len(), |limit| limit.min(data.len()));
        if accepted > 0 {
            self.writes.push((data[..accepted].to_vec(), continuation));
        }
        Ok(accepted)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.fail_close {
            return Err(TransportError::Close {
                endpoint: SCRIPTED_ENDPOINT.to_owned(),
                source: Self::scripted_failure("scripted close failure"),
            });
        }
        self.closed_gracefully = true;
        Ok(())
    }
}
