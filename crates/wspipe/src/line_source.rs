//! Line acquisition from the input stream.
//!
//! The pump pulls lines on demand; a source never reads ahead of the message
//! currently being sent.

use std::io::{self, BufRead};

use thiserror::Error;
use tracing::warn;

const INPUT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::input");

/// A single input line, terminated by exactly one `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Line(String);

impl Line {
    /// Builds a line from text without its terminator, appending `\n`.
    #[must_use]
    pub(crate) fn from_unterminated(mut text: String) -> Self {
        text.push('\n');
        Self(text)
    }

    /// Returns the line, terminator included.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the line, returning its bytes.
    #[must_use]
    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.0.into_bytes()
    }
}

/// Errors raised while reading input lines.
#[derive(Debug, Error)]
pub(crate) enum InputError {
    /// The input stream failed for a reason other than end-of-stream.
    #[error("failed to read standard input: {0}")]
    Read(#[source] io::Error),
}

/// Supplies the next line to send.
pub(crate) trait LineSource {
    /// Returns the next line, or `None` once the stream is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`InputError`] when the stream reports a read failure.
    fn next_line(&mut self) -> Result<Option<Line>, InputError>;
}

/// Line source over any buffered reader, typically locked standard input.
pub(crate) struct ReaderLineSource<R> {
    reader: R,
    buffer: Vec<u8>,
    line_number: u64,
}

impl<R: BufRead> ReaderLineSource<R> {
    /// Wraps a buffered reader.
    pub(crate) const fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> LineSource for ReaderLineSource<R> {
    fn next_line(&mut self) -> Result<Option<Line>, InputError> {
        self.buffer.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.buffer)
            .map_err(InputError::Read)?;
        if read == 0 {
            return Ok(None);
        }
        self.line_number += 1;

        if self.buffer.last() == Some(&b'\n') {
            self.buffer.pop();
        }
        let text = match String::from_utf8(std::mem::take(&mut self.buffer)) {
            Ok(text) => text,
            Err(error) => {
                warn!(
                    target: INPUT_TARGET,
                    line = self.line_number,
                    "input line is not valid UTF-8; replacing invalid sequences"
                );
                String::from_utf8_lossy(error.as_bytes()).into_owned()
            }
        };
        Ok(Some(Line::from_unterminated(text)))
    }
}
