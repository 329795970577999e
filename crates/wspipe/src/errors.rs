//! Error types and exit-code mapping for the runtime.

use std::process::ExitCode;

use thiserror::Error;

use crate::line_source::InputError;
use crate::telemetry::TelemetryError;
use crate::transport::TransportError;

/// Exit status for a malformed invocation.
pub(crate) const USAGE_EXIT: u8 = 1;
/// Exit status for any fatal runtime failure.
pub(crate) const FATAL_EXIT: u8 = 2;

/// Fatal conditions raised while a session is running.
#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("failed to connect to websocket at {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },
    #[error(transparent)]
    WriteFailed(TransportError),
    #[error("{source} (while sending to {endpoint})")]
    Input {
        endpoint: String,
        #[source]
        source: InputError,
    },
}

/// Failures after argument parsing that end the process with a non-zero status.
#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Setup(TransportError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AppError {
    pub(crate) fn exit_code(&self) -> ExitCode {
        match self {
            Self::Telemetry(_) => ExitCode::from(USAGE_EXIT),
            Self::Setup(_) | Self::Session(_) => ExitCode::from(FATAL_EXIT),
        }
    }
}
