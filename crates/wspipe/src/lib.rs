//! Line-oriented bridge from standard input to a websocket.
//!
//! Every newline-terminated line read from input becomes one websocket text
//! message, sent in order to a single destination. Writes never block the
//! event loop: a line the connection cannot take in one go is resumed from
//! where it stopped at the next writable opportunity, and only one message
//! is ever in flight.
//!
//! The binary is a thin wrapper around [`run`], which tests drive with
//! in-memory streams.

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use tracing::info;

mod cli;
mod config;
mod driver;
mod endpoint;
mod errors;
mod line_source;
mod message;
mod pump;
mod session;
mod telemetry;
mod transport;

#[cfg(test)]
mod tests;

use cli::Cli;
use config::Config;
use driver::{DriveOutcome, drive};
use errors::{AppError, USAGE_EXIT};
use line_source::ReaderLineSource;
use session::Session;
use transport::WebSocketTransport;

const RUN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::run");

/// Runs `wspipe` with explicit arguments and streams.
///
/// `args` includes the program name. Lines are read from `stdin`; help and
/// version output goes to `stdout`; usage errors and fatal errors go to
/// `stderr`. Status diagnostics go through `tracing` to the process's
/// standard error.
///
/// Returns success after a normal disconnection, `1` for a malformed
/// invocation, and `2` for any fatal runtime failure.
pub fn run<I, R, W, E>(args: I, stdin: R, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => return report_parse_error(&error, stdout, stderr),
    };

    match execute(Config::from(cli), stdin) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(stderr, "wspipe: {error}");
            error.exit_code()
        }
    }
}

fn report_parse_error<W, E>(error: &clap::Error, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    W: Write,
    E: Write,
{
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = write!(stdout, "{}", error.render());
            ExitCode::SUCCESS
        }
        _ => {
            let _ = write!(stderr, "{}", error.render());
            ExitCode::from(USAGE_EXIT)
        }
    }
}

fn execute<R: BufRead>(config: Config, stdin: R) -> Result<(), AppError> {
    telemetry::initialise(&config.log)?;

    let destination = config.destination;
    info!(
        target: RUN_TARGET,
        endpoint = %destination,
        "waiting for connection to {destination}"
    );

    let mut transport =
        WebSocketTransport::prepare(&destination, config.transport).map_err(AppError::Setup)?;
    let mut source = ReaderLineSource::new(stdin);
    let mut session = Session::new(destination);

    let outcome = drive(
        &mut session,
        &mut transport,
        &mut source,
        config.service_timeout,
    )?;

    let stats = session.stats();
    info!(
        target: RUN_TARGET,
        endpoint = %session.destination(),
        messages = stats.messages,
        bytes = stats.bytes,
        input_exhausted = outcome == DriveOutcome::InputExhausted,
        "disconnected from {}",
        session.destination()
    );
    Ok(())
}
