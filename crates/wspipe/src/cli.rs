//! Command-line argument definitions.

use std::num::NonZeroUsize;

use clap::Parser;

use crate::config::LogFormat;

/// Pipes standard input to a websocket, one text message per line.
#[derive(Parser, Debug)]
#[command(name = "wspipe", version, about)]
pub(crate) struct Cli {
    /// Host name or address of the websocket server.
    #[arg(value_name = "HOST")]
    pub(crate) host: String,
    /// TCP port of the websocket server.
    #[arg(value_name = "PORT")]
    pub(crate) port: u16,
    /// Request path, starting with `/`.
    #[arg(value_name = "PATH", value_parser = parse_path)]
    pub(crate) path: String,
    /// Tracing filter directive for diagnostics on standard error.
    #[arg(long, value_name = "FILTER", default_value = "info")]
    pub(crate) log_filter: String,
    /// Diagnostic output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub(crate) log_format: LogFormat,
    /// Most bytes handed to the connection in one write.
    #[arg(long, value_name = "BYTES", default_value = "4096")]
    pub(crate) max_fragment: NonZeroUsize,
    /// Longest wait of each event loop iteration, in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 50)]
    pub(crate) service_timeout_ms: u64,
    /// Subprotocol offered in the opening handshake; empty offers none.
    #[arg(long, value_name = "NAME", default_value = "wspipe")]
    pub(crate) protocol: String,
}

fn parse_path(raw: &str) -> Result<String, String> {
    if raw.starts_with('/') {
        Ok(raw.to_owned())
    } else {
        Err(format!("path must start with '/', got '{raw}'"))
    }
}
