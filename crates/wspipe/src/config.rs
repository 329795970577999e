//! Runtime configuration resolved from the command line.

use std::time::Duration;

use clap::ValueEnum;

use crate::cli::Cli;
use crate::endpoint::Destination;
use crate::transport::TransportSettings;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Format of diagnostic output.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub(crate) enum LogFormat {
    /// Single-line human-readable records.
    #[default]
    Compact,
    /// One JSON object per record.
    Json,
}

/// Logging settings handed to telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogSettings {
    pub(crate) filter: String,
    pub(crate) format: LogFormat,
}

/// Everything a run needs, fixed before the connection starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Config {
    pub(crate) destination: Destination,
    pub(crate) transport: TransportSettings,
    pub(crate) service_timeout: Duration,
    pub(crate) log: LogSettings,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            destination: Destination::new(cli.host, cli.port, cli.path),
            transport: TransportSettings {
                max_fragment: cli.max_fragment,
                connect_timeout: CONNECT_TIMEOUT,
                close_timeout: CLOSE_TIMEOUT,
                subprotocol: Some(cli.protocol).filter(|name| !name.is_empty()),
            },
            service_timeout: Duration::from_millis(cli.service_timeout_ms),
            log: LogSettings {
                filter: cli.log_filter,
                format: cli.log_format,
            },
        }
    }
}
