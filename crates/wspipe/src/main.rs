//! `wspipe` binary: forwards standard input to a websocket, line by line.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let stdin = io::stdin().lock();
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    wspipe::run(std::env::args_os(), stdin, &mut stdout, &mut stderr)
}
