//! Test support for unit and behavioural coverage.
//!
//! Supplies scripted fakes for the pump and session, a real websocket server
//! for end-to-end scenarios, and the BDD world that runs the CLI against it.

mod scripted;

use std::cell::RefCell;
use std::ffi::OsString;
use std::io::Cursor;
use std::net::TcpListener;
use std::process::ExitCode;

use anyhow::{Context, Result, ensure};
use rstest::fixture;

pub(crate) use fake_server::{FakeServer, ServerLog};
pub(crate) use scripted::{SCRIPTED_ENDPOINT, ScriptedLines, ScriptedTransport};

use crate::run;

/// Scenario state: the server, the input fed to the CLI, and what came out.
#[derive(Default)]
pub(crate) struct TestWorld {
    server: Option<FakeServer>,
    port: Option<u16>,
    input: String,
    max_fragment: Option<usize>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: Option<ExitCode>,
    server_log: ServerLog,
}

impl TestWorld {
    pub(crate) fn start_server(&mut self) -> Result<()> {
        self.install_server(FakeServer::spawn()?);
        Ok(())
    }

    /// Starts a server that closes the connection after `messages` messages.
    pub(crate) fn start_closing_server(&mut self, messages: usize) -> Result<()> {
        self.install_server(FakeServer::closing_after(messages)?);
        Ok(())
    }

    fn install_server(&mut self, server: FakeServer) {
        self.port = Some(server.port());
        self.server = Some(server);
    }

    /// Picks a port that nothing listens on.
    pub(crate) fn reserve_closed_port(&mut self) -> Result<()> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind throwaway listener")?;
        self.port = Some(listener.local_addr().context("throwaway addr")?.port());
        Ok(())
    }

    /// Stores `escaped` as standard input, expanding `\n` escapes.
    pub(crate) fn set_input(&mut self, escaped: &str) {
        self.input = escaped.trim_matches('"').replace("\\n", "\n");
    }

    /// Stores `count` lines of the form `line N` as standard input.
    pub(crate) fn set_numbered_input(&mut self, count: usize) {
        self.input = (1..=count).map(|index| format!("line {index}\n")).collect();
    }

    pub(crate) const fn set_max_fragment(&mut self, bytes: usize) {
        self.max_fragment = Some(bytes);
    }

    /// Runs the CLI against the world's port and `path`.
    pub(crate) fn run_against(&mut self, path: &str) -> Result<()> {
        let port = self.port.context("no port configured")?;
        let mut args = vec![String::from("--log-filter"), String::from("off")];
        if let Some(bytes) = self.max_fragment {
            args.push(String::from("--max-fragment"));
            args.push(bytes.to_string());
        }
        args.extend([
            String::from("127.0.0.1"),
            port.to_string(),
            path.trim_matches('"').to_owned(),
        ]);
        self.run_with(args)
    }

    /// Runs the CLI with whitespace-separated `arguments`.
    pub(crate) fn run_with_arguments(&mut self, arguments: &str) -> Result<()> {
        let args = arguments
            .trim_matches('"')
            .split_whitespace()
            .map(str::to_owned)
            .collect();
        self.run_with(args)
    }

    fn run_with(&mut self, args: Vec<String>) -> Result<()> {
        self.stdout.clear();
        self.stderr.clear();
        let argv =
            std::iter::once(OsString::from("wspipe")).chain(args.into_iter().map(OsString::from));
        let stdin = Cursor::new(self.input.clone().into_bytes());
        let exit = run(argv, stdin, &mut self.stdout, &mut self.stderr);
        self.exit_code = Some(exit);
        if let Some(mut server) = self.server.take() {
            self.server_log = server.finish()?;
        }
        Ok(())
    }

    pub(crate) const fn port(&self) -> Option<u16> {
        self.port
    }

    pub(crate) fn received(&self) -> &[String] {
        &self.server_log.messages
    }

    /// Handshake headers and messages the server recorded.
    pub(crate) const fn server_log(&self) -> &ServerLog {
        &self.server_log
    }

    pub(crate) fn stdout_text(&self) -> Result<String> {
        String::from_utf8(self.stdout.clone()).context("stdout utf8")
    }

    pub(crate) fn stderr_text(&self) -> Result<String> {
        String::from_utf8(self.stderr.clone()).context("stderr utf8")
    }

    pub(crate) fn assert_exit_code(&self, expected: u8) -> Result<()> {
        let exit = self.exit_code.context("exit code recorded")?;
        ensure!(
            exit == ExitCode::from(expected),
            "expected exit code {expected}, got {exit:?}"
        );
        Ok(())
    }
}

#[fixture]
pub(crate) fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::default())
}
