//! Line transports to engine subprocesses.
//!
//! A [`Transport`] is the only way an [`EngineClient`] talks to its engine.
//! [`ProcessTransport`] is the real pipe pair of a spawned child; tests plug
//! in scripted in-memory engines instead.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;

use crate::uci_client::{EngineClient, EngineError};

/// A bidirectional, newline-delimited text channel to one engine.
pub trait Transport: Send {
    /// Writes one line. The terminator is appended by the transport.
    fn send(&mut self, line: &str) -> Result<(), EngineError>;

    /// Blocks until the next complete line arrives and returns it without its
    /// terminator. End of stream is [`EngineError::Disconnected`].
    fn recv(&mut self) -> Result<String, EngineError>;

    /// Releases the channel and waits for the peer to go away.
    fn close(&mut self) -> Result<(), EngineError>;
}

/// Rejects lines that would break the one-message-per-line framing.
pub(crate) fn check_line(line: &str) -> Result<(), EngineError> {
    if line.contains(['\n', '\r']) {
        return Err(EngineError::Protocol(format!(
            "refusing to send line with embedded newline: {:?}",
            line
        )));
    }
    Ok(())
}

/// Transport over the stdin/stdout pipes of a spawned engine process.
///
/// The engine's stderr is forwarded line by line to the log. Dropping a
/// transport that was never closed kills the child.
pub struct ProcessTransport {
    program: PathBuf,
    process: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    reaped: bool,
}

impl ProcessTransport {
    /// Spawns `program` with all three standard streams piped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Transport`] if the process cannot be spawned,
    /// typically because the executable doesn't exist or lacks permissions.
    pub fn spawn<P: AsRef<Path>>(program: P) -> Result<Self, EngineError> {
        let program = program.as_ref().to_path_buf();
        tracing::info!(program = %program.display(), "launching engine");

        let mut process = Command::new(&program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let (Some(stdin), Some(stdout)) = (process.stdin.take(), process.stdout.take()) else {
            let _ = process.kill();
            let _ = process.wait();
            return Err(EngineError::Protocol(
                "engine process has no stdio pipes".to_string(),
            ));
        };

        if let Some(stderr) = process.stderr.take() {
            let source = program.display().to_string();
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines() {
                    match line {
                        Ok(line) => tracing::info!(engine = %source, "{}", line),
                        Err(_) => break,
                    }
                }
            });
        }

        Ok(Self {
            program,
            process,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            reaped: false,
        })
    }
}

impl Transport for ProcessTransport {
    fn send(&mut self, line: &str) -> Result<(), EngineError> {
        check_line(line)?;
        let stdin = self.stdin.as_mut().ok_or(EngineError::Disconnected)?;
        writeln!(stdin, "{}", line)?;
        stdin.flush()?;
        Ok(())
    }

    fn recv(&mut self) -> Result<String, EngineError> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(EngineError::Disconnected);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        // Closing stdin is EOF for the engine; most engines exit on it even
        // if `quit` was lost.
        self.stdin.take();
        if !self.reaped {
            let status = self.process.wait()?;
            self.reaped = true;
            tracing::debug!(program = %self.program.display(), %status, "engine exited");
        }
        Ok(())
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.process.kill();
            let _ = self.process.wait();
        }
    }
}

/// Starts engines and brings them through the handshake.
pub trait Launcher: Send + Sync {
    /// Launches the engine at `program` and returns a client that has
    /// completed the `uci` handshake.
    fn launch(&self, program: &Path) -> Result<EngineClient, EngineError>;
}

/// Launches real engine subprocesses.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(&self, program: &Path) -> Result<EngineClient, EngineError> {
        let transport = ProcessTransport::spawn(program)?;
        EngineClient::handshake(Box::new(transport))
    }
}
