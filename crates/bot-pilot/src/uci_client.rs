//! UCI (Universal Chess Interface) client for driving an external engine.
//!
//! [`EngineClient`] is a synchronous request/response wrapper over one
//! [`Transport`]. It knows the protocol and nothing about chess: every
//! operation sends a command and, where the protocol defines an answer,
//! consumes lines until the terminating message arrives.
//!
//! Failures are returned to the caller and never retried here.
//!
//! # Example
//!
//! ```no_run
//! use bot_pilot::transport::ProcessTransport;
//! use bot_pilot::uci_client::{Clock, EngineClient};
//! use uci::PositionBase;
//!
//! let transport = ProcessTransport::spawn("/usr/bin/stockfish")?;
//! let mut client = EngineClient::handshake(Box::new(transport))?;
//! client.new_game()?;
//! client.set_position(&PositionBase::StartPos, &["e2e4".to_string()])?;
//! let best_move = client.search(Clock::new(60_000, 60_000, 0, 0))?;
//! println!("{} plays {}", client.name(), best_move);
//! client.shutdown()?;
//! # Ok::<(), bot_pilot::uci_client::EngineError>(())
//! ```

use thiserror::Error;
use uci::{EngineMessage, GoOptions, GuiCommand, PositionBase};

use crate::transport::Transport;

/// Errors that can occur when communicating with a UCI engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Spawning the engine or reading/writing its pipes failed.
    #[error("Engine transport failed: {0}")]
    Transport(#[from] std::io::Error),
    /// The engine closed its output before answering.
    #[error("Engine closed the connection")]
    Disconnected,
    /// The engine sent something the protocol does not allow here.
    #[error("Protocol violation: {0}")]
    Protocol(String),
}

/// Remaining time and increments, in milliseconds, for both sides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clock {
    pub wtime: u64,
    pub btime: u64,
    pub winc: u64,
    pub binc: u64,
}

impl Clock {
    pub fn new(wtime: u64, btime: u64, winc: u64, binc: u64) -> Self {
        Self {
            wtime,
            btime,
            winc,
            binc,
        }
    }
}

impl From<Clock> for GoOptions {
    fn from(clock: Clock) -> Self {
        GoOptions::clocks(clock.wtime, clock.btime, clock.winc, clock.binc)
    }
}

/// A client for communicating with a UCI-compatible engine.
///
/// # Lifecycle
///
/// 1. Construct with [`EngineClient::handshake`]; a client only exists once
///    the engine has answered `uci` with `uciok`.
/// 2. Set positions and request moves with [`EngineClient::set_position`]
///    and [`EngineClient::search`].
/// 3. Release with [`EngineClient::shutdown`]. A client that is dropped
///    instead drops its transport, which for a real process kills it.
pub struct EngineClient {
    transport: Box<dyn Transport>,
    name: String,
    author: String,
}

impl EngineClient {
    /// Performs the `uci` handshake over `transport`.
    ///
    /// Every line before `uciok` must be `id name`, `id author` or `option`;
    /// anything else fails the handshake.
    ///
    /// # Errors
    ///
    /// Returns the transport or protocol error that ended the handshake. The
    /// transport is closed before returning.
    pub fn handshake(transport: Box<dyn Transport>) -> Result<Self, EngineError> {
        let mut client = Self {
            transport,
            name: String::new(),
            author: String::new(),
        };

        if let Err(e) = client.negotiate() {
            let _ = client.transport.close();
            return Err(e);
        }

        tracing::debug!(name = %client.name, author = %client.author, "engine handshake complete");
        Ok(client)
    }

    fn negotiate(&mut self) -> Result<(), EngineError> {
        self.send(GuiCommand::Uci)?;

        loop {
            let line = self.transport.recv()?;
            match EngineMessage::parse(&line) {
                EngineMessage::Id { name, author } => {
                    if let Some(name) = name {
                        self.name = name;
                    }
                    if let Some(author) = author {
                        self.author = author;
                    }
                }
                EngineMessage::Option(_) => {}
                EngineMessage::UciOk => return Ok(()),
                _ => {
                    return Err(EngineError::Protocol(format!(
                        "unexpected 'uci' response: {}",
                        line
                    )));
                }
            }
        }
    }

    /// The engine's name as reported during the handshake, or empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The engine's author as reported during the handshake, or empty.
    pub fn author(&self) -> &str {
        &self.author
    }

    fn send(&mut self, command: GuiCommand) -> Result<(), EngineError> {
        let line = command.to_uci();
        tracing::trace!(%line, "to engine");
        self.transport.send(&line)
    }

    /// Sends `isready`; the very next line must be `readyok`.
    pub fn is_ready(&mut self) -> Result<(), EngineError> {
        self.send(GuiCommand::IsReady)?;
        let line = self.transport.recv()?;
        if line != "readyok" {
            return Err(EngineError::Protocol(format!(
                "unexpected 'isready' response: {}",
                line
            )));
        }
        Ok(())
    }

    /// Tells the engine the next search belongs to a new game.
    pub fn new_game(&mut self) -> Result<(), EngineError> {
        self.send(GuiCommand::UciNewGame)
    }

    /// Sets the position to `base` followed by `moves`, in UCI notation.
    pub fn set_position(&mut self, base: &PositionBase, moves: &[String]) -> Result<(), EngineError> {
        self.send(GuiCommand::Position {
            base: base.clone(),
            moves: moves.to_vec(),
        })
    }

    /// Starts a search with the given clocks and blocks until `bestmove`.
    ///
    /// Every line before `bestmove` is discarded. There is no timeout: the
    /// call returns when the engine answers or its output closes.
    pub fn search(&mut self, clock: Clock) -> Result<String, EngineError> {
        self.send(GuiCommand::Go(clock.into()))?;

        loop {
            let line = self.transport.recv()?;
            match EngineMessage::parse(&line) {
                EngineMessage::BestMove { mv, .. } => return Ok(mv),
                EngineMessage::Info(info) => {
                    tracing::trace!(depth = ?info.depth, score = ?info.score, "engine info");
                }
                _ => {}
            }
        }
    }

    /// Sends `stop`, ending any search in progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine can no longer be written to.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        self.send(GuiCommand::Stop)
    }

    /// Sends `quit`. The engine should exit shortly after.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine can no longer be written to.
    pub fn quit(&mut self) -> Result<(), EngineError> {
        self.send(GuiCommand::Quit)
    }

    /// Releases the transport, blocking until the engine is gone.
    pub fn close(&mut self) -> Result<(), EngineError> {
        self.transport.close()
    }

    /// Runs the full release sequence: `stop`, `quit`, then close.
    ///
    /// Each step runs even if an earlier one failed; the first failure is
    /// returned.
    pub fn shutdown(mut self) -> Result<(), EngineError> {
        let stopped = self.stop();
        let quit = self.quit();
        let closed = self.close();
        stopped.and(quit).and(closed)
    }
}
