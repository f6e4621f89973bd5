//! UCI (Universal Chess Interface) protocol vocabulary.
//!
//! This crate provides the message types for both ends of a UCI pipe: the
//! controlling side renders [`GuiCommand`]s and classifies engine output with
//! [`EngineMessage::parse`], while an engine reads commands with
//! [`UciEngine`] and answers with [`EngineMessage`]s.
//!
//! # Commands
//!
//! - `uci` / `id name` / `id author` / `option` / `uciok` - Handshake
//! - `isready` / `readyok` - Synchronization
//! - `ucinewgame` - Next search belongs to a new game
//! - `position startpos|fen <fen> [moves <move>...]` - Set position
//! - `go [wtime <ms> winc <ms> btime <ms> binc <ms>] ...` - Start search
//! - `bestmove <move> [ponder <move>]` - Search result
//! - `stop` / `quit` - Shutdown

mod command;
mod info;

pub use command::{GoOptions, GuiCommand, PositionBase};
pub use info::{EngineInfo, Score};

use std::io::{BufRead, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UciError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Input closed")]
    Eof,
}

/// Messages sent from engine to GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Engine identification.
    Id {
        name: Option<String>,
        author: Option<String>,
    },
    /// An option the engine supports; the declaration is kept verbatim.
    Option(String),
    /// UCI initialization complete.
    UciOk,
    /// Engine is ready.
    ReadyOk,
    /// Search information.
    Info(EngineInfo),
    /// Best move found.
    BestMove { mv: String, ponder: Option<String> },
    /// Anything else the engine printed.
    Unknown(String),
}

impl EngineMessage {
    /// Classify one line of engine output by its prefix.
    ///
    /// Trailing line terminators are ignored. Lines that match no known
    /// message become [`EngineMessage::Unknown`]; deciding whether that is
    /// acceptable is left to the caller.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(name) = line.strip_prefix("id name ") {
            return EngineMessage::Id {
                name: Some(name.to_string()),
                author: None,
            };
        }
        if let Some(author) = line.strip_prefix("id author ") {
            return EngineMessage::Id {
                name: None,
                author: Some(author.to_string()),
            };
        }
        if let Some(decl) = line.strip_prefix("option ") {
            return EngineMessage::Option(decl.to_string());
        }
        if let Some(rest) = line.strip_prefix("bestmove ") {
            let mut parts = rest.split_whitespace();
            if let Some(mv) = parts.next() {
                let ponder = match (parts.next(), parts.next()) {
                    (Some("ponder"), Some(p)) => Some(p.to_string()),
                    _ => None,
                };
                return EngineMessage::BestMove {
                    mv: mv.to_string(),
                    ponder,
                };
            }
        }

        match line.trim() {
            "uciok" => EngineMessage::UciOk,
            "readyok" => EngineMessage::ReadyOk,
            _ => match EngineInfo::parse(line) {
                Some(info) => EngineMessage::Info(info),
                None => EngineMessage::Unknown(line.to_string()),
            },
        }
    }

    /// Format message for output.
    pub fn to_uci(&self) -> String {
        match self {
            EngineMessage::Id { name, author } => {
                let mut parts = Vec::new();
                if let Some(n) = name {
                    parts.push(format!("id name {}", n));
                }
                if let Some(a) = author {
                    parts.push(format!("id author {}", a));
                }
                parts.join("\n")
            }
            EngineMessage::Option(decl) => format!("option {}", decl),
            EngineMessage::UciOk => "uciok".to_string(),
            EngineMessage::ReadyOk => "readyok".to_string(),
            EngineMessage::Info(info) => info.to_uci(),
            EngineMessage::BestMove { mv, ponder } => match ponder {
                Some(p) => format!("bestmove {} ponder {}", mv, p),
                None => format!("bestmove {}", mv),
            },
            EngineMessage::Unknown(raw) => raw.clone(),
        }
    }
}

/// Simple UCI engine wrapper for writing bots.
pub struct UciEngine<R: BufRead, W: Write> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> UciEngine<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Read and parse the next command from GUI.
    ///
    /// Returns [`UciError::Eof`] once the GUI closes its end of the pipe.
    pub fn read_command(&mut self) -> Result<GuiCommand, UciError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(UciError::Eof);
        }
        GuiCommand::parse(&line)
    }

    /// Send a message to the GUI.
    pub fn send(&mut self, msg: &EngineMessage) -> Result<(), UciError> {
        writeln!(self.writer, "{}", msg.to_uci())?;
        self.writer.flush()?;
        Ok(())
    }

    /// Send engine identification.
    pub fn send_id(&mut self, name: &str, author: &str) -> Result<(), UciError> {
        self.send(&EngineMessage::Id {
            name: Some(name.to_string()),
            author: Some(author.to_string()),
        })
    }

    /// Send uciok.
    pub fn send_uciok(&mut self) -> Result<(), UciError> {
        self.send(&EngineMessage::UciOk)
    }

    /// Send readyok.
    pub fn send_readyok(&mut self) -> Result<(), UciError> {
        self.send(&EngineMessage::ReadyOk)
    }

    /// Send best move.
    pub fn send_bestmove(&mut self, mv: &str) -> Result<(), UciError> {
        self.send(&EngineMessage::BestMove {
            mv: mv.to_string(),
            ponder: None,
        })
    }

    /// Send search info.
    pub fn send_info(&mut self, info: EngineInfo) -> Result<(), UciError> {
        self.send(&EngineMessage::Info(info))
    }
}

/// Create a UCI engine using stdin/stdout.
pub fn stdio_engine() -> UciEngine<std::io::StdinLock<'static>, std::io::Stdout> {
    UciEngine::new(std::io::stdin().lock(), std::io::stdout())
}
