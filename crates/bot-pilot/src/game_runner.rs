//! Plays one game between two engines.
//!
//! [`GameRunner`] owns the two [`EngineClient`]s for the length of one game
//! and shuts both down when it finishes, whatever the result.

use shakmaty::Color;
use thiserror::Error;
use uci::PositionBase;

use crate::rules::{MatchResult, Referee, RuleError};
use crate::uci_client::{Clock, EngineClient, EngineError};

/// Errors that end a self-play game.
#[derive(Error, Debug)]
pub enum GameError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    /// An engine played a move the game cannot accept.
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),
}

/// The record of a completed game.
#[derive(Debug, Clone)]
pub struct GameRecord {
    /// Moves in UCI notation, white first.
    pub moves: Vec<String>,
    pub result: MatchResult,
    /// Name the white engine reported during the handshake.
    pub white_name: String,
    /// Name the black engine reported during the handshake.
    pub black_name: String,
}

/// Runs a single game between two UCI engines.
///
/// Engines alternate moves until the position is decided. Each engine is
/// sent the full move list from the start position before every search, and
/// its answer is checked for legality before it is played.
///
/// # Example
///
/// ```ignore
/// let runner = GameRunner::new(white, black, Clock::default());
/// let record = runner.play_game()?;
/// println!("{:?} after {} plies", record.result, record.moves.len());
/// ```
pub struct GameRunner {
    white: EngineClient,
    black: EngineClient,
    clock: Clock,
}

impl GameRunner {
    /// Takes ownership of both engines; they are released by
    /// [`GameRunner::play_game`] or on drop.
    pub fn new(white: EngineClient, black: EngineClient, clock: Clock) -> Self {
        Self {
            white,
            black,
            clock,
        }
    }

    /// Plays until the game is decided, then shuts down both engines.
    ///
    /// # Errors
    ///
    /// Any engine or rule error ends the game. A failed shutdown is reported
    /// only if the game itself completed.
    pub fn play_game(mut self) -> Result<GameRecord, GameError> {
        let played = self.play_moves();
        let white_name = self.white.name().to_string();
        let black_name = self.black.name().to_string();

        let white = self.white.shutdown();
        let black = self.black.shutdown();
        let (moves, result) = played?;
        white?;
        black?;

        Ok(GameRecord {
            moves,
            result,
            white_name,
            black_name,
        })
    }

    fn play_moves(&mut self) -> Result<(Vec<String>, MatchResult), GameError> {
        self.white.new_game()?;
        self.black.new_game()?;

        let mut referee = Referee::new();
        loop {
            if let Some(result) = referee.outcome() {
                return Ok((referee.moves().to_vec(), result));
            }

            let current = match referee.turn() {
                Color::White => &mut self.white,
                Color::Black => &mut self.black,
            };
            current.set_position(&PositionBase::StartPos, referee.moves())?;
            let bestmove = current.search(self.clock)?;
            tracing::trace!(ply = referee.moves().len(), r#move = %bestmove, "engine moved");

            referee.play(&bestmove)?;
        }
    }
}
