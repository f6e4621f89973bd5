//! Move validation and game termination for self-play, on top of `shakmaty`.

use std::collections::HashMap;

use shakmaty::uci::UciMove;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Outcome, Position};
use thiserror::Error;

/// A position seen this many times ends the game in a draw.
const FIVEFOLD: u32 = 5;
/// Halfmoves without a capture or pawn move that end the game in a draw.
const SEVENTY_FIVE_MOVES: u32 = 150;

/// An engine answered with a move the game cannot accept.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RuleError {
    #[error("Undecodable move '{mv}': {reason}")]
    Undecodable { mv: String, reason: String },
    #[error("Illegal move '{mv}': {reason}")]
    Illegal { mv: String, reason: String },
}

/// The outcome of a chess game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    WhiteWins,
    BlackWins,
    Draw,
}

/// Tracks one game from the standard starting position.
#[derive(Debug, Clone)]
pub struct Referee {
    position: Chess,
    moves: Vec<String>,
    seen: HashMap<Zobrist64, u32>,
}

impl Default for Referee {
    fn default() -> Self {
        Self::new()
    }
}

impl Referee {
    pub fn new() -> Self {
        Self::from_position(Chess::default())
    }

    /// Starts tracking at an arbitrary position.
    fn from_position(position: Chess) -> Self {
        let mut seen: HashMap<Zobrist64, u32> = HashMap::new();
        seen.insert(position.zobrist_hash::<Zobrist64>(EnPassantMode::Legal), 1);
        Self {
            position,
            moves: Vec::new(),
            seen,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_fen(fen: &str) -> Self {
        let fen: shakmaty::fen::Fen = fen.parse().unwrap();
        Self::from_position(fen.into_position(CastlingMode::Standard).unwrap())
    }

    /// Moves played so far in UCI notation.
    pub fn moves(&self) -> &[String] {
        &self.moves
    }

    pub fn turn(&self) -> Color {
        self.position.turn()
    }

    /// Validates and applies `uci`.
    ///
    /// # Errors
    ///
    /// [`RuleError::Undecodable`] if `uci` is not UCI move notation,
    /// [`RuleError::Illegal`] if the move is not legal here. The game is
    /// unchanged on error.
    pub fn play(&mut self, uci: &str) -> Result<(), RuleError> {
        let parsed: UciMove = uci.parse().map_err(|e| RuleError::Undecodable {
            mv: uci.to_string(),
            reason: format!("{}", e),
        })?;
        let m = parsed
            .to_move(&self.position)
            .map_err(|e| RuleError::Illegal {
                mv: uci.to_string(),
                reason: format!("{}", e),
            })?;

        self.position.play_unchecked(&m);
        // Normalised, so castling is always king-to-destination.
        self.moves.push(m.to_uci(CastlingMode::Standard).to_string());
        *self
            .seen
            .entry(self.position.zobrist_hash::<Zobrist64>(EnPassantMode::Legal))
            .or_insert(0) += 1;
        Ok(())
    }

    /// The result once the game is over, else `None`.
    pub fn outcome(&self) -> Option<MatchResult> {
        if let Some(outcome) = self.position.outcome() {
            return Some(match outcome {
                Outcome::Decisive {
                    winner: Color::White,
                } => MatchResult::WhiteWins,
                Outcome::Decisive {
                    winner: Color::Black,
                } => MatchResult::BlackWins,
                Outcome::Draw => MatchResult::Draw,
            });
        }

        let repeated = self
            .seen
            .get(&self.position.zobrist_hash::<Zobrist64>(EnPassantMode::Legal))
            .is_some_and(|&count| count >= FIVEFOLD);
        if repeated || self.position.halfmoves() >= SEVENTY_FIVE_MOVES {
            return Some(MatchResult::Draw);
        }
        None
    }
}
