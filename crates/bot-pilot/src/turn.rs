//! Whose turn is it?
//!
//! The game stream tells the bot about every ply, its own included, but never
//! says whose move it is. [`TurnTracker`] works that out from the order of
//! events alone, so events must be fed in the order the stream delivers them.

use crate::remote::{GameEvent, GameState};

/// Where a game stands from the bot's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Nothing received yet; the first event must be the full snapshot.
    AwaitingFullState,
    /// The next update is the opponent's move.
    WaitingForOpponent,
    /// It is our move and the engine is (about to be) searching.
    ComputingMove,
    /// Our move was sent; the next update is its echo.
    AwaitingOwnMoveEcho,
    /// The game is over.
    Terminal,
}

/// What the session should do with an event.
#[derive(Debug, PartialEq)]
pub enum Decision<'a> {
    /// Search this state and send the result.
    Play(&'a GameState),
    /// Nothing to do for this event.
    Skip,
    /// The game has ended.
    Finish,
}

/// Per-game turn state machine.
///
/// Starts in [`TurnState::AwaitingFullState`]. The snapshot fixes our colour
/// by comparing player ids with `our_id`, case-insensitively. After that,
/// every move update flips between waiting for the opponent and playing,
/// except the update echoing our own move, which is skipped.
#[derive(Debug)]
pub struct TurnTracker {
    our_id: String,
    state: TurnState,
}

impl TurnTracker {
    /// Creates a tracker for the account with user id `our_id`.
    pub fn new(our_id: impl Into<String>) -> Self {
        Self {
            our_id: our_id.into(),
            state: TurnState::AwaitingFullState,
        }
    }

    /// The current state.
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Whether the bot is the side to move.
    pub fn is_our_turn(&self) -> bool {
        self.state == TurnState::ComputingMove
    }

    /// Advances on `event` and says whether a move is due.
    pub fn observe<'a>(&mut self, event: &'a GameEvent) -> Decision<'a> {
        if self.state == TurnState::Terminal {
            return Decision::Skip;
        }

        match event {
            GameEvent::GameFull(full) => {
                if full.state.is_finished() {
                    return self.finish();
                }
                let mut ours = full.is_white(&self.our_id);
                tracing::info!(game = %full.id, white = ours, "determined our side");

                // A fast opponent can move before the snapshot is built, in
                // which case the history is already non-empty.
                if !full.state.moves.trim().is_empty() {
                    tracing::info!(game = %full.id, "snapshot already carries moves, flipping turn");
                    ours = !ours;
                }

                if ours {
                    self.state = TurnState::ComputingMove;
                    Decision::Play(&full.state)
                } else {
                    tracing::info!(game = %full.id, "not our turn, waiting for opponent");
                    self.state = TurnState::WaitingForOpponent;
                    Decision::Skip
                }
            }
            GameEvent::GameState(state) => {
                if state.is_finished() {
                    return self.finish();
                }
                match self.state {
                    TurnState::AwaitingFullState => {
                        tracing::warn!("state update before snapshot, ignoring");
                        Decision::Skip
                    }
                    TurnState::AwaitingOwnMoveEcho => {
                        tracing::debug!("skipping echo of our own move");
                        self.state = TurnState::WaitingForOpponent;
                        Decision::Skip
                    }
                    TurnState::WaitingForOpponent | TurnState::ComputingMove => {
                        self.state = TurnState::ComputingMove;
                        Decision::Play(state)
                    }
                    TurnState::Terminal => Decision::Skip,
                }
            }
            GameEvent::ChatLine(_) | GameEvent::Other => Decision::Skip,
        }
    }

    /// Records that the move decided by the last [`Decision::Play`] was sent.
    pub fn move_sent(&mut self) {
        if self.state == TurnState::ComputingMove {
            self.state = TurnState::AwaitingOwnMoveEcho;
        }
    }

    /// Marks the game over; later events are ignored.
    pub fn finish<'a>(&mut self) -> Decision<'a> {
        self.state = TurnState::Terminal;
        Decision::Finish
    }
}
