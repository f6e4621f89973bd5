//! The matchmaking service as seen by the bot.
//!
//! [`RemoteService`] is the seam between the bot and whatever speaks HTTP to
//! the service. Events arrive as closed enums ([`IncomingEvent`],
//! [`GameEvent`]) decoded from the service's newline-delimited JSON, so every
//! consumer matches them exhaustively.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use uci::PositionBase;

use crate::uci_client::Clock;

/// Errors reported by the matchmaking service or the connection to it.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The service answered with a failure status.
    #[error("Service returned status {code}: {message}")]
    Status { code: u16, message: String },
    /// The service answered without acknowledging the action.
    #[error("Service did not acknowledge the request")]
    NotOk,
    /// The request never got an answer.
    #[error("Service unreachable: {0}")]
    Transport(String),
    /// A stream the bot depends on went away.
    #[error("Event stream closed")]
    StreamClosed,
}

/// A stream of decoded events; it ends when the sender is dropped.
pub type EventStream<T> = mpsc::Receiver<T>;

/// The account the bot plays as.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl Profile {
    /// Only accounts titled `BOT` may use the bot endpoints.
    pub fn is_bot(&self) -> bool {
        self.title.as_deref() == Some("BOT")
    }
}

/// Account-level events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IncomingEvent {
    Challenge { challenge: Challenge },
    GameStart { game: GameStart },
    /// Event kinds the bot does not act on (finished games, cancelled
    /// challenges, ...).
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: String,
    #[serde(default)]
    pub challenger: Challenger,
    pub variant: Variant,
    pub time_control: TimeControl,
    #[serde(default)]
    pub rated: bool,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Challenger {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub rating: Option<u32>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Variant {
    pub key: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimeControl {
    /// Seconds on the clock and seconds added per move.
    Clock { limit: u32, increment: u32 },
    #[serde(rename_all = "camelCase")]
    Correspondence { days_per_turn: u32 },
    Unlimited,
}

impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeControl::Clock { limit, increment } => {
                write!(f, "{}+{}", f64::from(*limit) / 60.0, increment)
            }
            TimeControl::Correspondence { days_per_turn } => {
                write!(f, "{} days/turn", days_per_turn)
            }
            TimeControl::Unlimited => f.write_str("unlimited"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameStart {
    pub id: String,
}

/// Events on the stream of one game.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameEvent {
    /// Full snapshot; always the first event of a game stream.
    GameFull(GameFull),
    /// Sent after every ply.
    GameState(GameState),
    ChatLine(ChatLine),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameFull {
    pub id: String,
    pub white: GamePlayer,
    pub black: GamePlayer,
    #[serde(default)]
    pub initial_fen: Option<String>,
    pub state: GameState,
}

impl GameFull {
    /// Whether the account `id` holds the white pieces.
    pub fn is_white(&self, id: &str) -> bool {
        self.white
            .id
            .as_deref()
            .is_some_and(|white| white.eq_ignore_ascii_case(id))
    }

    /// The position the move history is played from.
    pub fn position_base(&self) -> PositionBase {
        match self.initial_fen.as_deref() {
            None | Some("") | Some("startpos") => PositionBase::StartPos,
            Some(fen) => PositionBase::Fen(fen.to_string()),
        }
    }
}

/// A seat at the board; computer opponents carry only an AI level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamePlayer {
    pub id: Option<String>,
    pub name: Option<String>,
    pub rating: Option<u32>,
    pub title: Option<String>,
    pub ai_level: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameState {
    /// Every move so far in UCI notation, space separated.
    #[serde(default)]
    pub moves: String,
    #[serde(default)]
    pub wtime: u64,
    #[serde(default)]
    pub btime: u64,
    #[serde(default)]
    pub winc: u64,
    #[serde(default)]
    pub binc: u64,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    "started".to_string()
}

impl GameState {
    /// The move history as a list; empty history gives an empty list.
    pub fn move_list(&self) -> Vec<String> {
        self.moves.split_whitespace().map(str::to_string).collect()
    }

    pub fn clock(&self) -> Clock {
        Clock::new(self.wtime, self.btime, self.winc, self.binc)
    }

    /// True once the service reports a result (mate, resign, timeout, ...).
    pub fn is_finished(&self) -> bool {
        !matches!(self.status.as_str(), "created" | "started")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatLine {
    pub username: String,
    pub text: String,
    pub room: String,
}

/// Chat rooms of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRoom {
    Player,
    Spectator,
}

impl fmt::Display for ChatRoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRoom::Player => f.write_str("player"),
            ChatRoom::Spectator => f.write_str("spectator"),
        }
    }
}

/// Everything the bot needs from the matchmaking service.
///
/// All actions are request/response and may fail; none of them is retried by
/// the callers in this crate.
#[async_trait]
pub trait RemoteService: Send + Sync + 'static {
    /// The authenticated account.
    async fn profile(&self) -> Result<Profile, RemoteError>;

    /// Account-level events: incoming challenges and game starts.
    async fn stream_events(&self) -> Result<EventStream<IncomingEvent>, RemoteError>;

    /// Events of one game, starting with its [`GameFull`] snapshot.
    async fn stream_game(&self, game_id: &str) -> Result<EventStream<GameEvent>, RemoteError>;

    async fn accept_challenge(&self, challenge_id: &str) -> Result<(), RemoteError>;

    async fn decline_challenge(&self, challenge_id: &str) -> Result<(), RemoteError>;

    async fn make_move(&self, game_id: &str, mv: &str, offer_draw: bool)
        -> Result<(), RemoteError>;

    async fn write_chat(&self, game_id: &str, room: ChatRoom, text: &str)
        -> Result<(), RemoteError>;

    async fn abort_game(&self, game_id: &str) -> Result<(), RemoteError>;

    async fn resign_game(&self, game_id: &str) -> Result<(), RemoteError>;
}
