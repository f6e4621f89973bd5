//! Scripted engines and a fake matchmaking service for unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::remote::{
    Challenge, Challenger, ChatRoom, EventStream, GameEvent, GameFull, GamePlayer, GameState,
    IncomingEvent, Profile, RemoteError, RemoteService, TimeControl, Variant,
};
use crate::transport::{Launcher, Transport};
use crate::uci_client::{EngineClient, EngineError};

/// Reply to `uci` of a well-behaved engine.
pub const HANDSHAKE: &[&str] = &[
    "id name apollo 0.3.0",
    "id author Jane Doe <jane@example.com>",
    "uciok",
];

/// White mates on the seventh ply.
pub const SCHOLARS_MATE: &[&str] = &[
    "e2e4", "e7e5", "f1c4", "b8c6", "d1h5", "g8f6", "h5f7",
];

#[derive(Debug, Default)]
struct LogInner {
    sent: Vec<String>,
    closed: bool,
}

/// Shared view of what a [`ScriptedEngine`] was sent.
#[derive(Debug, Clone, Default)]
pub struct EngineLog(Arc<Mutex<LogInner>>);

impl EngineLog {
    pub fn sent(&self) -> Vec<String> {
        self.0.lock().unwrap().sent.clone()
    }

    pub fn closed(&self) -> bool {
        self.0.lock().unwrap().closed
    }
}

/// An in-memory engine.
///
/// Commands registered with [`ScriptedEngine::on`] queue their canned
/// replies. With a game script, every `go` is answered with the script move
/// at the ply of the last `position`; past the end of the script the engine
/// goes silent.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    replies: HashMap<String, Vec<String>>,
    script: Vec<String>,
    ply: usize,
    pending: VecDeque<String>,
    sends_left: Option<usize>,
    log: EngineLog,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, command: &str, replies: &[&str]) -> Self {
        self.replies.insert(
            command.to_string(),
            replies.iter().map(|r| r.to_string()).collect(),
        );
        self
    }

    pub fn playing(mut self, script: &[String]) -> Self {
        self.script = script.to_vec();
        self
    }

    /// Lets `n` sends through, then fails every later one.
    pub fn fail_sends_after(mut self, n: usize) -> Self {
        self.sends_left = Some(n);
        self
    }

    pub fn log(&self) -> EngineLog {
        self.log.clone()
    }
}

impl Transport for ScriptedEngine {
    fn send(&mut self, line: &str) -> Result<(), EngineError> {
        if let Some(left) = self.sends_left.as_mut() {
            if *left == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "scripted").into());
            }
            *left -= 1;
        }
        self.log.0.lock().unwrap().sent.push(line.to_string());

        if let Some(replies) = self.replies.get(line) {
            self.pending.extend(replies.iter().cloned());
        } else if line.starts_with("position") {
            self.ply = line
                .split_once(" moves ")
                .map_or(0, |(_, moves)| moves.split_whitespace().count());
        } else if line.starts_with("go") {
            if let Some(mv) = self.script.get(self.ply) {
                self.pending.push_back("info depth 1".to_string());
                self.pending.push_back(format!("bestmove {}", mv));
            }
        }
        Ok(())
    }

    fn recv(&mut self) -> Result<String, EngineError> {
        self.pending.pop_front().ok_or(EngineError::Disconnected)
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.log.0.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Launches [`ScriptedEngine`]s, one game script per program path.
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    default_script: Vec<String>,
    scripts: HashMap<PathBuf, Vec<String>>,
    broken: bool,
    launched: Mutex<Vec<(PathBuf, EngineLog)>>,
}

fn owned(moves: &[&str]) -> Vec<String> {
    moves.iter().map(|m| m.to_string()).collect()
}

impl ScriptedLauncher {
    /// Every launched engine follows `script`.
    pub fn playing(script: &[&str]) -> Self {
        Self {
            default_script: owned(script),
            ..Self::default()
        }
    }

    /// Engines complete the handshake but never answer `go`.
    pub fn silent() -> Self {
        Self::default()
    }

    /// Every launch fails.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    /// Engines launched from `program` follow `script` instead.
    pub fn with_program(mut self, program: &str, script: &[&str]) -> Self {
        self.scripts.insert(PathBuf::from(program), owned(script));
        self
    }

    pub fn launches(&self) -> usize {
        self.launched.lock().unwrap().len()
    }

    /// Logs of every engine launched from `program`, in launch order.
    pub fn logs_for(&self, program: &str) -> Vec<EngineLog> {
        self.launched
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path == Path::new(program))
            .map(|(_, log)| log.clone())
            .collect()
    }

    /// The log of the single engine launched so far.
    pub fn only_log(&self) -> EngineLog {
        let launched = self.launched.lock().unwrap();
        assert_eq!(launched.len(), 1, "expected exactly one launch");
        launched[0].1.clone()
    }
}

impl Launcher for ScriptedLauncher {
    fn launch(&self, program: &Path) -> Result<EngineClient, EngineError> {
        if self.broken {
            return Err(EngineError::Disconnected);
        }
        let script = self.scripts.get(program).unwrap_or(&self.default_script);
        let engine = ScriptedEngine::new().on("uci", HANDSHAKE).playing(script);
        self.launched
            .lock()
            .unwrap()
            .push((program.to_path_buf(), engine.log()));
        EngineClient::handshake(Box::new(engine))
    }
}

/// A call made on [`FakeRemote`], recorded whether or not it failed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Action {
    Accept(String),
    Decline(String),
    Move(String, String),
    Chat(String, String),
    Abort(String),
    Resign(String),
}

#[derive(Debug, Default)]
struct RemoteInner {
    actions: Vec<Action>,
    events: Vec<IncomingEvent>,
    games: HashMap<String, Vec<GameEvent>>,
}

/// An in-memory matchmaking service.
///
/// Event and game streams replay the registered events and then close.
#[derive(Debug)]
pub struct FakeRemote {
    profile: Profile,
    fail_challenges: bool,
    fail_moves: bool,
    fail_chat: bool,
    fail_abort: bool,
    fail_resign: bool,
    inner: Mutex<RemoteInner>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            profile: Profile {
                id: "pilot".to_string(),
                username: "Pilot".to_string(),
                title: Some("BOT".to_string()),
            },
            fail_challenges: false,
            fail_moves: false,
            fail_chat: false,
            fail_abort: false,
            fail_resign: false,
            inner: Mutex::new(RemoteInner::default()),
        }
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_events(self, events: Vec<IncomingEvent>) -> Self {
        self.inner.lock().unwrap().events = events;
        self
    }

    pub fn with_game(self, game_id: &str, events: Vec<GameEvent>) -> Self {
        self.inner
            .lock()
            .unwrap()
            .games
            .insert(game_id.to_string(), events);
        self
    }

    pub fn failing_challenges(mut self) -> Self {
        self.fail_challenges = true;
        self
    }

    pub fn failing_moves(mut self) -> Self {
        self.fail_moves = true;
        self
    }

    pub fn failing_chat(mut self) -> Self {
        self.fail_chat = true;
        self
    }

    pub fn failing_abort(mut self) -> Self {
        self.fail_abort = true;
        self
    }

    pub fn failing_resign(mut self) -> Self {
        self.fail_resign = true;
        self
    }

    pub fn actions(&self) -> Vec<Action> {
        self.inner.lock().unwrap().actions.clone()
    }

    fn record(&self, action: Action, fail: bool) -> Result<(), RemoteError> {
        self.inner.lock().unwrap().actions.push(action);
        if fail {
            return Err(RemoteError::Status {
                code: 400,
                message: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

fn replay<T: Send + 'static>(events: Vec<T>) -> EventStream<T> {
    let (tx, rx) = mpsc::channel(events.len().max(1));
    for event in events {
        let _ = tx.try_send(event);
    }
    rx
}

#[async_trait]
impl RemoteService for FakeRemote {
    async fn profile(&self) -> Result<Profile, RemoteError> {
        Ok(self.profile.clone())
    }

    async fn stream_events(&self) -> Result<EventStream<IncomingEvent>, RemoteError> {
        let events = std::mem::take(&mut self.inner.lock().unwrap().events);
        Ok(replay(events))
    }

    async fn stream_game(&self, game_id: &str) -> Result<EventStream<GameEvent>, RemoteError> {
        let events = self.inner.lock().unwrap().games.remove(game_id);
        match events {
            Some(events) => Ok(replay(events)),
            None => Err(RemoteError::Status {
                code: 404,
                message: format!("no such game: {}", game_id),
            }),
        }
    }

    async fn accept_challenge(&self, challenge_id: &str) -> Result<(), RemoteError> {
        self.record(Action::Accept(challenge_id.to_string()), self.fail_challenges)
    }

    async fn decline_challenge(&self, challenge_id: &str) -> Result<(), RemoteError> {
        self.record(Action::Decline(challenge_id.to_string()), self.fail_challenges)
    }

    async fn make_move(&self, game_id: &str, mv: &str, _offer_draw: bool) -> Result<(), RemoteError> {
        self.record(
            Action::Move(game_id.to_string(), mv.to_string()),
            self.fail_moves,
        )
    }

    async fn write_chat(&self, game_id: &str, _room: ChatRoom, text: &str) -> Result<(), RemoteError> {
        self.record(
            Action::Chat(game_id.to_string(), text.to_string()),
            self.fail_chat,
        )
    }

    async fn abort_game(&self, game_id: &str) -> Result<(), RemoteError> {
        self.record(Action::Abort(game_id.to_string()), self.fail_abort)
    }

    async fn resign_game(&self, game_id: &str) -> Result<(), RemoteError> {
        self.record(Action::Resign(game_id.to_string()), self.fail_resign)
    }
}

pub fn challenge(id: &str, variant: &str) -> Challenge {
    Challenge {
        id: id.to_string(),
        challenger: Challenger {
            id: "rival".to_string(),
            name: "Rival".to_string(),
            rating: Some(1500),
            title: None,
        },
        variant: Variant {
            key: variant.to_string(),
            name: variant.to_string(),
        },
        time_control: TimeControl::Clock {
            limit: 300,
            increment: 5,
        },
        rated: false,
        color: None,
    }
}

fn state(moves: &str) -> GameState {
    GameState {
        moves: moves.to_string(),
        wtime: 60_000,
        btime: 60_000,
        winc: 0,
        binc: 0,
        status: "started".to_string(),
    }
}

fn player(id: &str) -> GamePlayer {
    GamePlayer {
        id: Some(id.to_string()),
        name: Some(id.to_string()),
        ..GamePlayer::default()
    }
}

pub fn game_full(white: &str, black: &str, moves: &str) -> GameEvent {
    GameEvent::GameFull(GameFull {
        id: "g1".to_string(),
        white: player(white),
        black: player(black),
        initial_fen: Some("startpos".to_string()),
        state: state(moves),
    })
}

pub fn game_state(moves: &str) -> GameEvent {
    GameEvent::GameState(state(moves))
}

pub fn game_start(id: &str) -> IncomingEvent {
    IncomingEvent::GameStart {
        game: crate::remote::GameStart { id: id.to_string() },
    }
}
