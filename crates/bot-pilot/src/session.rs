//! Drives one game on the matchmaking service with one engine.
//!
//! A [`GameSession`] owns a freshly launched engine and the game's event
//! stream. The [`TurnTracker`] decides when a move is due; the engine is
//! asked for it and the answer is forwarded to the service. Any failure ends
//! the session, after which [`recover`] tries to abort and then to resign
//! the game.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinError;
use uci::PositionBase;

use crate::remote::{ChatRoom, GameEvent, RemoteError, RemoteService};
use crate::transport::Launcher;
use crate::turn::{Decision, TurnTracker};
use crate::uci_client::{Clock, EngineClient, EngineError};

/// Errors that end a game session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Service error: {0}")]
    Remote(#[from] RemoteError),
    /// An engine call panicked on the blocking pool.
    #[error("Engine task failed: {0}")]
    Task(#[from] JoinError),
}

/// Settings shared by every session of a server.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Engine executable launched for each game.
    pub engine: PathBuf,
    /// Posted to the player chat when a game starts.
    pub greeting: Option<String>,
}

/// One game on the matchmaking service, played by one engine process.
///
/// The session is consumed by [`GameSession::run`]; the engine lives exactly
/// as long as the game's event stream.
pub struct GameSession<R, L> {
    remote: Arc<R>,
    launcher: Arc<L>,
    settings: Arc<SessionSettings>,
    game_id: String,
    /// Whose turn it is and whether the next update is our own echo.
    tracker: TurnTracker,
}

impl<R: RemoteService, L: Launcher + 'static> GameSession<R, L> {
    /// Prepares a session for `game_id`. Nothing is launched until
    /// [`GameSession::run`].
    ///
    /// # Arguments
    ///
    /// * `remote` - The matchmaking service
    /// * `launcher` - Starts the engine process
    /// * `settings` - Engine path and greeting
    /// * `game_id` - The game to play
    /// * `our_id` - The bot account's user id, used to find our colour
    pub fn new(
        remote: Arc<R>,
        launcher: Arc<L>,
        settings: Arc<SessionSettings>,
        game_id: impl Into<String>,
        our_id: impl Into<String>,
    ) -> Self {
        Self {
            remote,
            launcher,
            settings,
            game_id: game_id.into(),
            tracker: TurnTracker::new(our_id),
        }
    }

    /// Plays the game to the end of its stream, then recovers from any
    /// failure. Never panics on service or engine errors.
    pub async fn run(self) {
        let remote = Arc::clone(&self.remote);
        let game_id = self.game_id.clone();
        tracing::info!(game = %game_id, "beginning game");

        if let Err(e) = self.play().await {
            tracing::error!(game = %game_id, error = %e, "fatal error while playing game");
            recover(remote.as_ref(), &game_id).await;
        }
    }

    async fn play(mut self) -> Result<(), SessionError> {
        let launcher = Arc::clone(&self.launcher);
        let program = self.settings.engine.clone();
        let engine = tokio::task::spawn_blocking(move || {
            let mut engine = launcher.launch(&program)?;
            engine.new_game()?;
            Ok::<_, EngineError>(engine)
        })
        .await??;

        let mut engine = Some(engine);
        let result = self.drive(&mut engine).await;

        if let Some(engine) = engine {
            let game_id = self.game_id.clone();
            let shutdown = tokio::task::spawn_blocking(move || engine.shutdown()).await;
            match shutdown {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(game = %game_id, error = %e, "engine shutdown failed"),
                Err(e) => tracing::warn!(game = %game_id, error = %e, "engine shutdown panicked"),
            }
        }
        result
    }

    async fn drive(&mut self, engine: &mut Option<EngineClient>) -> Result<(), SessionError> {
        if let Some(greeting) = &self.settings.greeting {
            if let Err(e) = self
                .remote
                .write_chat(&self.game_id, ChatRoom::Player, greeting)
                .await
            {
                tracing::warn!(game = %self.game_id, error = %e, "failed to send greeting");
            }
        }

        let mut stream = self.remote.stream_game(&self.game_id).await?;
        let mut base = PositionBase::StartPos;

        while let Some(event) = stream.recv().await {
            if let GameEvent::GameFull(full) = &event {
                base = full.position_base();
            }

            let (moves, clock) = match self.tracker.observe(&event) {
                Decision::Play(state) => (state.move_list(), state.clock()),
                Decision::Skip => continue,
                Decision::Finish => {
                    tracing::info!(game = %self.game_id, "game over");
                    break;
                }
            };

            let bestmove = think(engine, base.clone(), moves, clock).await?;
            tracing::info!(game = %self.game_id, r#move = %bestmove, "sending move");
            self.remote
                .make_move(&self.game_id, &bestmove, false)
                .await?;
            self.tracker.move_sent();
        }

        self.tracker.finish();
        tracing::info!(game = %self.game_id, "stream has ended, completing game");
        Ok(())
    }
}

/// Runs one position/search round trip on the blocking pool.
///
/// The engine is moved into the blocking task and handed back; if the task
/// panics the engine is lost and `engine` stays empty.
async fn think(
    engine: &mut Option<EngineClient>,
    base: PositionBase,
    moves: Vec<String>,
    clock: Clock,
) -> Result<String, SessionError> {
    let Some(mut client) = engine.take() else {
        return Err(EngineError::Disconnected.into());
    };
    let (client, result) = tokio::task::spawn_blocking(move || {
        let result = client
            .set_position(&base, &moves)
            .and_then(|()| client.search(clock));
        (client, result)
    })
    .await?;
    *engine = Some(client);
    Ok(result?)
}

/// Best-effort cleanup after a failed game: abort, else resign, else log.
pub async fn recover<R: RemoteService + ?Sized>(remote: &R, game_id: &str) {
    let Err(e) = remote.abort_game(game_id).await else {
        tracing::info!(game = %game_id, "aborted game");
        return;
    };
    tracing::info!(game = %game_id, error = %e, "failed to abort game, resigning");

    match remote.resign_game(game_id).await {
        Ok(()) => tracing::info!(game = %game_id, "resigned game"),
        Err(e) => tracing::error!(game = %game_id, error = %e, "failed to resign game"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{game_full, game_state, Action, FakeRemote, ScriptedLauncher};

    fn settings(greeting: Option<&str>) -> Arc<SessionSettings> {
        Arc::new(SessionSettings {
            engine: PathBuf::from("engine"),
            greeting: greeting.map(str::to_string),
        })
    }

    fn session(
        remote: &Arc<FakeRemote>,
        launcher: &Arc<ScriptedLauncher>,
        greeting: Option<&str>,
    ) -> GameSession<FakeRemote, ScriptedLauncher> {
        GameSession::new(
            Arc::clone(remote),
            Arc::clone(launcher),
            settings(greeting),
            "g1",
            "pilot",
        )
    }

    #[tokio::test]
    async fn plays_as_white_and_skips_own_echo() {
        let remote = Arc::new(FakeRemote::new().with_game(
            "g1",
            vec![
                game_full("pilot", "rival", ""),
                game_state("e2e4"),
                game_state("e2e4 e7e5"),
                game_state("e2e4 e7e5 g1f3"),
            ],
        ));
        let launcher = Arc::new(ScriptedLauncher::playing(&["e2e4", "e7e5", "g1f3"]));

        session(&remote, &launcher, Some("Good luck, have fun!"))
            .run()
            .await;

        assert_eq!(
            remote.actions(),
            vec![
                Action::Chat("g1".to_string(), "Good luck, have fun!".to_string()),
                Action::Move("g1".to_string(), "e2e4".to_string()),
                Action::Move("g1".to_string(), "g1f3".to_string()),
            ]
        );
        let sent = launcher.only_log().sent();
        assert_eq!(
            sent,
            vec![
                "uci",
                "ucinewgame",
                "position startpos",
                "go wtime 60000 winc 0 btime 60000 binc 0",
                "position startpos moves e2e4 e7e5",
                "go wtime 60000 winc 0 btime 60000 binc 0",
                "stop",
                "quit",
            ]
        );
        assert!(launcher.only_log().closed());
    }

    #[tokio::test]
    async fn opponent_moved_before_snapshot() {
        let remote = Arc::new(FakeRemote::new().with_game(
            "g1",
            vec![
                game_full("rival", "pilot", "e2e4"),
                game_state("e2e4 c7c5"),
                game_state("e2e4 c7c5 g1f3"),
            ],
        ));
        let launcher = Arc::new(ScriptedLauncher::playing(&["e2e4", "c7c5", "g1f3", "d7d6"]));

        session(&remote, &launcher, None).run().await;

        assert_eq!(
            remote.actions(),
            vec![
                Action::Move("g1".to_string(), "c7c5".to_string()),
                Action::Move("g1".to_string(), "d7d6".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn greeting_failure_is_not_fatal() {
        let remote = Arc::new(
            FakeRemote::new()
                .failing_chat()
                .with_game("g1", vec![game_full("rival", "pilot", "")]),
        );
        let launcher = Arc::new(ScriptedLauncher::silent());

        session(&remote, &launcher, Some("hi")).run().await;

        assert_eq!(
            remote.actions(),
            vec![Action::Chat("g1".to_string(), "hi".to_string())]
        );
    }

    #[tokio::test]
    async fn move_rejection_aborts_game() {
        let remote = Arc::new(
            FakeRemote::new()
                .failing_moves()
                .with_game("g1", vec![game_full("pilot", "rival", "")]),
        );
        let launcher = Arc::new(ScriptedLauncher::playing(&["e2e4"]));

        session(&remote, &launcher, None).run().await;

        assert_eq!(
            remote.actions(),
            vec![
                Action::Move("g1".to_string(), "e2e4".to_string()),
                Action::Abort("g1".to_string()),
            ]
        );
        assert!(launcher.only_log().closed());
    }

    #[tokio::test]
    async fn engine_failure_resigns_when_abort_fails() {
        let remote = Arc::new(
            FakeRemote::new()
                .failing_abort()
                .with_game("g1", vec![game_full("pilot", "rival", "")]),
        );
        let launcher = Arc::new(ScriptedLauncher::silent());

        session(&remote, &launcher, None).run().await;

        assert_eq!(
            remote.actions(),
            vec![
                Action::Abort("g1".to_string()),
                Action::Resign("g1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn gives_up_quietly_when_every_recovery_step_fails() {
        let remote = Arc::new(
            FakeRemote::new()
                .failing_abort()
                .failing_resign()
                .failing_moves()
                .with_game("g1", vec![game_full("pilot", "rival", "")]),
        );
        let launcher = Arc::new(ScriptedLauncher::playing(&["e2e4"]));

        session(&remote, &launcher, None).run().await;

        assert_eq!(
            remote.actions(),
            vec![
                Action::Move("g1".to_string(), "e2e4".to_string()),
                Action::Abort("g1".to_string()),
                Action::Resign("g1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn launch_failure_is_recovered() {
        let remote = Arc::new(FakeRemote::new());
        let launcher = Arc::new(ScriptedLauncher::broken());

        session(&remote, &launcher, None).run().await;

        assert_eq!(remote.actions(), vec![Action::Abort("g1".to_string())]);
    }

    #[tokio::test]
    async fn finished_game_is_not_searched() {
        let mut over = game_state("f2f3 e7e5 g2g4 d8h4");
        if let GameEvent::GameState(state) = &mut over {
            state.status = "mate".to_string();
        }
        let remote = Arc::new(
            FakeRemote::new().with_game("g1", vec![game_full("rival", "pilot", ""), over]),
        );
        let launcher = Arc::new(ScriptedLauncher::playing(&["f2f3", "e7e5"]));

        session(&remote, &launcher, None).run().await;

        assert!(remote.actions().is_empty());
        assert!(!launcher
            .only_log()
            .sent()
            .iter()
            .any(|line| line.starts_with("go")));
    }
}
