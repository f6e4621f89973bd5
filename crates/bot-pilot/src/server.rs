//! Server mode: answers challenges and plays games on the matchmaking
//! service until its event stream ends.

use std::future::{self, Future};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::config::ServerConfig;
use crate::intake::ChallengeIntake;
use crate::remote::{IncomingEvent, Profile, RemoteError, RemoteService};
use crate::session::{recover, GameSession};
use crate::transport::{Launcher, ProcessLauncher};

/// Errors that stop server mode.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Only accounts with the BOT title may play through the bot API.
    #[error("Account '{0}' is not a bot account")]
    NotABot(String),
    /// The profile or the account event stream could not be read.
    #[error("Service error: {0}")]
    Remote(#[from] RemoteError),
}

/// Game tasks in flight. Finished tasks are collected as they end, so a
/// long-running server holds one entry per game still being played.
#[derive(Default)]
struct RunningGames {
    tasks: JoinSet<()>,
}

impl RunningGames {
    fn spawn<F>(&mut self, game: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(game);
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for the next game to end. Never completes while no game is
    /// running.
    async fn next_finished(&mut self) {
        match self.tasks.join_next().await {
            Some(joined) => Self::report(joined),
            None => future::pending().await,
        }
    }

    /// Waits for every running game to end.
    async fn drain(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            Self::report(joined);
        }
    }

    fn report(joined: Result<(), JoinError>) {
        if let Err(e) = joined {
            tracing::error!(error = %e, "game task panicked");
        }
    }
}

/// Plays on the matchmaking service as a bot account.
///
/// Challenges go through a [`ChallengeIntake`]; every accepted game runs in
/// its own [`GameSession`] with a freshly launched engine, up to
/// `max_concurrent_games` at once.
///
/// # Example
///
/// ```ignore
/// use bot_pilot::config::ServerConfig;
/// use bot_pilot::server::Server;
///
/// let server = Server::connect(Arc::new(remote), ServerConfig::default()).await?;
/// server.run().await?;
/// ```
pub struct Server<R, L = ProcessLauncher> {
    remote: Arc<R>,
    launcher: Arc<L>,
    config: ServerConfig,
    /// The account the bot plays as.
    profile: Profile,
}

impl<R: RemoteService> Server<R> {
    /// Connects as the account behind `remote`, launching real engine
    /// processes for games.
    ///
    /// # Errors
    ///
    /// Fails if the profile cannot be read or the account is not a bot.
    pub async fn connect(remote: Arc<R>, config: ServerConfig) -> Result<Self, ServerError> {
        Self::with_launcher(remote, Arc::new(ProcessLauncher), config).await
    }
}

impl<R: RemoteService, L: Launcher + 'static> Server<R, L> {
    /// Connects as the account behind `remote`, starting engines for games
    /// through `launcher`.
    ///
    /// # Errors
    ///
    /// Fails if the profile cannot be read or the account is not a bot.
    pub async fn with_launcher(
        remote: Arc<R>,
        launcher: Arc<L>,
        config: ServerConfig,
    ) -> Result<Self, ServerError> {
        let profile = remote.profile().await?;
        if !profile.is_bot() {
            return Err(ServerError::NotABot(profile.username));
        }
        tracing::info!(id = %profile.id, username = %profile.username, "connected");
        Ok(Self {
            remote,
            launcher,
            config,
            profile,
        })
    }

    /// The connected bot account.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Handles account events until the stream ends, then waits for the
    /// challenge queue and every running game to finish.
    ///
    /// Challenges are declined while every game slot is taken. A game that
    /// starts anyway over the limit is aborted, or resigned if it cannot be
    /// aborted.
    ///
    /// # Errors
    ///
    /// Fails only if the event stream cannot be opened.
    pub async fn run(self) -> Result<(), ServerError> {
        let slots = Arc::new(Semaphore::new(self.config.max_concurrent_games.max(1)));
        let (intake, queue) = ChallengeIntake::new(
            Arc::clone(&self.remote),
            self.config.max_pending_challenges.max(1),
            self.config.variants.clone(),
        );
        let consumer = tokio::spawn(queue.with_game_slots(Arc::clone(&slots)).run());

        let settings = Arc::new(self.config.session_settings());
        let mut games = RunningGames::default();

        let mut events = self.remote.stream_events().await?;
        tracing::info!("listening for events");
        loop {
            let event = tokio::select! {
                () = games.next_finished() => continue,
                event = events.recv() => event,
            };
            let Some(event) = event else { break };

            match event {
                IncomingEvent::Challenge { challenge } => {
                    if let Err(e) = intake.submit(challenge).await {
                        tracing::warn!(error = %e, "failed to decline overflow challenge");
                    }
                }
                IncomingEvent::GameStart { game } => {
                    let Ok(slot) = Arc::clone(&slots).try_acquire_owned() else {
                        tracing::warn!(
                            game = %game.id,
                            limit = self.config.max_concurrent_games,
                            "too many games in progress, refusing game"
                        );
                        recover(self.remote.as_ref(), &game.id).await;
                        continue;
                    };
                    let session = GameSession::new(
                        Arc::clone(&self.remote),
                        Arc::clone(&self.launcher),
                        Arc::clone(&settings),
                        game.id.clone(),
                        self.profile.id.clone(),
                    );
                    games.spawn(async move {
                        session.run().await;
                        drop(slot);
                    });
                    tracing::debug!(game = %game.id, running = games.len(), "game task started");
                }
                IncomingEvent::Other => {}
            }
        }
        tracing::info!("event stream ended");

        drop(intake);
        if let Err(e) = consumer.await {
            tracing::error!(error = %e, "challenge loop panicked");
        }
        games.drain().await;
        Ok(())
    }
}
