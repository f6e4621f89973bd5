//! Self-play: many games between a baseline and a candidate engine.
//!
//! Workers share one [`Scoreboard`]. Each claims a game index by atomic
//! decrement, plays that game on the blocking pool with two freshly launched
//! engines and adds the result, counted from the baseline's side. The
//! baseline plays white in even-indexed games.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::task::{JoinError, JoinSet};

use crate::game_runner::{GameError, GameRunner};
use crate::rules::MatchResult;
use crate::transport::Launcher;
use crate::uci_client::Clock;

/// Errors that fail a self-play run.
#[derive(Error, Debug)]
pub enum SelfPlayError {
    #[error("Worker {worker} failed game {index}: {source}")]
    Game {
        worker: usize,
        index: u32,
        #[source]
        source: GameError,
    },
    #[error("Self-play was cancelled")]
    Cancelled,
    #[error("Worker panicked: {0}")]
    Worker(#[from] JoinError),
}

/// What to play.
#[derive(Debug, Clone)]
pub struct SelfPlaySession {
    /// Engine the candidate is measured against.
    pub baseline: PathBuf,
    /// Engine under test.
    pub candidate: PathBuf,
    /// Games to play in total, split across the workers.
    pub games: u32,
    /// Concurrent workers; `None` or zero means one.
    pub parallelism: Option<usize>,
    /// Sent with every search.
    pub clock: Clock,
}

impl SelfPlaySession {
    /// A session of `games` games on one worker with no clock.
    pub fn new(baseline: impl Into<PathBuf>, candidate: impl Into<PathBuf>, games: u32) -> Self {
        Self {
            baseline: baseline.into(),
            candidate: candidate.into(),
            games,
            parallelism: None,
            clock: Clock::default(),
        }
    }

    /// Number of workers to start; at least one.
    pub fn workers(&self) -> usize {
        self.parallelism.filter(|&n| n > 0).unwrap_or(1)
    }
}

/// Results from the baseline's point of view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelfPlayResult {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl SelfPlayResult {
    pub fn total(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    /// Match points as `(candidate, baseline)`, half a point per draw.
    pub fn score(&self) -> (f64, f64) {
        let half = f64::from(self.draws) / 2.0;
        (f64::from(self.losses) + half, f64::from(self.wins) + half)
    }
}

/// Counters shared by every worker of a run.
#[derive(Debug)]
pub struct Scoreboard {
    remaining: AtomicI64,
    wins: AtomicU32,
    losses: AtomicU32,
    draws: AtomicU32,
    halted: AtomicBool,
}

impl Scoreboard {
    /// A board with `games` games left to claim and no results.
    pub fn new(games: u32) -> Self {
        Self {
            remaining: AtomicI64::new(i64::from(games)),
            wins: AtomicU32::new(0),
            losses: AtomicU32::new(0),
            draws: AtomicU32::new(0),
            halted: AtomicBool::new(false),
        }
    }

    /// Claims the next game and returns its index, or `None` once every
    /// game has been handed out.
    pub fn claim(&self) -> Option<u32> {
        let left = self.remaining.fetch_sub(1, Ordering::SeqCst) - 1;
        u32::try_from(left).ok()
    }

    /// Adds a finished game.
    pub fn record(&self, baseline_white: bool, result: MatchResult) {
        let counter = match (result, baseline_white) {
            (MatchResult::Draw, _) => &self.draws,
            (MatchResult::WhiteWins, true) | (MatchResult::BlackWins, false) => &self.wins,
            (MatchResult::WhiteWins, false) | (MatchResult::BlackWins, true) => &self.losses,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Stops workers from claiming further games.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }

    /// Whether [`Scoreboard::halt`] has been called.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// A snapshot of the totals recorded so far.
    pub fn result(&self) -> SelfPlayResult {
        SelfPlayResult {
            wins: self.wins.load(Ordering::SeqCst),
            losses: self.losses.load(Ordering::SeqCst),
            draws: self.draws.load(Ordering::SeqCst),
        }
    }
}

/// Whether the baseline plays white in game `index`.
pub fn baseline_plays_white(index: u32) -> bool {
    index % 2 == 0
}

struct Shared<L> {
    session: SelfPlaySession,
    launcher: Arc<L>,
    board: Scoreboard,
    cancel: Arc<AtomicBool>,
}

/// A self-play run: `workers()` blocking tasks share one [`Scoreboard`],
/// each claiming games until none are left. Every game gets two freshly
/// launched engines.
pub struct SelfPlay<L> {
    session: SelfPlaySession,
    launcher: Arc<L>,
    cancel: Arc<AtomicBool>,
}

impl<L: Launcher + 'static> SelfPlay<L> {
    /// A run of `session`, starting engines through `launcher`.
    pub fn new(session: SelfPlaySession, launcher: Arc<L>) -> Self {
        Self {
            session,
            launcher,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stops the run between games once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Plays every game and returns the totals.
    ///
    /// # Errors
    ///
    /// The first failed game fails the run. Games already in flight finish
    /// first, but no worker starts a new one.
    pub async fn run(self) -> Result<SelfPlayResult, SelfPlayError> {
        let workers = self.session.workers();
        let games = self.session.games;
        tracing::info!(
            baseline = %self.session.baseline.display(),
            candidate = %self.session.candidate.display(),
            games,
            workers,
            "starting self-play"
        );

        let shared = Arc::new(Shared {
            board: Scoreboard::new(games),
            session: self.session,
            launcher: self.launcher,
            cancel: self.cancel,
        });

        let mut set = JoinSet::new();
        for worker in 0..workers {
            let shared = Arc::clone(&shared);
            set.spawn_blocking(move || play_games(worker, &shared));
        }

        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            let failure = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(e) => {
                    shared.board.halt();
                    SelfPlayError::Worker(e)
                }
            };
            if first_error.is_none() {
                first_error = Some(failure);
            } else {
                tracing::warn!(error = %failure, "additional worker failure");
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        let result = shared.board.result();
        if result.total() < games && shared.cancel.load(Ordering::SeqCst) {
            tracing::warn!(played = result.total(), games, "self-play cancelled");
            return Err(SelfPlayError::Cancelled);
        }
        tracing::info!(
            wins = result.wins,
            losses = result.losses,
            draws = result.draws,
            "self-play finished"
        );
        Ok(result)
    }
}

fn play_games<L: Launcher>(worker: usize, shared: &Shared<L>) -> Result<(), SelfPlayError> {
    loop {
        if shared.cancel.load(Ordering::SeqCst) || shared.board.is_halted() {
            tracing::debug!(worker, "worker stopping early");
            return Ok(());
        }
        let Some(index) = shared.board.claim() else {
            tracing::debug!(worker, "no games left");
            return Ok(());
        };

        let baseline_white = baseline_plays_white(index);
        match play_one(shared, baseline_white) {
            Ok(result) => {
                tracing::info!(worker, game = index, baseline_white, ?result, "game finished");
                shared.board.record(baseline_white, result);
            }
            Err(source) => {
                shared.board.halt();
                return Err(SelfPlayError::Game {
                    worker,
                    index,
                    source,
                });
            }
        }
    }
}

fn play_one<L: Launcher>(shared: &Shared<L>, baseline_white: bool) -> Result<MatchResult, GameError> {
    let session = &shared.session;
    let baseline = shared.launcher.launch(&session.baseline)?;
    let candidate = match shared.launcher.launch(&session.candidate) {
        Ok(candidate) => candidate,
        Err(e) => {
            if let Err(shutdown) = baseline.shutdown() {
                tracing::warn!(error = %shutdown, "baseline shutdown failed");
            }
            return Err(e.into());
        }
    };

    let (white, black) = if baseline_white {
        (baseline, candidate)
    } else {
        (candidate, baseline)
    };
    let record = GameRunner::new(white, black, session.clock).play_game()?;
    tracing::debug!(
        white = %record.white_name,
        black = %record.black_name,
        plies = record.moves.len(),
        "game record"
    );
    Ok(record.result)
}
