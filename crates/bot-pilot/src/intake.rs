//! Challenge intake: a bounded queue between the account event stream and
//! the accept/decline policy.
//!
//! [`ChallengeIntake::submit`] never waits. When the queue is full the
//! challenge is declined on the spot, so a burst of challenges cannot stall
//! the event stream. A single [`ChallengeQueue`] drains the queue and decides
//! each challenge on its variant and, when given the server's game slots, on
//! whether a game could start right now.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Semaphore;

use crate::remote::{Challenge, RemoteError, RemoteService};

/// Variant keys the bot accepts unless configured otherwise.
pub const DEFAULT_VARIANTS: &[&str] = &[
    "standard",
    "ultraBullet",
    "bullet",
    "blitz",
    "rapid",
    "classical",
    "correspondence",
];

/// Pending challenges beyond this are declined unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 3;

/// What happened to a submitted challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Enqueued,
    Declined,
}

/// Producer side of the intake queue.
pub struct ChallengeIntake<R> {
    remote: Arc<R>,
    queue: mpsc::Sender<Challenge>,
}

/// Consumer side of the intake queue.
pub struct ChallengeQueue<R> {
    remote: Arc<R>,
    queue: mpsc::Receiver<Challenge>,
    variants: Vec<String>,
    slots: Option<Arc<Semaphore>>,
}

impl<R: RemoteService> ChallengeIntake<R> {
    /// Creates a queue holding at most `capacity` pending challenges.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(
        remote: Arc<R>,
        capacity: usize,
        variants: Vec<String>,
    ) -> (Self, ChallengeQueue<R>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                remote: Arc::clone(&remote),
                queue: tx,
            },
            ChallengeQueue {
                remote,
                queue: rx,
                variants,
                slots: None,
            },
        )
    }

    /// Enqueues `challenge`, or declines it right away if the queue is full.
    ///
    /// # Errors
    ///
    /// Returns the service error if the overflow decline itself fails.
    pub async fn submit(&self, challenge: Challenge) -> Result<Submission, RemoteError> {
        tracing::info!(
            challenge = %challenge.id,
            challenger = %challenge.challenger.name,
            rating = ?challenge.challenger.rating,
            variant = %challenge.variant.key,
            time_control = %challenge.time_control,
            "received challenge"
        );

        match self.queue.try_send(challenge) {
            Ok(()) => Ok(Submission::Enqueued),
            Err(TrySendError::Full(challenge)) | Err(TrySendError::Closed(challenge)) => {
                tracing::info!(
                    challenge = %challenge.id,
                    "too many pending challenges, declining challenge"
                );
                self.remote.decline_challenge(&challenge.id).await?;
                Ok(Submission::Declined)
            }
        }
    }
}

impl<R: RemoteService> ChallengeQueue<R> {
    /// Declines challenges while every permit of `slots` is held.
    pub fn with_game_slots(mut self, slots: Arc<Semaphore>) -> Self {
        self.slots = Some(slots);
        self
    }

    fn plays_variant(&self, key: &str) -> bool {
        self.variants.iter().any(|v| v == key)
    }

    fn is_busy(&self) -> bool {
        self.slots
            .as_ref()
            .is_some_and(|slots| slots.available_permits() == 0)
    }

    async fn decline(&self, challenge: &Challenge) {
        if let Err(e) = self.remote.decline_challenge(&challenge.id).await {
            tracing::warn!(challenge = %challenge.id, error = %e, "failed to decline challenge");
        }
    }

    /// Decides every queued challenge until all producers are gone.
    ///
    /// Accept/decline failures are logged and the loop moves on.
    pub async fn run(mut self) {
        tracing::info!("challenge loop starting");
        while let Some(challenge) = self.queue.recv().await {
            if !self.plays_variant(&challenge.variant.key) {
                tracing::info!(
                    challenge = %challenge.id,
                    variant = %challenge.variant.key,
                    "declining challenge, variant not supported"
                );
                self.decline(&challenge).await;
                continue;
            }
            if self.is_busy() {
                tracing::info!(challenge = %challenge.id, "declining challenge, no free game slot");
                self.decline(&challenge).await;
                continue;
            }

            tracing::info!(challenge = %challenge.id, "accepting challenge");
            if let Err(e) = self.remote.accept_challenge(&challenge.id).await {
                tracing::warn!(challenge = %challenge.id, error = %e, "failed to accept challenge");
            }
        }
        tracing::info!("challenge loop finished");
    }
}
