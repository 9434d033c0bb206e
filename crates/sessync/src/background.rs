//! Periodic background session checks.
//!
//! [`SessionFacade::spawn_background_checks`] starts a small actor task
//! that runs a non-forced `check_session` every `poll_interval`. The
//! returned [`BackgroundChecks`] handle talks to the task over an mpsc
//! channel.
//!
//! The periodic check goes through the normal gating, so it is skipped
//! while a form is submitting or a modal is open, and it never produces a
//! second network call when a check is already in flight.

use sessync_poll::{PollConfig, PollScheduler};
use sessync_session::LocalStore;
use sessync_transport::SessionFetcher;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{SessionFacade, SessyncError};

/// Commands sent from a [`BackgroundChecks`] handle to its task.
enum PollCommand {
    Pause,
    Resume,
    IsPaused { reply: oneshot::Sender<bool> },
    Shutdown,
}

/// Handle to a running background check task.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) also
/// stops the task once it notices the closed channel.
pub struct BackgroundChecks {
    sender: mpsc::Sender<PollCommand>,
    task: JoinHandle<()>,
}

impl BackgroundChecks {
    /// Stops periodic checks until [`resume`](Self::resume).
    pub async fn pause(&self) -> Result<(), SessyncError> {
        self.send(PollCommand::Pause).await
    }

    /// Restarts periodic checks; the next one is a full interval away.
    pub async fn resume(&self) -> Result<(), SessyncError> {
        self.send(PollCommand::Resume).await
    }

    pub async fn is_paused(&self) -> Result<bool, SessyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(PollCommand::IsPaused { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| SessyncError::BackgroundStopped)
    }

    /// Stops the task and waits for it to exit. A check that is running
    /// when the command arrives completes first.
    pub async fn shutdown(self) {
        let _ = self.sender.send(PollCommand::Shutdown).await;
        let _ = self.task.await;
    }

    async fn send(&self, cmd: PollCommand) -> Result<(), SessyncError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| SessyncError::BackgroundStopped)
    }
}

struct PollActor<F, S> {
    facade: SessionFacade<F, S>,
    scheduler: PollScheduler,
    receiver: mpsc::Receiver<PollCommand>,
}

impl<F: SessionFetcher, S: LocalStore> PollActor<F, S> {
    async fn run(mut self) {
        info!(
            interval_secs = self.scheduler.interval().as_secs(),
            "background session checks started"
        );

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(PollCommand::Pause) => self.scheduler.pause(),
                    Some(PollCommand::Resume) => self.scheduler.resume(),
                    Some(PollCommand::IsPaused { reply }) => {
                        let _ = reply.send(self.scheduler.is_paused());
                    }
                    Some(PollCommand::Shutdown) | None => break,
                },
                poll = self.scheduler.wait_for_poll() => {
                    if self.facade.is_loading() {
                        debug!(poll = poll.poll, "session check already loading, skipping poll");
                        continue;
                    }
                    self.facade.check_session(false).await;
                    self.scheduler.record_poll_end();
                }
            }
        }

        info!(polls = self.scheduler.poll_count(), "background session checks stopped");
    }
}

impl<F: SessionFetcher, S: LocalStore> SessionFacade<F, S> {
    /// Spawns the periodic check task configured by `poll_interval` and
    /// `poll_jitter`. With a zero `poll_interval` the task runs but never
    /// checks.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn spawn_background_checks(&self) -> BackgroundChecks {
        let config = self.config();
        if !config.polling_enabled() {
            debug!("poll_interval is zero, background checks disabled");
        }
        let scheduler = PollScheduler::new(PollConfig {
            interval: config.poll_interval,
            initial_jitter: config.poll_jitter,
            ..PollConfig::default()
        });

        let (sender, receiver) = mpsc::channel(8);
        let actor = PollActor {
            facade: self.clone(),
            scheduler,
            receiver,
        };
        let task = tokio::spawn(actor.run());

        BackgroundChecks { sender, task }
    }
}
