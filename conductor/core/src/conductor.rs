//! Conductor - The Conversation Orchestrator
//!
//! The Conductor drives a bounded dialogue between two agents. It owns the
//! run state machine, the displayed message list, the shared conversation
//! history and the metrics, and hands them to the [`TurnExecutor`] one turn at
//! a time.
//!
//! ```text
//!        start()                     loop exits normally
//! Idle ──────────► Running ─────────────────────────────► Completed
//!   ▲                │  stop()                              │
//!   │                ▼                                      │
//!   │             Stopping ── grace / loop exit ──► Stopped │
//!   └───────────────────────── start() ◄────────────────────┘
//! ```
//!
//! # Design Philosophy
//!
//! Turns never overlap: agent B only starts once agent A's turn has reached a
//! terminal status. The history therefore has exactly one writer and the
//! metrics need no lock. The only state shared across tasks is the run state
//! and the current cancellation token, which a [`StopHandle`] needs to reach
//! from outside the running future.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backend::ChatBackend;
use crate::config::{ConductorConfig, ConfigError, RunConfig};
use crate::messages::{ConductorMessage, DisplayMessage, RunId, RunState};
use crate::metrics::Metrics;
use crate::session::ConversationHistory;
use crate::turn::{Speaker, TurnExecutor, TurnStatus};

/// Errors surfaced by [`Conductor::start`] and the clear operations
#[derive(Debug, Error)]
pub enum ConductorError {
    /// The run configuration or the backend is unusable
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A run is live
    #[error("a run is already in progress")]
    AlreadyRunning,
}

/// Summary of a finished run
#[derive(Clone, Debug, PartialEq)]
pub struct RunOutcome {
    /// Run identifier
    pub run_id: RunId,
    /// Terminal state (`Completed` or `Stopped`)
    pub state: RunState,
    /// Turns in the message list
    pub turns: usize,
    /// How many of those turns failed
    pub failed_turns: usize,
    /// Whether the loop ended on a caught panic
    pub faulted: bool,
}

/// Shared state a [`StopHandle`] needs
#[derive(Debug, Default)]
struct RunControl {
    state: RunState,
    cancel: CancellationToken,
}

/// Stops the active run from another task
#[derive(Clone)]
pub struct StopHandle {
    control: Arc<Mutex<RunControl>>,
    grace: Duration,
    tx: mpsc::Sender<ConductorMessage>,
}

impl StopHandle {
    /// Cancel the in-flight run
    ///
    /// Only meaningful while `Running`; otherwise a no-op. Moves to `Stopping`,
    /// waits the grace interval for the in-flight turn to notice, then settles
    /// on `Stopped`.
    pub async fn stop(&self) {
        {
            let mut control = self.control.lock();
            if control.state != RunState::Running {
                tracing::debug!(state = ?control.state, "Stop ignored, no run in progress");
                return;
            }
            control.state = RunState::Stopping;
            control.cancel.cancel();
        }
        tracing::info!("Stopping run");
        self.notify(RunState::Stopping);

        tokio::time::sleep(self.grace).await;

        let settled = {
            let mut control = self.control.lock();
            if control.state == RunState::Stopping {
                control.state = RunState::Stopped;
                true
            } else {
                false
            }
        };
        if settled {
            self.notify(RunState::Stopped);
        }
    }

    /// Current run state
    #[must_use]
    pub fn state(&self) -> RunState {
        self.control.lock().state
    }

    /// The run itself reports its final state, so a full surface only loses
    /// the early notice.
    fn notify(&self, state: RunState) {
        if let Err(e) = self.tx.try_send(ConductorMessage::State { state }) {
            tracing::debug!(?state, "State notice not delivered: {}", e);
        }
    }
}

/// Leaves the state machine in a terminal state if the run future is dropped
/// or unwinds before it finishes normally
struct RunGuard {
    control: Arc<Mutex<RunControl>>,
    armed: bool,
}

impl RunGuard {
    fn finish(mut self, state: RunState) {
        self.control.lock().state = state;
        self.armed = false;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.armed {
            let mut control = self.control.lock();
            if control.state.is_active() {
                control.cancel.cancel();
                control.state = RunState::Stopped;
            }
        }
    }
}

/// The Conductor - orchestrates two-agent runs
pub struct Conductor<B: ChatBackend> {
    config: ConductorConfig,
    executor: TurnExecutor<B>,
    tx: mpsc::Sender<ConductorMessage>,
    control: Arc<Mutex<RunControl>>,
    messages: Vec<DisplayMessage>,
    history: ConversationHistory,
    metrics: Metrics,
}

impl<B: ChatBackend + 'static> Conductor<B> {
    /// Create a new Conductor
    pub fn new(backend: B, config: ConductorConfig, tx: mpsc::Sender<ConductorMessage>) -> Self {
        Self {
            executor: TurnExecutor::new(Arc::new(backend), tx.clone()),
            config,
            tx,
            control: Arc::new(Mutex::new(RunControl::default())),
            messages: Vec::new(),
            history: ConversationHistory::new(),
            metrics: Metrics::new(),
        }
    }

    /// Handle for stopping runs from another task
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            control: Arc::clone(&self.control),
            grace: self.config.stop_grace,
            tx: self.tx.clone(),
        }
    }

    /// Current run state
    #[must_use]
    pub fn state(&self) -> RunState {
        self.control.lock().state
    }

    /// Displayed message list
    #[must_use]
    pub fn messages(&self) -> &[DisplayMessage] {
        &self.messages
    }

    /// Shared conversation history
    #[must_use]
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Accumulated metrics
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Backend serving both agents
    pub fn backend(&self) -> &B {
        self.executor.backend()
    }

    /// Empty the message list and history
    ///
    /// # Errors
    ///
    /// Returns [`ConductorError::AlreadyRunning`] while a run is live.
    pub fn clear(&mut self) -> Result<(), ConductorError> {
        self.ensure_idle()?;
        self.messages.clear();
        self.history.clear();
        Ok(())
    }

    /// Zero the metrics
    ///
    /// # Errors
    ///
    /// Returns [`ConductorError::AlreadyRunning`] while a run is live.
    pub fn clear_metrics(&mut self) -> Result<(), ConductorError> {
        self.ensure_idle()?;
        self.metrics.reset();
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), ConductorError> {
        if self.state().is_active() {
            return Err(ConductorError::AlreadyRunning);
        }
        Ok(())
    }

    /// Run a full dialogue with the given snapshot
    ///
    /// Returns once the run reaches `Completed` or `Stopped`. Turn-level
    /// failures are absorbed into the outcome and the metrics.
    ///
    /// # Errors
    ///
    /// Configuration problems (invalid snapshot, missing credential) are
    /// returned before the state leaves its current value;
    /// [`ConductorError::AlreadyRunning`] if another run is live.
    pub async fn start(&mut self, config: RunConfig) -> Result<RunOutcome, ConductorError> {
        config.validate()?;
        self.executor.backend().validate()?;

        let cancel = CancellationToken::new();
        {
            let mut control = self.control.lock();
            if !control.state.can_start() {
                return Err(ConductorError::AlreadyRunning);
            }
            control.state = RunState::Running;
            control.cancel = cancel.clone();
        }
        let guard = RunGuard {
            control: Arc::clone(&self.control),
            armed: true,
        };

        let run_id = RunId::new();
        self.messages.clear();
        self.history.clear();

        tracing::info!(
            %run_id,
            backend = self.executor.backend().name(),
            model_a = %config.model_a,
            model_b = %config.model_b,
            rounds = config.rounds,
            "Run started"
        );
        self.send(
            ConductorMessage::State {
                state: RunState::Running,
            },
            &cancel,
        )
        .await;

        let result = AssertUnwindSafe(self.run_rounds(run_id, &config, &cancel))
            .catch_unwind()
            .await;

        let faulted = match result {
            Ok(()) => false,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(%run_id, %reason, "Run loop panicked");
                cancel.cancel();
                true
            }
        };

        let state = if faulted || cancel.is_cancelled() {
            RunState::Stopped
        } else {
            RunState::Completed
        };
        guard.finish(state);

        let outcome = RunOutcome {
            run_id,
            state,
            turns: self.messages.len(),
            failed_turns: self
                .messages
                .iter()
                .filter(|m| m.status == TurnStatus::Failed)
                .count(),
            faulted,
        };

        tracing::info!(
            %run_id,
            %state,
            turns = outcome.turns,
            failed = outcome.failed_turns,
            "Run finished"
        );
        self.send(ConductorMessage::State { state }, &cancel).await;
        self.send(
            ConductorMessage::RunFinished {
                run_id,
                state,
                turns: outcome.turns,
            },
            &cancel,
        )
        .await;

        Ok(outcome)
    }

    /// The turn-taking loop
    ///
    /// Ends early when a turn is aborted or cancellation lands during pacing.
    async fn run_rounds(
        &mut self,
        run_id: RunId,
        config: &RunConfig,
        cancel: &CancellationToken,
    ) {
        let mut prompt = self.config.opening_prompt.clone();

        'rounds: for round in 1..=config.rounds {
            for speaker in [Speaker::AgentA, Speaker::AgentB] {
                if cancel.is_cancelled() || self.state() != RunState::Running {
                    break 'rounds;
                }

                let started = ConductorMessage::TurnStarted {
                    run_id,
                    round,
                    speaker,
                    model: config.model_for(speaker).to_string(),
                };
                self.send(started, cancel).await;

                let turn = self
                    .executor
                    .execute_turn(
                        speaker,
                        &prompt,
                        config,
                        &mut self.history,
                        &mut self.metrics,
                        cancel,
                    )
                    .await;

                if turn.status == TurnStatus::Aborted {
                    tracing::info!(%run_id, round, %speaker, "Turn aborted, ending run");
                    break 'rounds;
                }

                let message = DisplayMessage::from(&turn);
                prompt.clone_from(&message.content);
                self.messages.push(message.clone());
                self.send(ConductorMessage::TurnComplete(message), cancel)
                    .await;
                self.send(ConductorMessage::Metrics(self.metrics.snapshot()), cancel)
                    .await;

                if !self.pace(cancel).await {
                    break 'rounds;
                }
            }
        }
    }

    /// Wait out the pacing interval; `false` if cancelled before or during it
    async fn pace(&self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(self.config.pacing) => !cancel.is_cancelled(),
        }
    }

    /// Deliver to the surface unless the run is cancelled while waiting
    /// for channel capacity
    async fn send(&self, msg: ConductorMessage, cancel: &CancellationToken) {
        tokio::select! {
            biased;
            sent = self.tx.send(msg) => {
                if let Err(e) = sent {
                    tracing::warn!("Failed to send message to surface: {}", e);
                }
            }
            () = cancel.cancelled() => {
                tracing::debug!("Run cancelled while the surface was full, message dropped");
            }
        }
    }
}
