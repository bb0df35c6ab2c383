//! Conductor Messages
//!
//! Messages sent from the Conductor to the display surface. The surface is a
//! pure renderer: it shows live progress while a turn streams, the finished
//! turn when it completes, and metrics snapshots between turns. It never
//! mutates orchestration state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::turn::{Speaker, Turn, TurnStatus};

/// Messages from Conductor to display surface
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConductorMessage {
    /// The run state changed
    State {
        /// New state
        state: RunState,
    },

    /// A turn is about to open its request
    TurnStarted {
        /// Run this turn belongs to
        run_id: RunId,
        /// One-based round number
        round: u32,
        /// Who is speaking
        speaker: Speaker,
        /// Model serving the turn
        model: String,
    },

    /// Content so far of the streaming turn
    Progress {
        /// Who is speaking
        speaker: Speaker,
        /// Everything received so far (not just the latest fragment)
        partial_content: String,
    },

    /// A turn finished and was added to the message list
    TurnComplete(DisplayMessage),

    /// Metrics after the latest turn
    Metrics(Metrics),

    /// The run left `Running`; live progress should be cleared
    RunFinished {
        /// Run that finished
        run_id: RunId,
        /// Terminal state
        state: RunState,
        /// Number of turns in the message list
        turns: usize,
    },
}

/// Orchestrator state machine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    /// No run has started
    #[default]
    Idle,
    /// Turns are executing
    Running,
    /// Stop requested; waiting for the in-flight turn
    Stopping,
    /// All rounds executed
    Completed,
    /// Ended early by stop, an aborted turn, or a fault
    Stopped,
}

impl RunState {
    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running...",
            Self::Stopping => "Stopping...",
            Self::Completed => "Completed",
            Self::Stopped => "Stopped",
        }
    }

    /// Whether a run is live (new runs and clears are refused)
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }

    /// Whether a new run may start from this state
    #[must_use]
    pub fn can_start(&self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// One entry of the displayed message list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayMessage {
    /// Who spoke
    pub speaker: Speaker,
    /// Reply text, or the failure placeholder
    pub content: String,
    /// Seconds the turn took
    pub elapsed_seconds: f64,
    /// Words in `content`
    pub word_count: usize,
    /// Terminal status of the turn
    pub status: TurnStatus,
}

impl From<&Turn> for DisplayMessage {
    fn from(turn: &Turn) -> Self {
        let content = turn.display_content().to_string();
        // Counted over what is shown, so a failed turn counts the placeholder
        let word_count = crate::turn::word_count(&content);
        Self {
            speaker: turn.speaker,
            content,
            elapsed_seconds: turn.elapsed_seconds,
            word_count,
            status: turn.status,
        }
    }
}

/// Run identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new unique run ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
