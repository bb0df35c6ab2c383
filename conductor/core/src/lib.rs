//! Duel Core - Headless Two-Agent Dialogue Orchestration for llm-duel
//!
//! This crate drives an automated, multi-round dialogue between two
//! independently configured chat models, streaming each reply to a display
//! surface while collecting latency, usage and error metrics. It has no
//! terminal or UI dependencies; the `llm-duel` CLI is one surface among
//! possible others.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Display Surface (CLI)                        │
//! │            ▲ ConductorMessage              │ start / stop         │
//! └────────────┼───────────────────────────────┼──────────────────────┘
//!              │                               ▼
//! ┌────────────┴─────────────────────────────────────────────────────┐
//! │  Conductor (orchestrator: rounds, pacing, cancellation)          │
//! │     │                                                            │
//! │     ▼                                                            │
//! │  TurnExecutor ──► ChatBackend::open_stream ──► StreamDecoder     │
//! │     │                                              │ deltas      │
//! │     ├──► ConversationHistory (append on completion)│             │
//! │     └──► Metrics (record / record_error)  ◄────────┘             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Conductor`]: runs a dialogue and owns history, messages and metrics
//! - [`StopHandle`]: cancels the live run from another task
//! - [`TurnExecutor`]: executes one streaming turn
//! - [`StreamDecoder`]: reassembles `data: ` records into events
//! - [`Metrics`]: running token, latency, cost and error statistics
//! - [`RunConfig`]: immutable snapshot a run is started with
//!
//! # Quick Start
//!
//! ```ignore
//! use duel_core::{Conductor, OpenRouterBackend, config::load_config};
//! use tokio::sync::mpsc;
//!
//! let config = load_config()?;
//! let backend = OpenRouterBackend::new(config.api.clone())?;
//! let (tx, mut rx) = mpsc::channel(256);
//! let mut conductor = Conductor::new(backend, config.conductor.clone(), tx);
//!
//! tokio::spawn(async move {
//!     while let Some(msg) = rx.recv().await {
//!         // Render progress and completed turns
//!     }
//! });
//!
//! let outcome = conductor.start(config.run.clone()).await?;
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: chat backend abstraction and the OpenRouter client
//! - [`streaming`]: stream decoding
//! - [`turn`]: turn data model and the Turn Executor
//! - [`conductor`]: the Conversation Orchestrator
//! - [`metrics`]: the Metrics Aggregator
//! - [`session`]: shared conversation history
//! - [`messages`]: messages from the Conductor to display surfaces
//! - [`config`]: TOML / environment configuration and the run snapshot
//! - [`presets`]: built-in and saved presets
//! - [`export`]: transcript export and configuration import

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod conductor;
pub mod config;
pub mod export;
pub mod messages;
pub mod metrics;
pub mod presets;
pub mod session;
pub mod streaming;
pub mod turn;

// Re-exports for convenience
pub use backend::{BackendError, ByteStream, ChatBackend, ChatRequest, OpenRouterBackend};
pub use conductor::{Conductor, ConductorError, RunOutcome, StopHandle};
pub use messages::{ConductorMessage, DisplayMessage, RunId, RunState};
pub use metrics::{ErrorCategory, ErrorCounts, Metrics};
pub use session::{ChatMessage, ChatRole, ConversationHistory};
pub use streaming::{DecodeError, RecordDecoder, StreamDecoder, StreamEvent};
pub use turn::{Speaker, Turn, TurnExecutor, TurnStatus};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ApiSettings, ConductorConfig,
    ConfigError, ConfigSource, DuelConfigFile, RunConfig, RunOverrides, SamplingParams,
};

// Preset and export exports
pub use export::{import_configuration, ExportDocument, ExportError};
pub use presets::{builtin_presets, Preset, PresetError, PresetStore};
