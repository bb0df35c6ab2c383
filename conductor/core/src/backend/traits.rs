//! Chat Backend Traits
//!
//! Trait definitions for chat-completion backends. This abstraction lets the
//! Turn Executor drive any OpenAI-compatible streaming endpoint (OpenRouter,
//! a local proxy, or a scripted test double) without changing core logic.
//!
//! # Design Philosophy
//!
//! A backend does exactly one thing: open a streaming request and hand back the
//! raw response body as a byte stream. Framing, decoding and accumulation live
//! in [`crate::streaming`] and [`crate::turn`], so every backend shares the same
//! partial-delivery handling.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::metrics::ErrorCategory;
use crate::session::ChatMessage;

/// Raw response body of a streaming request.
///
/// Dropping the stream releases the underlying connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BackendError>> + Send>>;

/// Failures produced by the network layer
///
/// Classified exactly once, at the point where the transport error is
/// observed, so callers never inspect error text.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request exceeded its deadline
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Could not establish a connection
    #[error("connection failed: {0}")]
    Connect(String),

    /// The server answered with a non-success status
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (may be empty)
        body: String,
    },

    /// The request could not be built or sent
    #[error("request failed: {0}")]
    Request(String),

    /// Reading the response body failed mid-stream
    #[error("response body error: {0}")]
    Body(String),
}

impl BackendError {
    /// Metrics bucket this failure is tallied under
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Timeout(_) => ErrorCategory::Timeout,
            _ => ErrorCategory::Other,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Body of one streaming chat-completion request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier (backend-specific, e.g. `google/gemma-2-9b-it:free`)
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens in the reply
    pub max_tokens: u32,
    /// Frequency penalty
    pub frequency_penalty: f32,
    /// Presence penalty
    pub presence_penalty: f32,
    /// Nucleus sampling mass
    pub top_p: f32,
    /// Stop sequences
    pub stop: Vec<String>,
    /// System context, history, then the new user prompt
    pub messages: Vec<ChatMessage>,
    /// Always `true`; the executor only speaks the streaming protocol
    pub stream: bool,
}

/// Chat backend trait
///
/// Implement this trait to add support for a different chat-completion provider.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the backend name (e.g., "OpenRouter")
    fn name(&self) -> &str;

    /// Check that the backend is usable before a run starts
    ///
    /// A missing credential is reported here so the orchestrator can refuse
    /// to start instead of failing every turn.
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Open a streaming request and return the response body
    ///
    /// The returned stream yields raw bytes exactly as delivered by the
    /// transport; chunk boundaries carry no meaning.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, BackendError>;
}
