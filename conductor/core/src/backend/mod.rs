//! Chat Backend Integration
//!
//! Abstracted access to streaming chat-completion endpoints through a common
//! trait interface.
//!
//! # Available Backends
//!
//! - **OpenRouter**: any OpenAI-compatible `/chat/completions` endpoint (default)
//!
//! # Usage
//!
//! ```ignore
//! use duel_core::backend::{ChatBackend, OpenRouterBackend};
//! use duel_core::config::load_config;
//!
//! let config = load_config()?;
//! let backend = OpenRouterBackend::new(config.api)?;
//! backend.validate()?;
//! let body = backend.open_stream(&request).await?;
//! ```

mod openrouter;
mod traits;

pub use openrouter::OpenRouterBackend;
pub use traits::{BackendError, ByteStream, ChatBackend, ChatRequest};
