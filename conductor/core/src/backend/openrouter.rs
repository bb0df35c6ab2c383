//! OpenRouter Backend Implementation
//!
//! Chat backend for OpenRouter and any other OpenAI-compatible endpoint that
//! speaks the `data: ` streaming protocol.
//!
//! # Endpoint
//!
//! One `POST {base_url}/chat/completions` per turn with `stream: true`. The
//! response body is handed back untouched; decoding happens in
//! [`crate::streaming`].

use async_trait::async_trait;
use futures::StreamExt;

use super::traits::{BackendError, ByteStream, ChatBackend, ChatRequest};
use crate::config::{ApiSettings, ConfigError, API_KEY_ENV};

/// OpenRouter backend client
#[derive(Clone)]
pub struct OpenRouterBackend {
    settings: ApiSettings,
    http_client: reqwest::Client,
}

impl OpenRouterBackend {
    /// Create a backend from API settings
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Request`] if the HTTP client cannot be built.
    pub fn new(settings: ApiSettings) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| BackendError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    /// Settings this backend was built from
    #[must_use]
    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatBackend for OpenRouterBackend {
    fn name(&self) -> &str {
        "OpenRouter"
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.settings.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(ConfigError::MissingCredential(API_KEY_ENV.to_string())),
        }
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, BackendError> {
        let mut req = self
            .http_client
            .post(self.completions_url())
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", &self.settings.referer)
            .json(request);

        if let Some(ref key) = self.settings.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        if let Some(ref title) = self.settings.app_title {
            req = req.header("X-Title", title);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                model = %request.model,
                "Backend rejected request"
            );
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(model = %request.model, "Stream opened");
        Ok(Box::pin(
            response.bytes_stream().map(|chunk| chunk.map_err(BackendError::from)),
        ))
    }
}
