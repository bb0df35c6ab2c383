//! Transcript export and configuration import
//!
//! An export is a flat JSON document with three keys:
//!
//! ```json
//! {
//!   "messages": [{ "role": "AI1", "content": "..." }],
//!   "metrics": { "totalTokens": 5.2, "...": "..." },
//!   "configuration": { "model1": "...", "rounds": 5, "...": "..." }
//! }
//! ```
//!
//! There is no version field. Import only reads `configuration`; missing
//! fields take their defaults.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RunConfig;
use crate::messages::DisplayMessage;
use crate::metrics::Metrics;
use crate::turn::Speaker;

/// Errors from writing exports or importing configuration
#[derive(Debug, Error)]
pub enum ExportError {
    /// File could not be read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Not valid JSON, or `configuration` has the wrong shape
    #[error("Invalid export document: {0}")]
    Json(#[from] serde_json::Error),

    /// The document has no `configuration` object
    #[error("Export document has no configuration")]
    MissingConfiguration,
}

/// One transcript entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportMessage {
    /// `AI1` or `AI2`
    pub role: Speaker,
    /// What was shown for the turn
    pub content: String,
}

impl From<&DisplayMessage> for ExportMessage {
    fn from(message: &DisplayMessage) -> Self {
        Self {
            role: message.speaker,
            content: message.content.clone(),
        }
    }
}

/// A complete export
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Displayed message list
    pub messages: Vec<ExportMessage>,
    /// Metrics at export time
    pub metrics: Metrics,
    /// Run configuration
    pub configuration: RunConfig,
}

impl ExportDocument {
    /// Assemble an export from the orchestrator's current state
    #[must_use]
    pub fn new(messages: &[DisplayMessage], metrics: &Metrics, configuration: &RunConfig) -> Self {
        Self {
            messages: messages.iter().map(ExportMessage::from).collect(),
            metrics: metrics.clone(),
            configuration: configuration.clone(),
        }
    }

    /// Pretty-printed JSON (two-space indent)
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the document to `path`
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_to(&self, path: &Path) -> Result<(), ExportError> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| ExportError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::info!(
            path = %path.display(),
            messages = self.messages.len(),
            "Exported transcript"
        );
        Ok(())
    }
}

/// Default file name for an export taken at `now`
#[must_use]
pub fn default_file_name(now: DateTime<Utc>) -> String {
    format!(
        "llm-test-{}.json",
        now.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

/// Default export file name for the current time, relative to the working directory
#[must_use]
pub fn default_export_path() -> PathBuf {
    PathBuf::from(default_file_name(Utc::now()))
}

/// Read the run configuration out of an export document
///
/// # Errors
///
/// Returns an error if the text is not JSON, has no `configuration` object,
/// or the configuration has mistyped fields.
pub fn import_configuration(json: &str) -> Result<RunConfig, ExportError> {
    let mut document: serde_json::Value = serde_json::from_str(json)?;
    let configuration = match document.get_mut("configuration") {
        Some(value) if value.is_object() => value.take(),
        _ => return Err(ExportError::MissingConfiguration),
    };
    Ok(serde_json::from_value(configuration)?)
}

/// Read the run configuration out of an export file
///
/// # Errors
///
/// Returns an error if the file cannot be read or
/// [`import_configuration`] fails.
pub fn import_configuration_file(path: &Path) -> Result<RunConfig, ExportError> {
    let json = std::fs::read_to_string(path).map_err(|e| ExportError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config = import_configuration(&json)?;
    tracing::info!(path = %path.display(), "Imported configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::TurnStatus;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn message(speaker: Speaker, content: &str) -> DisplayMessage {
        DisplayMessage {
            speaker,
            content: content.to_string(),
            elapsed_seconds: 0.5,
            word_count: 1,
            status: TurnStatus::Completed,
        }
    }

    #[test]
    fn test_document_shape() {
        let doc = ExportDocument::new(
            &[
                message(Speaker::AgentA, "Hello"),
                message(Speaker::AgentB, "Hi there friend"),
            ],
            &Metrics::new(),
            &RunConfig::default(),
        );
        let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();

        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["configuration", "messages", "metrics"]);
        assert_eq!(json["messages"][0]["role"], "AI1");
        assert_eq!(json["messages"][1]["content"], "Hi there friend");
        assert!(json["messages"][0].get("elapsed_seconds").is_none());
        assert_eq!(json["configuration"]["maxTokens"], 100);
        assert_eq!(json["metrics"]["costEstimate"], 0.0);
    }

    #[test]
    fn test_default_file_name() {
        let now = Utc.with_ymd_and_hms(2024, 11, 21, 9, 30, 5).unwrap();
        assert_eq!(default_file_name(now), "llm-test-2024-11-21T09:30:05.000Z.json");
    }

    #[test]
    fn test_import_reads_configuration_only() {
        let json = r#"{
            "messages": "ignored",
            "configuration": {
                "model1": "google/gemma-2-9b-it:free",
                "context2": "Disagree politely.",
                "rounds": 2,
                "temperature": 0.3,
                "maxTokens": 150
            }
        }"#;
        let config = import_configuration(json).unwrap();
        assert_eq!(config.model_a, "google/gemma-2-9b-it:free");
        assert_eq!(config.context_b, "Disagree politely.");
        assert_eq!(config.rounds, 2);
        assert_eq!(config.sampling.max_tokens, 150);
        assert_eq!(config.sampling.top_p, 1.0);
        assert_eq!(config.sampling.stop_sequences, "");
    }

    #[test]
    fn test_export_import_keeps_configuration() {
        let mut run = RunConfig::default();
        run.rounds = 7;
        run.sampling.stop_sequences = "END".to_string();
        let doc = ExportDocument::new(&[], &Metrics::new(), &run);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(default_file_name(Utc::now()));
        doc.write_to(&path).unwrap();

        assert_eq!(import_configuration_file(&path).unwrap(), run);
    }

    #[test]
    fn test_import_errors() {
        assert!(matches!(
            import_configuration("{oops"),
            Err(ExportError::Json(_))
        ));
        assert!(matches!(
            import_configuration(r#"{"messages": []}"#),
            Err(ExportError::MissingConfiguration)
        ));
        assert!(matches!(
            import_configuration(r#"{"configuration": {"rounds": "many"}}"#),
            Err(ExportError::Json(_))
        ));
    }
}
