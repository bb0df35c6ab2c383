//! Presets
//!
//! Named bundles of agent contexts and sampling parameters. Four presets are
//! built in; users can save more, which are persisted as JSON next to the
//! TOML configuration (`presets.json`).
//!
//! Applying a preset never touches the model selection or the round count.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{RunConfig, SamplingParams};

/// File name of the saved-preset store inside the config directory
pub const PRESETS_FILE: &str = "presets.json";

/// Errors from loading or saving presets
#[derive(Debug, Error)]
pub enum PresetError {
    /// Failed to read the store
    #[error("Failed to read presets at {path}: {source}")]
    Read {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to write the store
    #[error("Failed to write presets at {path}: {source}")]
    Write {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// The store is not valid JSON
    #[error("Invalid presets file: {0}")]
    Parse(#[from] serde_json::Error),

    /// A preset with this name already exists
    #[error("Preset '{0}' already exists")]
    Duplicate(String),
}

/// Sampling part of a preset; only temperature and max tokens are required
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetSampling {
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens per reply
    pub max_tokens: u32,
    /// Frequency penalty (defaults to 0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Presence penalty (defaults to 0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// Nucleus sampling mass (defaults to 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Comma-separated stop sequences (defaults to empty)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<String>,
}

impl PresetSampling {
    fn basic(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
            frequency_penalty: None,
            presence_penalty: None,
            top_p: None,
            stop_sequences: None,
        }
    }

    /// Expand into full sampling parameters
    #[must_use]
    pub fn to_params(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            frequency_penalty: self.frequency_penalty.unwrap_or(0.0),
            presence_penalty: self.presence_penalty.unwrap_or(0.0),
            top_p: self.top_p.unwrap_or(1.0),
            stop_sequences: self.stop_sequences.clone().unwrap_or_default(),
        }
    }
}

impl From<&SamplingParams> for PresetSampling {
    fn from(params: &SamplingParams) -> Self {
        Self {
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            frequency_penalty: Some(params.frequency_penalty),
            presence_penalty: Some(params.presence_penalty),
            top_p: Some(params.top_p),
            stop_sequences: Some(params.stop_sequences.clone()),
        }
    }
}

/// A named preset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Display name
    pub name: String,
    /// System context for agent A
    pub context1: String,
    /// System context for agent B
    pub context2: String,
    /// Sampling parameters
    pub config: PresetSampling,
}

impl Preset {
    /// Snapshot the contexts and sampling of a run configuration
    pub fn from_run_config(name: impl Into<String>, run: &RunConfig) -> Self {
        Self {
            name: name.into(),
            context1: run.context_a.clone(),
            context2: run.context_b.clone(),
            config: PresetSampling::from(&run.sampling),
        }
    }

    /// Overlay this preset on a run configuration
    #[must_use]
    pub fn apply(&self, base: &RunConfig) -> RunConfig {
        RunConfig {
            context_a: self.context1.clone(),
            context_b: self.context2.clone(),
            sampling: self.config.to_params(),
            ..base.clone()
        }
    }
}

/// The presets every installation starts with
#[must_use]
pub fn builtin_presets() -> Vec<Preset> {
    let preset = |name: &str, context1: &str, context2: &str, temperature: f32, max_tokens: u32| {
        Preset {
            name: name.to_string(),
            context1: context1.to_string(),
            context2: context2.to_string(),
            config: PresetSampling::basic(temperature, max_tokens),
        }
    };

    vec![
        preset(
            "Basic Conversation",
            "Respond in exactly one sentence.",
            "Keep responses under 10 words.",
            0.7,
            100,
        ),
        preset(
            "Numerical Test",
            "Give numerical answers only.",
            "Verify and challenge numerical responses.",
            0.2,
            50,
        ),
        preset(
            "Question Chain",
            "Respond only with questions.",
            "Answer questions with questions.",
            0.8,
            75,
        ),
        preset(
            "Fact Checking",
            "Stick to factual statements only.",
            "Verify or challenge factual claims.",
            0.3,
            150,
        ),
    ]
}

/// Saved presets backed by a JSON file
#[derive(Clone, Debug, Default)]
pub struct PresetStore {
    path: Option<PathBuf>,
    saved: Vec<Preset>,
}

impl PresetStore {
    /// Store in the default location (`<config dir>/presets.json`)
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open_default() -> Result<Self, PresetError> {
        match crate::config::config_dir() {
            Some(dir) => Self::open(dir.join(PRESETS_FILE)),
            None => {
                tracing::warn!("No config directory available, saved presets are in-memory only");
                Ok(Self::default())
            }
        }
    }

    /// Load saved presets from `path`; a missing file is an empty store
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PresetError> {
        let path = path.into();
        let saved: Vec<Preset> = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| PresetError::Read {
                path: path.clone(),
                source: e,
            })?;
            serde_json::from_str(&content)?
        } else {
            Vec::new()
        };

        tracing::debug!(path = %path.display(), count = saved.len(), "Loaded saved presets");
        Ok(Self {
            path: Some(path),
            saved,
        })
    }

    /// Backing file, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// User-saved presets in save order
    #[must_use]
    pub fn saved(&self) -> &[Preset] {
        &self.saved
    }

    /// Built-ins followed by saved presets
    #[must_use]
    pub fn all(&self) -> Vec<Preset> {
        let mut all = builtin_presets();
        all.extend(self.saved.iter().cloned());
        all
    }

    /// Look a preset up by name, built-ins first
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Preset> {
        builtin_presets()
            .into_iter()
            .chain(self.saved.iter().cloned())
            .find(|p| p.name == name)
    }

    /// Name the next auto-named preset gets
    ///
    /// Counts up from one past the saved count and skips names already taken.
    #[must_use]
    pub fn next_auto_name(&self) -> String {
        (self.saved.len() + 1..)
            .map(|n| format!("Template {n}"))
            .find(|name| self.find(name).is_none())
            .unwrap_or_default()
    }

    /// Save the current run configuration as a preset
    ///
    /// Without a name the preset is auto-named `Template N`.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Duplicate`] if the name is taken, or a write
    /// error if persisting fails.
    pub fn save(&mut self, name: Option<&str>, run: &RunConfig) -> Result<Preset, PresetError> {
        let name = name.map_or_else(|| self.next_auto_name(), str::to_string);
        if self.find(&name).is_some() {
            return Err(PresetError::Duplicate(name));
        }

        let preset = Preset::from_run_config(name, run);
        self.saved.push(preset.clone());
        if let Err(e) = self.persist() {
            self.saved.pop();
            return Err(e);
        }

        tracing::info!(name = %preset.name, "Saved preset");
        Ok(preset)
    }

    fn persist(&self) -> Result<(), PresetError> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        let write_err = |source| PresetError::Write {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(&self.saved)?;
        std::fs::write(path, json).map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_builtins() {
        let names: Vec<String> = builtin_presets().into_iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            vec![
                "Basic Conversation",
                "Numerical Test",
                "Question Chain",
                "Fact Checking"
            ]
        );
    }

    #[test]
    fn test_apply_fills_optional_defaults() {
        let mut base = RunConfig {
            model_a: "a/one".to_string(),
            rounds: 3,
            ..Default::default()
        };
        base.sampling.top_p = 0.5;
        base.sampling.stop_sequences = "END".to_string();

        let store = PresetStore::default();
        let numerical = store.find("Numerical Test").unwrap();
        let applied = numerical.apply(&base);

        assert_eq!(applied.model_a, "a/one");
        assert_eq!(applied.rounds, 3);
        assert_eq!(applied.context_a, "Give numerical answers only.");
        assert_eq!(applied.sampling.max_tokens, 50);
        assert!((applied.sampling.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(applied.sampling.top_p, 1.0);
        assert_eq!(applied.sampling.stop_sequences, "");
    }

    #[test]
    fn test_save_auto_names_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(PRESETS_FILE);

        let mut store = PresetStore::open(&path).unwrap();
        assert!(store.saved().is_empty());

        let mut run = RunConfig::default();
        run.context_a = "Speak like a pirate.".to_string();
        run.sampling.stop_sequences = "Arr".to_string();

        let first = store.save(None, &run).unwrap();
        assert_eq!(first.name, "Template 1");
        let second = store.save(Some("Pirates"), &run).unwrap();
        assert_eq!(second.name, "Pirates");
        assert_eq!(store.next_auto_name(), "Template 3");

        let reopened = PresetStore::open(&path).unwrap();
        assert_eq!(reopened.saved().len(), 2);
        let pirates = reopened.find("Pirates").unwrap();
        assert_eq!(pirates.apply(&RunConfig::default()).sampling.stop_sequences, "Arr");
        assert_eq!(reopened.all().len(), 6);
    }

    #[test]
    fn test_auto_name_skips_taken_names() {
        let mut store = PresetStore::default();
        let run = RunConfig::default();
        store.save(Some("Template 2"), &run).unwrap();

        let saved = store.save(None, &run).unwrap();
        assert_eq!(saved.name, "Template 3");
        assert_eq!(store.saved().len(), 2);
        assert_eq!(store.next_auto_name(), "Template 4");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut store = PresetStore::default();
        let err = store
            .save(Some("Fact Checking"), &RunConfig::default())
            .unwrap_err();
        assert!(matches!(err, PresetError::Duplicate(_)));
        assert!(store.saved().is_empty());
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PRESETS_FILE);
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            PresetStore::open(&path),
            Err(PresetError::Parse(_))
        ));
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(&builtin_presets()[0]).unwrap();
        assert_eq!(json["context1"], "Respond in exactly one sentence.");
        assert_eq!(json["config"]["maxTokens"], 100);
        assert!(json["config"].get("topP").is_none());
    }
}
