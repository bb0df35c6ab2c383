//! Run configuration snapshot
//!
//! A [`RunConfig`] is captured once when a run starts and is never re-read
//! while turns execute. Field names on the wire (`model1`, `context1`,
//! `maxTokens`, ...) match the `configuration` block of exported transcripts.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::turn::Speaker;

/// Model menu offered by the front end
pub const KNOWN_MODELS: &[&str] = &[
    "google/gemini-pro-1.5-exp",
    "google/gemini-exp-1121:free",
    "meta-llama/llama-3.2-3b-instruct:free",
    "meta-llama/llama-3.2-1b-instruct:free",
    "google/gemma-2-9b-it:free",
    "mistralai/mistral-7b-instruct:free",
    "microsoft/phi-3-mini-128k-instruct:free",
    "openchat/openchat-7b:free",
];

/// Default model for both agents
pub const DEFAULT_MODEL: &str = "google/gemini-pro-1.5-exp";

/// Default system context for agent A
pub const DEFAULT_CONTEXT_A: &str =
    "Keep responses concise (max 2 sentences). You are chatting with a child.";

/// Default system context for agent B
pub const DEFAULT_CONTEXT_B: &str =
    "Keep responses concise (max 2 sentences). Try to subtly challenge the other AI's statements.";

/// Display name for a model id: the part after the provider prefix, minus `:free`
#[must_use]
pub fn short_model_name(model: &str) -> &str {
    let name = model.split_once('/').map_or(model, |(_, rest)| rest);
    name.strip_suffix(":free").unwrap_or(name)
}

/// Sampling parameters shared by both agents
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SamplingParams {
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens per reply
    pub max_tokens: u32,
    /// Frequency penalty (-2.0 to 2.0)
    pub frequency_penalty: f32,
    /// Presence penalty (-2.0 to 2.0)
    pub presence_penalty: f32,
    /// Nucleus sampling mass (0.0 to 1.0)
    pub top_p: f32,
    /// Comma-separated stop sequences, as entered by the user
    pub stop_sequences: String,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 100,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            top_p: 1.0,
            stop_sequences: String::new(),
        }
    }
}

/// Immutable snapshot of everything a run needs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Model for agent A
    #[serde(rename = "model1")]
    pub model_a: String,
    /// Model for agent B
    #[serde(rename = "model2")]
    pub model_b: String,
    /// System context for agent A
    #[serde(rename = "context1")]
    pub context_a: String,
    /// System context for agent B
    #[serde(rename = "context2")]
    pub context_b: String,
    /// Number of rounds (one A turn plus one B turn each)
    pub rounds: u32,
    /// Sampling parameters
    #[serde(flatten)]
    pub sampling: SamplingParams,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model_a: DEFAULT_MODEL.to_string(),
            model_b: DEFAULT_MODEL.to_string(),
            context_a: DEFAULT_CONTEXT_A.to_string(),
            context_b: DEFAULT_CONTEXT_B.to_string(),
            rounds: 5,
            sampling: SamplingParams::default(),
        }
    }
}

impl RunConfig {
    /// Model id for a speaker
    #[must_use]
    pub fn model_for(&self, speaker: Speaker) -> &str {
        match speaker {
            Speaker::AgentA => &self.model_a,
            Speaker::AgentB => &self.model_b,
        }
    }

    /// System context for a speaker
    #[must_use]
    pub fn context_for(&self, speaker: Speaker) -> &str {
        match speaker {
            Speaker::AgentA => &self.context_a,
            Speaker::AgentB => &self.context_b,
        }
    }

    /// Check the snapshot before a run is allowed to start
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rounds == 0 {
            return Err(ConfigError::ValidationError(
                "rounds must be at least 1".to_string(),
            ));
        }
        if self.model_a.trim().is_empty() || self.model_b.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "both agents need a model".to_string(),
            ));
        }
        let s = &self.sampling;
        if !(0.0..=2.0).contains(&s.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "temperature {} outside 0.0..=2.0",
                s.temperature
            )));
        }
        if !(0.0..=1.0).contains(&s.top_p) {
            return Err(ConfigError::ValidationError(format!(
                "top_p {} outside 0.0..=1.0",
                s.top_p
            )));
        }
        for (name, value) in [
            ("frequency_penalty", s.frequency_penalty),
            ("presence_penalty", s.presence_penalty),
        ] {
            if !(-2.0..=2.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} {value} outside -2.0..=2.0"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_short_model_name() {
        assert_eq!(
            short_model_name("meta-llama/llama-3.2-3b-instruct:free"),
            "llama-3.2-3b-instruct"
        );
        assert_eq!(
            short_model_name("google/gemini-pro-1.5-exp"),
            "gemini-pro-1.5-exp"
        );
        assert_eq!(short_model_name("local-model"), "local-model");
    }

    #[test]
    fn test_serializes_with_export_field_names() {
        let json = serde_json::to_value(RunConfig::default()).unwrap();
        assert_eq!(json["model1"], DEFAULT_MODEL);
        assert_eq!(json["context2"], DEFAULT_CONTEXT_B);
        assert_eq!(json["rounds"], 5);
        assert_eq!(json["maxTokens"], 100);
        assert_eq!(json["topP"], 1.0);
        assert_eq!(json["stopSequences"], "");
        assert!(json.get("sampling").is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{"model1": "a/b", "rounds": 2, "temperature": 0.2}"#)
                .unwrap();
        assert_eq!(config.model_a, "a/b");
        assert_eq!(config.model_b, DEFAULT_MODEL);
        assert_eq!(config.rounds, 2);
        assert!((config.sampling.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.sampling.max_tokens, 100);
    }

    #[test]
    fn test_validate() {
        assert!(RunConfig::default().validate().is_ok());

        let zero_rounds = RunConfig {
            rounds: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_rounds.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut bad_top_p = RunConfig::default();
        bad_top_p.sampling.top_p = 1.5;
        assert!(bad_top_p.validate().is_err());

        let mut bad_penalty = RunConfig::default();
        bad_penalty.sampling.presence_penalty = -3.0;
        assert!(bad_penalty.validate().is_err());

        let no_model = RunConfig {
            model_b: "  ".to_string(),
            ..Default::default()
        };
        assert!(no_model.validate().is_err());
    }

    #[test]
    fn test_per_speaker_lookup() {
        let config = RunConfig {
            model_a: "a/one".to_string(),
            model_b: "b/two".to_string(),
            ..Default::default()
        };
        assert_eq!(config.model_for(Speaker::AgentA), "a/one");
        assert_eq!(config.model_for(Speaker::AgentB), "b/two");
        assert_eq!(config.context_for(Speaker::AgentB), DEFAULT_CONTEXT_B);
    }
}
