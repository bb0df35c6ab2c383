//! CLI argument parsing and subcommand dispatch.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use duel_core::config::{load_config_from_path, DuelConfigFile, RunOverrides};

pub mod config;
pub mod models;
pub mod presets;
pub mod run;

/// Pit two chat models against each other in a streamed dialogue.
#[derive(Parser, Debug)]
#[command(name = "llm-duel", version, about = "Two-agent LLM dialogue runner")]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to duel.toml (defaults to the XDG config directory).
    #[arg(long, global = true, env = "DUEL_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a dialogue.
    Run(RunArgs),
    /// Manage presets.
    Presets {
        /// Preset subcommand.
        #[command(subcommand)]
        action: PresetCommand,
    },
    /// List the known models.
    Models,
    /// Inspect configuration.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

/// Options for a single run.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Number of rounds.
    #[arg(long, short = 'r')]
    pub rounds: Option<u32>,

    /// Model for agent A.
    #[arg(long)]
    pub model_a: Option<String>,

    /// Model for agent B.
    #[arg(long)]
    pub model_b: Option<String>,

    /// System context for agent A.
    #[arg(long)]
    pub context_a: Option<String>,

    /// System context for agent B.
    #[arg(long)]
    pub context_b: Option<String>,

    /// Apply a preset before the other flags.
    #[arg(long, short = 'p')]
    pub preset: Option<String>,

    /// Sampling temperature.
    #[arg(long, short = 't')]
    pub temperature: Option<f32>,

    /// Maximum tokens per reply.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Frequency penalty.
    #[arg(long, allow_negative_numbers = true)]
    pub frequency_penalty: Option<f32>,

    /// Presence penalty.
    #[arg(long, allow_negative_numbers = true)]
    pub presence_penalty: Option<f32>,

    /// Nucleus sampling cutoff.
    #[arg(long)]
    pub top_p: Option<f32>,

    /// Comma-separated stop sequences.
    #[arg(long)]
    pub stop: Option<String>,

    /// Start from the configuration of an exported transcript.
    #[arg(long, value_name = "FILE")]
    pub import: Option<PathBuf>,

    /// Write the transcript when the run ends (default name if no file given).
    #[arg(long, value_name = "FILE", num_args = 0..=1)]
    pub export: Option<Option<PathBuf>>,
}

impl RunArgs {
    /// Flags that override the resolved run snapshot.
    pub fn overrides(&self) -> RunOverrides {
        RunOverrides {
            model_a: self.model_a.clone(),
            model_b: self.model_b.clone(),
            context_a: self.context_a.clone(),
            context_b: self.context_b.clone(),
            rounds: self.rounds,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            top_p: self.top_p,
            stop_sequences: self.stop.clone(),
        }
    }
}

/// Preset subcommands.
#[derive(Subcommand, Debug)]
pub enum PresetCommand {
    /// List built-in and saved presets.
    List,
    /// Save the configured contexts and sampling as a preset.
    Save {
        /// Preset name (defaults to "Template N").
        name: Option<String>,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration.
    Show,
}

impl Cli {
    /// Parse-independent entry point.
    pub async fn run(self) -> Result<()> {
        let file = self.load_config()?;
        match self.command {
            Command::Run(args) => run::run(file, &args).await,
            Command::Presets { action } => presets::run(&file, &action),
            Command::Models => {
                models::run(&file);
                Ok(())
            }
            Command::Config { action } => config::run(&file, &action),
        }
    }

    fn load_config(&self) -> Result<DuelConfigFile> {
        let path = self
            .config
            .clone()
            .or_else(duel_core::config::default_config_path);
        Ok(load_config_from_path(path)?)
    }
}
