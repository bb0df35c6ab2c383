//! The `config` command.

use std::io::{self, Write};

use anyhow::Result;
use duel_core::config::{DuelConfigFile, API_KEY_ENV};

use crate::cmd::ConfigCommand;

pub fn run(file: &DuelConfigFile, action: &ConfigCommand) -> Result<()> {
    match action {
        ConfigCommand::Show => show(&mut io::stdout().lock(), file)?,
    }
    Ok(())
}

fn show(out: &mut impl Write, file: &DuelConfigFile) -> Result<()> {
    let path = file
        .config_file_path
        .as_ref()
        .map_or_else(|| "(none)".to_string(), |p| p.display().to_string());

    writeln!(out, "Source:       {}", file.source())?;
    writeln!(out, "Config file:  {path}")?;
    writeln!(out, "Endpoint:     {}", file.api.base_url)?;
    writeln!(out, "API key:      {}", mask_key(file.api.api_key.as_deref()))?;
    writeln!(out, "Timeout:      {}s", file.api.request_timeout.as_secs())?;
    writeln!(out, "Pacing:       {}ms", file.conductor.pacing.as_millis())?;
    writeln!(out, "Stop grace:   {}ms", file.conductor.stop_grace.as_millis())?;
    writeln!(out, "Run:")?;
    writeln!(out, "{}", serde_json::to_string_pretty(&file.run)?)?;
    Ok(())
}

fn mask_key(key: Option<&str>) -> String {
    match key.map(str::trim) {
        None | Some("") => format!("not set (export {API_KEY_ENV})"),
        Some(key) if key.len() <= 8 => "set".to_string(),
        Some(key) => {
            let tail = key.get(key.len() - 4..).unwrap_or("");
            format!("set (...{tail})")
        }
    }
}
