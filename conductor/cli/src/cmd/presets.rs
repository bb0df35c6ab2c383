//! The `presets` command.

use std::io::{self, Write};

use anyhow::Result;
use duel_core::config::DuelConfigFile;
use duel_core::presets::{builtin_presets, Preset, PresetStore};

use crate::cmd::PresetCommand;

pub fn run(file: &DuelConfigFile, action: &PresetCommand) -> Result<()> {
    let mut store = PresetStore::open_default()?;
    let mut out = io::stdout().lock();
    match action {
        PresetCommand::List => list(&mut out, &store)?,
        PresetCommand::Save { name } => {
            let preset = store.save(name.as_deref(), &file.run)?;
            writeln!(out, "Saved preset '{}'", preset.name)?;
            if let Some(path) = store.path() {
                writeln!(out, "  -> {}", path.display())?;
            }
        }
    }
    Ok(())
}

fn list(out: &mut impl Write, store: &PresetStore) -> io::Result<()> {
    writeln!(out, "Built-in:")?;
    for preset in builtin_presets() {
        write_preset(out, &preset)?;
    }
    writeln!(out, "Saved:")?;
    if store.saved().is_empty() {
        writeln!(out, "  (none)")?;
    }
    for preset in store.saved() {
        write_preset(out, preset)?;
    }
    Ok(())
}

fn write_preset(out: &mut impl Write, preset: &Preset) -> io::Result<()> {
    writeln!(
        out,
        "  {:<20} temperature {:.1}, max tokens {}",
        preset.name, preset.config.temperature, preset.config.max_tokens
    )
}
