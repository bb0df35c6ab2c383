//! The `models` command.

use std::io::{self, Write};

use duel_core::config::{short_model_name, DuelConfigFile, KNOWN_MODELS};

pub fn run(file: &DuelConfigFile) {
    let mut out = io::stdout().lock();
    if let Err(e) = list(&mut out, file) {
        tracing::warn!(error = %e, "Failed to write model list");
    }
}

fn list(out: &mut impl Write, file: &DuelConfigFile) -> io::Result<()> {
    for model in KNOWN_MODELS {
        let mut tags = Vec::new();
        if *model == file.run.model_a {
            tags.push("AI1");
        }
        if *model == file.run.model_b {
            tags.push("AI2");
        }
        let marker = if tags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", tags.join(", "))
        };
        writeln!(out, "{:<28} {model}{marker}", short_model_name(model))?;
    }

    // Configured models need not be on the menu
    for (label, model) in [("AI1", &file.run.model_a), ("AI2", &file.run.model_b)] {
        if !KNOWN_MODELS.contains(&model.as_str()) {
            writeln!(out, "{:<28} {model}  [{label}, custom]", short_model_name(model))?;
        }
    }
    Ok(())
}
