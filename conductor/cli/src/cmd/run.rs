//! The `run` command: resolve a snapshot, drive a dialogue, render it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use duel_core::config::{DuelConfigFile, RunConfig};
use duel_core::export::{default_export_path, import_configuration_file, ExportDocument};
use duel_core::presets::PresetStore;
use duel_core::{Conductor, OpenRouterBackend};
use tokio::sync::mpsc;

use crate::cmd::RunArgs;
use crate::render::Renderer;

/// Resolve the snapshot for a run.
///
/// Order: config file and environment, then `--import`, then `--preset`,
/// then the individual flags.
pub fn resolve_run_config(
    file: &DuelConfigFile,
    args: &RunArgs,
    presets: &PresetStore,
) -> Result<RunConfig> {
    let mut run = match args.import {
        Some(ref path) => import_configuration_file(path)
            .with_context(|| format!("importing {}", path.display()))?,
        None => file.run.clone(),
    };

    if let Some(ref name) = args.preset {
        let preset = presets
            .find(name)
            .with_context(|| format!("no preset named '{name}'"))?;
        run = preset.apply(&run);
    }

    args.overrides().apply_to_run(&mut run);
    Ok(run)
}

/// Run one dialogue to completion or Ctrl-C.
pub async fn run(file: DuelConfigFile, args: &RunArgs) -> Result<()> {
    let presets = PresetStore::open_default()?;
    let run_config = resolve_run_config(&file, args, &presets)?;

    let backend = OpenRouterBackend::new(file.api.clone())?;
    let (tx, mut rx) = mpsc::channel(256);
    let mut conductor = Conductor::new(backend, file.conductor.clone(), tx);

    let renderer = tokio::spawn(async move {
        let mut renderer = Renderer::new(std::io::stdout());
        while let Some(msg) = rx.recv().await {
            if let Err(e) = renderer.handle(&msg) {
                tracing::warn!(error = %e, "Failed to render message");
            }
        }
    });

    let stop = conductor.stop_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received");
            stop.stop().await;
        }
    });

    let outcome = conductor.start(run_config.clone()).await;
    interrupt.abort();

    let export = match (&outcome, &args.export) {
        (Ok(_), Some(target)) => {
            let doc = ExportDocument::new(conductor.messages(), conductor.metrics(), &run_config);
            Some((doc, export_path(target.clone())))
        }
        _ => None,
    };

    // Closing every sender lets the renderer drain and exit
    drop(conductor);
    let _ = interrupt.await;
    renderer.await.context("renderer task failed")?;

    let outcome = outcome?;
    tracing::debug!(run_id = %outcome.run_id, state = %outcome.state, "Run returned");

    if let Some((doc, path)) = export {
        doc.write_to(&path)?;
        println!("Transcript written to {}", path.display());
    }
    Ok(())
}

fn export_path(target: Option<PathBuf>) -> PathBuf {
    target.unwrap_or_else(default_export_path)
}
