//! Terminal display surface.
//!
//! Streams each turn to the writer as it arrives and prints a metrics
//! summary when the run finishes. Logging goes to stderr, so the writer
//! (normally stdout) only ever carries the transcript.

use std::io::{self, Write};

use duel_core::config::short_model_name;
use duel_core::messages::{ConductorMessage, DisplayMessage, RunState};
use duel_core::metrics::Metrics;
use duel_core::turn::TurnStatus;

/// Renders conductor messages as plain text.
pub struct Renderer<W: Write> {
    out: W,
    /// Bytes of the live turn already written.
    printed: usize,
    metrics: Option<Metrics>,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: 0,
            metrics: None,
        }
    }

    /// Consume the renderer and return the writer.
    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Render one message.
    pub fn handle(&mut self, msg: &ConductorMessage) -> io::Result<()> {
        match msg {
            ConductorMessage::State { state } => {
                if *state == RunState::Stopping {
                    writeln!(self.out)?;
                    writeln!(self.out, "-- stopping --")?;
                }
            }
            ConductorMessage::TurnStarted {
                round,
                speaker,
                model,
                ..
            } => {
                self.printed = 0;
                write!(
                    self.out,
                    "[round {round}] {speaker} ({}): ",
                    short_model_name(model)
                )?;
            }
            ConductorMessage::Progress {
                partial_content, ..
            } => {
                if let Some(fresh) = partial_content.get(self.printed..) {
                    write!(self.out, "{fresh}")?;
                    self.printed = partial_content.len();
                }
            }
            ConductorMessage::TurnComplete(message) => self.turn_complete(message)?,
            ConductorMessage::Metrics(metrics) => self.metrics = Some(metrics.clone()),
            ConductorMessage::RunFinished { state, turns, .. } => {
                self.printed = 0;
                writeln!(self.out)?;
                writeln!(self.out, "Run {}: {turns} turns", state.description())?;
                if let Some(ref metrics) = self.metrics {
                    write_summary(&mut self.out, metrics)?;
                }
            }
        }
        self.out.flush()
    }

    fn turn_complete(&mut self, message: &DisplayMessage) -> io::Result<()> {
        if message.status == TurnStatus::Completed {
            // Progress updates may have been dropped; finish from the final text
            match message.content.get(self.printed..) {
                Some(rest) => write!(self.out, "{rest}")?,
                None => write!(self.out, "\n{}", message.content)?,
            }
        } else {
            // Failed turns stream nothing (or a fragment); show the placeholder instead
            if self.printed > 0 {
                writeln!(self.out)?;
            }
            write!(self.out, "{}", message.content)?;
        }
        writeln!(
            self.out,
            "\n    ({:.2}s, {} words)",
            message.elapsed_seconds, message.word_count
        )?;
        self.printed = 0;
        Ok(())
    }
}

/// Write the metrics block.
pub fn write_summary(out: &mut impl Write, metrics: &Metrics) -> io::Result<()> {
    writeln!(out, "Total tokens:      {:.1}", metrics.total_tokens)?;
    writeln!(out, "Avg response time: {:.2}s", metrics.average_response_time)?;
    writeln!(out, "Estimated cost:    ${:.4}", metrics.cost_estimate)?;
    writeln!(
        out,
        "Errors:            {} (api {}, timeout {}, other {})",
        metrics.total_errors(),
        metrics.error_counts.api,
        metrics.error_counts.timeout,
        metrics.error_counts.other
    )
}
