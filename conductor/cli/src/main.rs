//! llm-duel: run a streamed dialogue between two chat models.

use clap::Parser;

mod cmd;
mod render;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the transcript
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("duel_cli=info".parse()?)
                .add_directive("duel_core=info".parse()?),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    cmd::Cli::parse().run().await
}
