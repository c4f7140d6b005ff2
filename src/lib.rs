use anyhow::Context;
use clap::Parser;

pub mod cli;
pub mod commands;
pub mod error;
pub mod pipeline;

pub type Result<T> = anyhow::Result<T>;

/// Entry point used by the binary crate. Returns the process exit code.
pub async fn run() -> Result<i32> {
    init_tracing();

    let args = cli::Args::parse();
    commands::execute(&args)
        .await
        .context("failed to execute command")
}

fn init_tracing() {
    use std::sync::Once;
    use tracing_subscriber::{fmt, EnvFilter};

    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    });
}
