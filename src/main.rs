//! Command line entry point. Run with `cargo run -- migrate --help`.

use better_marketing::cli::{run, Cli};
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("better_marketing=info")),
        )
        .init();
    run(Cli::parse()).await
}
