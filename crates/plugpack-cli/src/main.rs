use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod dispatch;
mod flows;
mod render;
mod settings;

use dispatch::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    dispatch::run_cli(Cli::parse())
}

#[cfg(test)]
mod tests;
