// SPDX-License-Identifier: Apache-2.0

//! OneApp - publish apps to a GitHub-backed app store.
//!
//! Signs developers in with GitHub and manages app metadata, packages and
//! releases in their storage repository.

mod cli;
mod commands;
mod errors;
mod logging;
mod output;
mod prompt;

use anyhow::{Context, Result};
use clap::Parser;
use oneapp_core::config;
use tracing::debug;

use crate::cli::{Cli, OutputContext};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.output, cli.verbose);

    let output_ctx = OutputContext::from_cli(cli.output, cli.quiet, cli.verbose);

    let mut config = config::load_config().context("Failed to load configuration")?;
    debug!("Configuration loaded successfully");

    if let Some(repo) = &cli.repo {
        config.github.repository = Some(repo.clone());
        debug!("Overriding storage repository to: {repo}");
    }

    if let Err(e) = commands::run(cli.command, output_ctx, &config).await {
        eprintln!("Error: {}", errors::format_error(&e));
        std::process::exit(1);
    }
    Ok(())
}
