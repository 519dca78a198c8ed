// SPDX-License-Identifier: Apache-2.0

//! Logging initialization for the OneApp CLI.
//!
//! Uses `tracing` with `tracing-subscriber` for structured logging to stderr.
//! Log level can be controlled via the `RUST_LOG` environment variable.
//!
//! # Examples
//!
//! ```bash
//! # Debug output for troubleshooting
//! RUST_LOG=oneapp_core=debug oneapp app list
//!
//! # Include HTTP client internals
//! RUST_LOG=oneapp_core=trace,reqwest=debug oneapp app list
//! ```

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::OutputFormat;

/// Initialize the logging subsystem.
///
/// `RUST_LOG` wins when set. Otherwise `-v` enables info-level events from
/// OneApp; structured output formats stay at warnings so stdout remains
/// machine-readable and stderr quiet.
pub fn init_logging(format: OutputFormat, verbose: bool) {
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let structured = matches!(format, OutputFormat::Json | OutputFormat::Yaml);
    let default_filter = if verbose && !structured {
        "oneapp=info,oneapp_core=info,octocrab=error,reqwest=error"
    } else {
        "oneapp=warn,oneapp_core=warn,octocrab=error,reqwest=error"
    };
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .expect("valid default filter directives");

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
