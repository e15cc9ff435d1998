//! linkdupe - hard-link deduplication of identical files
//!
//! linkdupe finds files with byte-identical content under a directory tree
//! and reclaims space by replacing redundant copies with hard links to one
//! retained copy. Files are proven identical by streaming comparison against
//! a pivot file, never by hashing.
//!
//! # Pipeline
//!
//! 1. [`scanner`]: walk the tree without following links
//! 2. [`duplicates::buckets`]: group files by exact size
//! 3. [`duplicates::partition`]: split each bucket into groups of identical files
//! 4. [`actions::link`]: replace duplicates with hard links to the group's master
//!
//! [`driver::Driver`] runs all four and returns a [`driver::RunReport`];
//! [`output`] renders it.

pub mod actions;
pub mod cli;
pub mod config;
pub mod driver;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::Context;

use cli::{Cli, OutputFormat};
use config::Config;
use driver::Driver;
use error::ExitCode;
use output::{JsonOutput, TextOutput};
use progress::Progress;

/// Run the application for parsed command-line arguments.
///
/// Returns the exit code the process should end with. A run that stops
/// because a master file could not be identified, or because Ctrl+C was
/// pressed, still returns `Ok` with the matching code after printing its
/// report.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the signal handler
/// cannot be installed, the root cannot be processed, or output fails.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    if cli.no_color {
        yansi::disable();
    }

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.apply_cli(&cli);
    log::debug!("Effective configuration: {config:?}");

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(ExitCode::Success);
    }

    let handler = signal::install_handler()?;

    let show_progress = !cli.quiet && cli.output == OutputFormat::Text && io::stderr().is_terminal();
    let mut driver =
        Driver::new(config.driver_config()).with_shutdown_flag(handler.get_flag());
    if show_progress {
        driver = driver.with_progress_callback(Arc::new(Progress::new(false)));
    }

    let report = driver
        .run(&cli.root)
        .with_context(|| format!("Cannot deduplicate {}", cli.root.display()))?;

    let mut stdout = io::stdout().lock();
    match cli.output {
        OutputFormat::Text => {
            let color = !cli.no_color && io::stdout().is_terminal();
            TextOutput::new(&report)
                .with_color(color)
                .with_dry_run(config.dry_run)
                .write_to(&mut stdout)
                .context("Failed to write report")?;
        }
        OutputFormat::Json => {
            JsonOutput::new(&report)
                .write_to(&mut stdout, true)
                .context("Failed to write JSON report")?;
        }
    }

    let code = report.exit_code();
    if code.is_failure() {
        log::debug!("Exiting with {} ({})", code.as_i32(), code.code_prefix());
    }
    Ok(code)
}
