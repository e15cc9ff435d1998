//! Command-line interface definitions for linkdupe.
//!
//! This module defines all CLI arguments and options using the clap derive API.
//! Options left unset on the command line fall back to the configuration file
//! and `LINKDUPE_*` environment variables (see [`crate::config`]).
//!
//! # Example
//!
//! ```bash
//! # Replace duplicate ISO images below ~/Downloads with hard links
//! linkdupe ~/Downloads .iso
//!
//! # Show what would change, as JSON
//! linkdupe ~/Downloads --dry-run --output json
//!
//! # Compare in larger chunks, keep fewer files open at once
//! linkdupe /srv/media --chunk-size 64KiB --batch-size 64
//!
//! # Verbose mode for debugging
//! linkdupe -v ~/Downloads
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::actions::LinkStrategy;

/// Replace identical files with hard links to a single copy.
///
/// linkdupe walks a directory tree, groups files by size, compares
/// same-sized files byte by byte and replaces each duplicate with a hard
/// link to the first file of its group.
#[derive(Debug, Parser)]
#[command(name = "linkdupe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Root directory to deduplicate
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Only consider files with this extension (e.g. .iso), case-insensitive
    #[arg(value_name = "EXTENSION")]
    pub extension: Option<String>,

    /// Minimum file size to consider (e.g., 16KiB, 1MB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum number of files compared (and held open) at once
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Bytes read from each file per comparison step
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub chunk_size: Option<u64>,

    /// How duplicates are replaced by links
    #[arg(long, value_enum, value_name = "STRATEGY")]
    pub strategy: Option<LinkStrategy>,

    /// Report what would be linked without touching any file
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Read settings from this TOML file in addition to the user config
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,

    /// Report errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,
}

/// Output format for run results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report
    #[default]
    Text,
    /// JSON output for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Numbers without suffix are bytes. Suffixes are case-insensitive; decimal
/// (`KB`, `MB`) and binary (`KiB`, `MiB`) units are both accepted.
///
/// # Examples
///
/// ```
/// use linkdupe::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("16KiB").unwrap(), 16 * 1024);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number
/// or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    s.parse::<bytesize::ByteSize>()
        .map(|size| size.as_u64())
        .map_err(|e| format!("Invalid size '{s}': {e}"))
}
