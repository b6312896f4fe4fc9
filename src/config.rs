//! CLI configuration.
//!
//! The `nitf-io` binary exposes three subcommands:
//! - `dump`: print a file's metadata (header fields, security groups,
//!   per-section TREs)
//! - `extract`: read a sub-window of an image segment to a raw file
//! - `check`: parse a file and report whether its structure holds up
//!
//! All subcommands accept `--plugin-path` (or `NITF_PLUGIN_PATH`) naming
//! the TRE handler directory; without it only the raw-bytes fallback is
//! available.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Environment variable naming the TRE plugin directory.
pub const PLUGIN_PATH_ENV: &str = "NITF_PLUGIN_PATH";

// =============================================================================
// CLI
// =============================================================================

/// Read, inspect, and extract from NITF 2.0/2.1 files.
#[derive(Parser, Debug, Clone)]
#[command(name = "nitf-io")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Consume the parsed arguments into the selected command.
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print a file's metadata: header fields, subheaders, and TREs.
    Dump(DumpConfig),

    /// Read a sub-window of an image segment into a raw file.
    Extract(ExtractConfig),

    /// Parse a file and report its structure.
    Check(CheckConfig),
}

// =============================================================================
// Dump
// =============================================================================

#[derive(Parser, Debug, Clone)]
pub struct DumpConfig {
    /// The file to dump.
    pub file: PathBuf,

    /// Directory of TRE handler descriptors.
    #[arg(long, env = PLUGIN_PATH_ENV)]
    pub plugin_path: Option<PathBuf>,

    /// Skip TRE contents (tags and sizes are still listed).
    #[arg(long, default_value_t = false)]
    pub no_tres: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Extract
// =============================================================================

#[derive(Parser, Debug, Clone)]
pub struct ExtractConfig {
    /// The file to read.
    pub file: PathBuf,

    /// Output path for the raw band data.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Image segment ordinal.
    #[arg(long, default_value_t = 0)]
    pub image: usize,

    /// First row of the sub-window.
    #[arg(long, default_value_t = 0)]
    pub start_row: u32,

    /// First column of the sub-window.
    #[arg(long, default_value_t = 0)]
    pub start_col: u32,

    /// Rows to read (defaults to the rest of the image).
    #[arg(long)]
    pub num_rows: Option<u32>,

    /// Columns to read (defaults to the rest of the image).
    #[arg(long)]
    pub num_cols: Option<u32>,

    /// Bands to read, comma separated (defaults to every band).
    #[arg(long, value_delimiter = ',')]
    pub bands: Option<Vec<u32>>,

    /// Row decimation factor.
    #[arg(long, default_value_t = 1)]
    pub row_skip: u32,

    /// Column decimation factor.
    #[arg(long, default_value_t = 1)]
    pub col_skip: u32,

    /// Reduce each skip window to its maximum instead of its top-left
    /// pixel.
    #[arg(long, default_value_t = false)]
    pub max: bool,

    /// Directory of TRE handler descriptors.
    #[arg(long, env = PLUGIN_PATH_ENV)]
    pub plugin_path: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ExtractConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.row_skip == 0 || self.col_skip == 0 {
            return Err("row_skip and col_skip must be at least 1".to_string());
        }
        if let Some(ref bands) = self.bands {
            if bands.is_empty() {
                return Err("--bands must name at least one band".to_string());
            }
        }
        Ok(())
    }
}

// =============================================================================
// Check
// =============================================================================

#[derive(Parser, Debug, Clone)]
pub struct CheckConfig {
    /// The file to check.
    pub file: PathBuf,

    /// Directory of TRE handler descriptors.
    #[arg(long, env = PLUGIN_PATH_ENV)]
    pub plugin_path: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
