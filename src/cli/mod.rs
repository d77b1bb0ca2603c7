//! CLI interface using clap
//!
//! Provides the command-line interface for doctype

mod commands;

pub use commands::*;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// doctype - Keep documentation in sync with TypeScript signatures
#[derive(Parser, Debug)]
#[command(name = "doctype")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the project (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    pub path: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize doctype and anchor every exported symbol
    Init(InitArgs),

    /// Check documented symbols for signature drift
    Check(CheckArgs),

    /// Update documentation for drifted symbols
    Fix(FixArgs),

    /// Replace one exact snippet in a documentation file
    Patch(PatchArgs),

    /// Show the exported signatures of a source file
    Analyze(AnalyzeArgs),

    /// Watch for changes and check automatically
    Watch(WatchArgs),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Force re-initialization (rewrites the config, keeps existing entries)
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Only print the summary line
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for fix command
#[derive(Parser, Debug)]
pub struct FixArgs {
    /// Only fix this entry
    #[arg(long)]
    pub id: Option<String>,

    /// Replacement text for the anchored region
    #[arg(short, long, conflicts_with = "content_file")]
    pub content: Option<String>,

    /// Read the replacement text from a file
    #[arg(long)]
    pub content_file: Option<PathBuf>,

    /// Show what would change without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for patch command
#[derive(Parser, Debug)]
pub struct PatchArgs {
    /// Documentation file to patch
    pub doc: PathBuf,

    /// Exact text to replace (must occur once)
    #[arg(long)]
    pub old: String,

    /// Replacement text
    #[arg(long)]
    pub new: String,

    /// Show the diff without writing
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for analyze command
#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Source file to analyze
    pub file: PathBuf,
}

/// Arguments for watch command
#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Debounce interval in milliseconds
    #[arg(short, long, default_value = "1000")]
    pub debounce: u64,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
