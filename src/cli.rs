mod help_text;

use crate::change::ChangeFilter;
use crate::hashing::HashAlgorithm;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Per-directory integrity manifests chained from leaves to root
#[derive(Parser, Debug)]
#[command(
    name = "dirsum",
    version,
    about,
    long_about = help_text::ROOT_LONG_ABOUT
)]
pub struct Cli {
    /// Change to directory before doing anything
    #[arg(short = 'C', global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Set the log level explicitly (overrides -v)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan the tree and rewrite manifests that are out of date
    #[command(long_about = help_text::UPDATE_LONG_ABOUT)]
    Update {
        /// Directory to update
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        scan: ScanArgs,

        /// Recompute every digest with the default algorithm and rewrite every manifest
        #[arg(long)]
        rebuild: bool,
    },

    /// Show what changed since manifests were last written
    #[command(long_about = help_text::STATUS_LONG_ABOUT)]
    Status {
        /// Directory to check
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        scan: ScanArgs,

        /// Which entries to list
        #[arg(long, value_name = "WHICH", value_parser = parse_filter)]
        show: Option<ChangeFilter>,
    },

    /// Hash every file and check the whole tree, exit with success if nothing differs
    #[command(long_about = help_text::VERIFY_LONG_ABOUT)]
    Verify {
        /// Directory to verify
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Show a live progress line on stderr
        #[arg(long)]
        progress: bool,
    },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct ScanArgs {
    /// Algorithm for new files and for rebuilt manifests
    #[arg(long, value_name = "ALGORITHM", default_value = "sha256", value_parser = parse_algorithm)]
    pub default_hash: HashAlgorithm,

    /// Hash unchanged files too (detects silent corruption)
    #[arg(long)]
    pub digest_all: bool,

    /// Show a live progress line on stderr
    #[arg(long)]
    pub progress: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn parse_algorithm(s: &str) -> Result<HashAlgorithm, String> {
    s.parse().map_err(|e: crate::hashing::HashError| {
        let known: Vec<&str> = HashAlgorithm::ALL.iter().map(|a| a.as_str()).collect();
        format!("{e} (supported: {})", known.join(", "))
    })
}

fn parse_filter(s: &str) -> Result<ChangeFilter, String> {
    s.parse().map_err(|e: crate::change::UnknownFilter| e.to_string())
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
