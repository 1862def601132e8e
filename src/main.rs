mod aggregate;
mod change;
mod cli;
mod digest;
mod dir_list;
mod entry;
mod hashing;
mod listing;
mod manifest;
mod progress;
mod scan;
mod stats;
mod visit;
mod write;

use change::{Change, ChangeFilter};
use cli::{Cli, Command, LogLevel, ScanArgs};
use listing::Listing;
use progress::Progress;
use scan::{Scan, ScanConfig};
use stats::{ChangeSet, Stats};
use std::fmt as stdfmt;
use std::io::{IsTerminal, stderr};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Event, Level, Subscriber, error, info};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

struct DirsumExitCode;

impl DirsumExitCode {
    /// Exit code used when status or verify found changes or errors.
    fn unclean() -> ExitCode {
        ExitCode::from(1)
    }

    /// Exit code used for other errors (I/O errors, invalid arguments, etc.).
    fn any_error() -> ExitCode {
        ExitCode::from(255)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_level);

    if let Some(directory) = cli.directory
        && let Err(e) = std::env::set_current_dir(&directory)
    {
        error!(
            "Failed to change directory to {}: {}",
            directory.display(),
            e
        );
        return DirsumExitCode::any_error();
    }

    let result: anyhow::Result<ExitCode> = match cli.command {
        Command::Update {
            path,
            scan,
            rebuild,
        } => handle_update(path, scan_config(scan, rebuild)),
        Command::Status { path, scan, show } => {
            handle_status(path, scan_config(scan, false), show)
        }
        Command::Verify { path, progress } => handle_verify(path, progress),
    };

    match result {
        Ok(exit_code) => exit_code,
        Err(err) => {
            error!("{err}");
            DirsumExitCode::any_error()
        }
    }
}

fn scan_config(args: ScanArgs, rebuild: bool) -> ScanConfig {
    ScanConfig {
        default_hash: args.default_hash,
        rebuild,
        digest_all: args.digest_all,
        live_updates: args.progress,
    }
}

/// Scan, digest and aggregate. The progress line, if any, keeps running so
/// that it can also cover the write phase.
fn scan_tree(path: PathBuf, config: ScanConfig) -> anyhow::Result<(Scan, Option<Progress>)> {
    let mut scan = Scan::new(path, config);
    let progress = scan
        .take_progress_signal()
        .map(|signal| Progress::start(scan.stats(), signal));

    scan.scan()?;
    scan.digest();
    scan.calculate_change_stats();

    Ok((scan, progress))
}

fn handle_update(path: PathBuf, config: ScanConfig) -> anyhow::Result<ExitCode> {
    let (mut scan, progress) = scan_tree(path, config)?;
    let root_digest = scan.write();

    if let Some(progress) = progress {
        progress.finish();
    }

    let stats = scan.stats();
    info!(
        "Scanned {} directories, {} files and {} special entries",
        Stats::load(&stats.found_dirs),
        Stats::load(&stats.found_files),
        Stats::load(&stats.found_special)
    );
    info!("Changes: {}", summarize(&stats.total));
    info!("Wrote {} manifest(s)", Stats::load(&stats.write_done));
    if let Some(digest) = root_digest
        && !digest.digest.is_empty()
    {
        info!("Root manifest {}: {}", digest.algorithm, digest.digest);
    }

    for message in scan.write_errors() {
        error!("{message}");
    }

    let errors = stats.error_count();
    if errors > 0 {
        error!("Update finished with {} error(s)", errors);
        return Ok(DirsumExitCode::any_error());
    }

    Ok(ExitCode::SUCCESS)
}

fn handle_status(
    path: PathBuf,
    config: ScanConfig,
    show: Option<ChangeFilter>,
) -> anyhow::Result<ExitCode> {
    let (scan, progress) = scan_tree(path.clone(), config)?;
    if let Some(progress) = progress {
        progress.finish();
    }

    let mut listing = Listing::new(&path, show);
    scan.iterate(&mut listing);
    listing.print();

    let stats = scan.stats();
    if !stats.has_changes() && stats.error_count() == 0 {
        return Ok(ExitCode::SUCCESS);
    }

    info!("Changes: {}", summarize(&stats.total));
    info!("Run 'dirsum update' to record these changes.");

    Ok(DirsumExitCode::unclean())
}

fn handle_verify(path: PathBuf, progress: bool) -> anyhow::Result<ExitCode> {
    let config = ScanConfig {
        digest_all: true,
        live_updates: progress,
        ..ScanConfig::default()
    };

    let (scan, progress) = scan_tree(path.clone(), config)?;
    if let Some(progress) = progress {
        progress.finish();
    }

    let stats = scan.stats();
    let errors = stats.error_count();

    if !stats.has_changes() && errors == 0 {
        info!("Verification successful: No changes or corruption detected");
        return Ok(ExitCode::SUCCESS);
    }

    let mut listing = Listing::new(&path, None);
    scan.iterate(&mut listing);
    listing.print();

    error!(
        "Verification failed: {} change(s) and {} error(s) detected",
        stats.total.interesting(),
        errors
    );
    Ok(DirsumExitCode::unclean())
}

fn summarize(set: &ChangeSet) -> String {
    Change::ALL
        .into_iter()
        .filter(|c| *c != Change::NoChange)
        .map(|c| format!("{} {}", set.count(c), c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn init_tracing(verbose: u8, log_level: Option<LogLevel>) {
    let stderr_is_terminal = stderr().is_terminal();
    let formatter = EmojiFormatter { stderr_is_terminal };

    // Explicit command line settings win over RUST_LOG.
    let explicit = match (log_level, verbose) {
        (Some(level), _) => Some(level.as_str()),
        (None, 0) => None,
        (None, 1) => Some("info"),
        (None, _) => Some("debug"),
    };

    let filter = match explicit {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let fmt_layer = tracing_fmt::layer()
        .event_format(formatter)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

struct EmojiFormatter {
    stderr_is_terminal: bool,
}

impl<S, N> FormatEvent<S, N> for EmojiFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        if self.stderr_is_terminal {
            match *event.metadata().level() {
                Level::DEBUG => write!(writer, "🔍 ")?,
                Level::INFO => write!(writer, "ℹ️ ")?,
                Level::WARN => write!(writer, "⚠️  ")?,
                Level::ERROR => write!(writer, "❌️ ")?,
                _ => {}
            }
        } else {
            match *event.metadata().level() {
                Level::DEBUG => writer.write_str("DEBUG: ")?,
                Level::INFO => writer.write_str("INFO: ")?,
                Level::WARN => writer.write_str("WARN: ")?,
                Level::ERROR => writer.write_str("ERROR: ")?,
                _ => {}
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
