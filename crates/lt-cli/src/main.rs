//! CLI entry point for logtail.
//!
//! Follows one log file across rotations and prints every new line to
//! stdout. Diagnostics go to stderr through `tracing`.
//!
//! # Usage
//!
//! ```bash
//! logtail [OPTIONS] <PATH>
//!
//! # Follow new lines only
//! logtail /var/log/nginx/access.log
//!
//! # Print the existing content first, poll instead of inotify
//! logtail --from-start --watch-mode poll /mnt/nfs/app.log
//!
//! # Mask numeric IDs before printing
//! logtail --gsub '/users/[0-9]+' '/users/:id' /var/log/app.log
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use lt_core::{Labels, TailConfig, WatchConfig, WatchMode, fx_hash_map};
use lt_mutate::{MutateConfig, Mutator, create_mutators};
use lt_tailer::FileTailer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Label name under which each line is handed to the mutators.
const LINE_LABEL: &str = "line";

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Follow a log file across logrotate and print each new line.
#[derive(Parser)]
#[command(name = "logtail", version, about, long_about = None)]
struct Cli {
    /// Log file to follow. Its directory must exist; the file must exist
    /// when logtail starts.
    #[arg(env = "LOGTAIL_PATH")]
    path: Utf8PathBuf,

    /// Print the file's existing content before following new lines.
    #[arg(long)]
    from_start: bool,

    /// Filesystem notification backend.
    #[arg(long, default_value_t = WatchMode::Auto, env = "LOGTAIL_WATCH_MODE")]
    watch_mode: WatchMode,

    /// Scan interval for the polling backend, in milliseconds.
    #[arg(long, default_value_t = 250, env = "LOGTAIL_POLL_INTERVAL_MS")]
    poll_interval_ms: u64,

    /// Print a final line that has no trailing newline on shutdown.
    #[arg(long)]
    flush_partial: bool,

    /// Replace every match of PATTERN in each line with REPLACEMENT.
    ///
    /// May be repeated; rules apply in order. `\1` and `$1` refer to
    /// capture groups.
    #[arg(long = "gsub", num_args = 2, value_names = ["PATTERN", "REPLACEMENT"])]
    gsub: Vec<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
/// Output goes to stderr so stdout carries only log lines.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},notify=warn,mio=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Builds a [`TailConfig`] from CLI arguments.
///
/// # Errors
///
/// Returns an error if an option value is unusable.
fn build_config(cli: &Cli) -> color_eyre::Result<TailConfig> {
    let config = TailConfig {
        read_from_start: cli.from_start,
        flush_partial_on_close: cli.flush_partial,
        watch: WatchConfig {
            mode: cli.watch_mode,
            poll_interval_ms: cli.poll_interval_ms,
        },
        ..TailConfig::default()
    };
    config.validate()?;
    Ok(config)
}

/// Compiles the `--gsub` rules.
///
/// # Errors
///
/// Returns an error if a pattern does not compile.
fn build_mutators(cli: &Cli) -> color_eyre::Result<Vec<Box<dyn Mutator>>> {
    if cli.gsub.is_empty() {
        return Ok(Vec::new());
    }
    let rules = cli
        .gsub
        .chunks_exact(2)
        .map(|pair| (LINE_LABEL, pair[0].as_str(), pair[1].as_str()));
    Ok(create_mutators(&[MutateConfig::gsub(rules)])?)
}

/// Runs every mutator over one line.
fn apply_mutators(line: String, mutators: &[Box<dyn Mutator>]) -> String {
    if mutators.is_empty() {
        return line;
    }
    let mut labels: Labels = fx_hash_map();
    labels.insert(LINE_LABEL.to_owned(), line);
    for mutator in mutators {
        mutator.apply(&mut labels);
    }
    labels.remove(LINE_LABEL).unwrap_or_default()
}

/// Resolves on Ctrl-C, or on SIGTERM on Unix.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = sigterm.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

// =============================================================================
// COMMAND IMPLEMENTATION
// =============================================================================

/// Tails `cli.path` until a signal arrives or the tailer stops.
///
/// # Errors
///
/// Returns an error if the tailer cannot start, reports a fatal error, or
/// stdout cannot be written.
async fn run_tail(cli: &Cli) -> color_eyre::Result<()> {
    let config = build_config(cli)?;
    let mutators = build_mutators(cli)?;

    let mut tailer = FileTailer::run(&cli.path, &config)?;
    info!(
        path = %tailer.watched_path(),
        backend = tailer.backend_name(),
        from_start = config.read_from_start,
        "Following log file"
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut stdout = std::io::stdout().lock();
    let result = loop {
        let (lines, errors) = tailer.receivers();
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(error) = signal {
                    warn!(error = %error, "Failed to listen for shutdown signals");
                }
                info!("Shutting down");
                break Ok(());
            }
            Some(error) = errors.recv() => {
                if error.is_fatal() {
                    break Err(error.into());
                }
                warn!(error = %error, "Tailer error");
            }
            line = lines.recv() => {
                let Some(line) = line else {
                    info!("Tailer stopped");
                    break Ok(());
                };
                let line = apply_mutators(line, &mutators);
                if let Err(error) = writeln!(stdout, "{line}") {
                    if error.kind() == std::io::ErrorKind::BrokenPipe {
                        break Ok(());
                    }
                    break Err(error.into());
                }
            }
        }
    };

    tailer.close().await;

    // Anything flushed during close.
    while let Ok(line) = tailer.lines().try_recv() {
        let line = apply_mutators(line, &mutators);
        if writeln!(stdout, "{line}").is_err() {
            break;
        }
    }

    result
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Follow the file
    run_tail(&cli).await
}
