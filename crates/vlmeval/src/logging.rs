//! Logging initialization and configuration.
//!
//! Uses the `tracing` ecosystem for structured logging with support for
//! both human-readable and JSON output formats.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging subsystem.
///
/// # Arguments
///
/// * `verbose` - If true, enables DEBUG level logging; otherwise INFO level.
/// * `json_format` - If true, outputs structured JSON logs; otherwise pretty-printed.
///
/// # Notes
///
/// - Log output goes to stderr (stdout is reserved for data output)
/// - The RUST_LOG environment variable can override the log level
pub fn init(verbose: bool, json_format: bool) {
    // RUST_LOG wins over the flag when set
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json_format {
        // One JSON object per line, for log shippers
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        // Human-readable; stderr keeps stdout free for `status --json`
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize logging from the `[logging]` config section.
///
/// CLI flags only ever raise verbosity or switch to JSON; they never turn
/// config settings off.
pub fn init_from_config(
    config: &vlmeval_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) {
    let (verbose, json_format) = resolve(config, verbose_override, json_logs_override);
    init(verbose, json_format);
}

fn resolve(config: &vlmeval_core::Config, verbose: bool, json_logs: bool) -> (bool, bool) {
    // Anything below info in the config counts as verbose
    let verbose = verbose || matches!(config.logging.level.as_str(), "debug" | "trace");
    let json_format = json_logs || config.logging.format == "json";
    (verbose, json_format)
}
