//! vlmeval CLI - evaluate manuscript diagram crops with vision-language models.
//!
//! Sends every diagram crop listed in the segment index to one model, one
//! request at a time, and writes one JSON artifact per diagram plus a run
//! summary. Interrupted runs pick up where they stopped.
//!
//! # Usage
//!
//! ```bash
//! # Evaluate every diagram with Qwen using the default prompt
//! vlmeval evaluate qwen
//!
//! # One page, custom prompt, larger output budget
//! vlmeval evaluate gemini --page seq15 --custom-prompt "Count the cuts." --max-tokens 16384
//!
//! # Continue an interrupted run
//! vlmeval evaluate qwen --resume output/qwen2_5_vl_72b_instruct/eval_20251231_155722
//!
//! # Which diagrams are still missing from a run?
//! vlmeval status output/qwen2_5_vl_72b_instruct/eval_20251231_155722
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// vlmeval - evaluate manuscript diagram crops with vision-language models.
#[derive(Parser, Debug)]
#[command(name = "vlmeval")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "VLMEVAL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Send diagram crops to a model and store the answers
    Evaluate(cli::evaluate::EvaluateArgs),

    /// List the diagrams a run has not evaluated yet
    Status(cli::status::StatusArgs),

    /// List the built-in prompt templates
    Prompts(cli::prompts::PromptsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    // Initialize logging from config, with CLI verbose override.
    // Note: logging isn't initialized yet, so use eprintln for config warnings.
    let config = match cli::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `vlmeval config path`."
            );
            vlmeval_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("vlmeval v{}", vlmeval_core::VERSION);

    // Dispatch to the appropriate command handler
    match cli.command {
        Commands::Evaluate(args) => cli::evaluate::execute(args, config_path).await,
        Commands::Status(args) => cli::status::execute(args, config_path).await,
        Commands::Prompts(args) => cli::prompts::execute(args).await,
        Commands::Config(args) => cli::config::execute(args, config_path).await,
    }
}
