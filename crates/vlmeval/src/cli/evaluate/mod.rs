//! The `vlmeval evaluate` command for running an evaluation.

mod setup;
pub mod types;

pub use types::{ModelArg, PromptArg};

use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Instant;
use vlmeval_core::{
    EvalError, RunManager, RunSummary, SegmentRecord, SegmentStatus, SummaryEntry,
};

use setup::setup_run;

/// Arguments for the `evaluate` command.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Model to evaluate
    #[arg(value_enum)]
    pub model: ModelArg,

    /// Named prompt template (default: morphological)
    #[arg(short, long, value_enum)]
    pub prompt: Option<PromptArg>,

    /// Literal prompt text; takes precedence over --prompt
    #[arg(long)]
    pub custom_prompt: Option<String>,

    /// Only evaluate diagrams on this page (file name without extension)
    #[arg(long)]
    pub page: Option<String>,

    /// Stop after this many diagrams
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Seconds to wait after every request (overrides run.delay_secs)
    #[arg(long)]
    pub delay: Option<u64>,

    /// Output-token budget, reasoning included (overrides the model default)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_tokens: Option<u32>,

    /// Continue an existing run directory instead of starting a new one
    #[arg(long)]
    pub resume: Option<PathBuf>,

    /// Segment index CSV (overrides general.segments_index)
    #[arg(long)]
    pub segments: Option<PathBuf>,

    /// Directory holding the cropped diagram images (overrides general.crops_dir)
    #[arg(long)]
    pub crops_dir: Option<PathBuf>,

    /// Root under which run directories are created (overrides general.output_dir)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

/// Manual Default impl for constructing EvaluateArgs outside of clap.
impl Default for EvaluateArgs {
    fn default() -> Self {
        Self {
            model: ModelArg::Qwen,
            prompt: None,
            custom_prompt: None,
            page: None,
            limit: None,
            delay: None,
            max_tokens: None,
            resume: None,
            segments: None,
            crops_dir: None,
            output_dir: None,
        }
    }
}

/// Everything a run needs, assembled by setup_run().
pub(crate) struct RunContext {
    pub manager: RunManager,
    pub segments: Vec<SegmentRecord>,
}

/// Execute the evaluate command.
pub async fn execute(args: EvaluateArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let Some(ctx) = setup_run(&args, config_path)? else {
        tracing::warn!("No diagram segments match the selection; nothing to evaluate");
        return Ok(());
    };

    let writer = ctx.manager.writer();
    let pending = writer.pending(&ctx.segments).len();
    tracing::info!(
        "Found {} diagram(s), {} already evaluated, {} to go",
        ctx.segments.len(),
        ctx.segments.len() - pending,
        pending
    );
    tracing::info!("Run directory: {:?}", writer.run_dir());

    let progress = create_progress_bar(ctx.segments.len() as u64);
    let start_time = Instant::now();

    let result = ctx
        .manager
        .run(&ctx.segments, |entry| {
            progress.inc(1);
            progress.set_message(progress_message(entry));
        })
        .await;
    progress.finish_and_clear();

    let run_dir = ctx.manager.writer().run_dir();
    match result {
        Ok(summary) => {
            print_summary(&summary, start_time.elapsed(), run_dir);
            Ok(())
        }
        Err(e @ EvalError::Provider(_)) => {
            if let Ok(Some(summary)) = ctx.manager.writer().read_summary() {
                print_summary(&summary, start_time.elapsed(), run_dir);
            }
            Err(anyhow::Error::new(e).context(format!(
                "Run aborted. Resume it with --resume {}",
                run_dir.display()
            )))
        }
        // Refused before any request: wrong run directory or colliding segments
        Err(e) => Err(e.into()),
    }
}

fn progress_message(entry: &SummaryEntry) -> String {
    let label = match entry.status {
        SegmentStatus::Success if entry.resumed => "done earlier",
        SegmentStatus::Success => "ok",
        SegmentStatus::TokenExhaustion => "token exhaustion",
        SegmentStatus::ContentFiltered => "filtered",
        SegmentStatus::Malformed => "empty answer",
        SegmentStatus::ProviderFailure => "provider failure",
        SegmentStatus::ParseFailure => "unparseable response",
        SegmentStatus::ImageUnreadable => "unreadable crop",
        SegmentStatus::WriteFailure => "write failure",
    };
    format!("{}: {label}", entry.diagram_id)
}

/// Create a progress bar for the run.
fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    ) {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_message("starting...");
    pb
}

/// Print a final summary table.
fn print_summary(summary: &RunSummary, elapsed: std::time::Duration, run_dir: &Path) {
    let evaluated = summary.processed() - summary.skipped;
    let rate = if elapsed.as_secs_f64() > 0.0 {
        evaluated as f64 * 60.0 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Model:        {}", summary.model);
    eprintln!("    Prompt:       {}", summary.prompt_id);
    eprintln!("    Successful:   {:>8}", summary.successful);
    if summary.failed > 0 {
        eprintln!("    Failed:       {:>8}", summary.failed);
    }
    if summary.skipped > 0 {
        eprintln!("    Resumed:      {:>8}", summary.skipped);
    }
    eprintln!("  ------------------------------------");
    eprintln!(
        "    Total:        {:>8}/{}",
        summary.processed(),
        summary.total_diagrams
    );
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} diagrams/min", rate);
    eprintln!("    Output:       {}", run_dir.display());
    eprintln!("  ====================================");
}
