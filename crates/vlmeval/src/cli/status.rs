//! The `vlmeval status` command: which diagrams a run still lacks.

use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use vlmeval_core::config::expand_path;
use vlmeval_core::{load_segments, OutputWriter, SegmentFilter, SegmentRecord};

/// Arguments for the `status` command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Run directory to inspect
    pub run_dir: PathBuf,

    /// Only consider diagrams on this page
    #[arg(long)]
    pub page: Option<String>,

    /// Only consider the first N diagrams
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Segment index CSV (overrides general.segments_index)
    #[arg(long)]
    pub segments: Option<PathBuf>,

    /// Directory holding the cropped diagram images (overrides general.crops_dir)
    #[arg(long)]
    pub crops_dir: Option<PathBuf>,

    /// Print the report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

/// Completion state of a run against the expected segment list.
#[derive(Debug, Default, PartialEq, Serialize)]
pub(crate) struct RunStatusReport {
    pub expected: usize,
    /// Count of completed artifacts per outcome
    pub outcomes: BTreeMap<String, usize>,
    pub missing: Vec<String>,
}

impl RunStatusReport {
    pub fn completed(&self) -> usize {
        self.expected - self.missing.len()
    }
}

pub(crate) fn build_report(writer: &OutputWriter, segments: &[SegmentRecord]) -> RunStatusReport {
    let mut report = RunStatusReport {
        expected: segments.len(),
        ..Default::default()
    };

    for segment in segments {
        let key = segment.key();
        if !writer.artifact_exists(&key) {
            report.missing.push(key.diagram_id());
            continue;
        }
        let outcome = match writer.read_artifact(&key) {
            Ok(record) => record.outcome.to_string(),
            Err(e) => {
                tracing::warn!("{e}");
                "unreadable".to_string()
            }
        };
        *report.outcomes.entry(outcome).or_default() += 1;
    }

    report.missing.sort();
    report
}

/// Execute the status command.
pub async fn execute(args: StatusArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(path) = &args.segments {
        config.general.segments_index = path.clone();
    }
    if let Some(path) = &args.crops_dir {
        config.general.crops_dir = path.clone();
    }

    let writer = OutputWriter::resume(&expand_path(&args.run_dir))?;
    let filter = SegmentFilter {
        page: args.page.clone(),
        limit: args.limit,
    };
    let segments = load_segments(&config.segments_index(), &config.crops_dir(), &filter)?;
    let report = build_report(&writer, &segments);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if let Ok(Some(summary)) = writer.read_summary() {
        println!(
            "{} [{}] started {} ({:?})",
            summary.model, summary.prompt_id, summary.started_at, summary.status
        );
    }
    println!("  Completed: {}/{}", report.completed(), report.expected);
    for (outcome, count) in &report.outcomes {
        println!("    {outcome:<18}{count:>6}");
    }

    if report.missing.is_empty() {
        println!("  Complete!");
    } else {
        println!("  Missing ({}):", report.missing.len());
        for diagram_id in &report.missing {
            println!("    - {diagram_id}");
        }
    }

    Ok(())
}
