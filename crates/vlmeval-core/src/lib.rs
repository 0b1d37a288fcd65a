//! vlmeval Core - evaluation dispatch engine for manuscript diagrams.
//!
//! Sends cropped diagram images from a segment index to one vision-language
//! model, one request at a time, and stores one durable JSON artifact per
//! segment plus a run summary.
//!
//! # Architecture
//!
//! ```text
//! Segment index → Crop bytes → Provider adapter (with retries) → Validator → Artifact
//! ```
//!
//! Runs are resumable: a segment whose artifact is already present in the run
//! directory is never sent again.
//!
//! # Usage
//!
//! ```rust,ignore
//! use vlmeval_core::{
//!     Config, ModelSelector, OutputWriter, PromptTemplate, ProviderConfig, ProviderFactory,
//!     RetryPolicy, RunManager, SegmentFilter,
//! };
//!
//! #[tokio::main]
//! async fn main() -> vlmeval_core::Result<()> {
//!     let config = Config::load()?;
//!     let provider_config = ProviderConfig::resolve(&config, ModelSelector::Qwen)?;
//!     let segments = vlmeval_core::load_segments(
//!         &config.segments_index(),
//!         &config.crops_dir(),
//!         &SegmentFilter::default(),
//!     )?;
//!     let writer = OutputWriter::create_run(
//!         &config.output_dir(),
//!         &provider_config.model_dir_name(),
//!         chrono::Local::now(),
//!     )?;
//!     let manager = RunManager::new(
//!         ProviderFactory::create(provider_config.api),
//!         provider_config,
//!         RetryPolicy::from_config(&config.run),
//!         PromptTemplate::select(None, None),
//!         writer,
//!     );
//!     let summary = manager.run(&segments, |_| {}).await?;
//!     println!("{}/{} succeeded", summary.successful, summary.total_diagrams);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod llm;
pub mod output;
pub mod prompt;
pub mod run;
pub mod segments;
pub mod types;
pub mod validate;

// Re-exports for convenient access
pub use config::{ApiKind, BackoffStrategy, Config, ModelSelector};
pub use error::{
    ConfigError, EvalError, OutputError, ProviderError, ProviderResult, Result, SegmentError,
};
pub use llm::{
    EvalRequest, ImageInput, ProviderConfig, ProviderFactory, ProviderResponse, RetryCoordinator,
    RetryPolicy, VisionProvider,
};
pub use output::{OutputWriter, SUMMARY_FILE};
pub use prompt::{PromptKind, PromptTemplate};
pub use run::RunManager;
pub use segments::{load_segments, SegmentFilter};
pub use types::{
    EvaluationRecord, FinishReason, RunStatus, RunSummary, SegmentKey, SegmentRecord,
    SegmentStatus, SummaryEntry, TokenUsage,
};
pub use validate::{Outcome, ResponseValidator};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
