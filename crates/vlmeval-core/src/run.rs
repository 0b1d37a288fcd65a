//! Sequential evaluation of a segment list against one model.
//!
//! The run manager walks the segments in order, skips those whose artifact is
//! already in place, and turns every other segment into exactly one summary
//! entry. Segment-level failures are recorded and the run moves on; a
//! terminal provider rejection stops the run with the summary persisted.

use crate::error::{EvalError, OutputError, ProviderError};
use crate::llm::{
    EvalRequest, ImageInput, ProviderConfig, RetryCoordinator, RetryPolicy, VisionProvider,
};
use crate::output::OutputWriter;
use crate::prompt::PromptTemplate;
use crate::types::{
    iso_timestamp, EvaluationRecord, RunStatus, RunSummary, SegmentRecord, SegmentStatus,
    SummaryEntry,
};
use crate::validate::ResponseValidator;
use chrono::Local;
use std::collections::HashMap;

/// What to do after one segment.
enum Step {
    Continue(SummaryEntry),
    Abort(SummaryEntry, ProviderError),
}

/// Drives one run: one model, one prompt, one output directory.
pub struct RunManager {
    provider: Box<dyn VisionProvider>,
    config: ProviderConfig,
    coordinator: RetryCoordinator,
    validator: ResponseValidator,
    prompt: PromptTemplate,
    writer: OutputWriter,
}

impl RunManager {
    pub fn new(
        provider: Box<dyn VisionProvider>,
        config: ProviderConfig,
        policy: RetryPolicy,
        prompt: PromptTemplate,
        writer: OutputWriter,
    ) -> Self {
        Self {
            provider,
            validator: ResponseValidator::new(config.max_output_tokens),
            coordinator: RetryCoordinator::new(policy),
            config,
            prompt,
            writer,
        }
    }

    pub fn writer(&self) -> &OutputWriter {
        &self.writer
    }

    /// Evaluate `segments` in order.
    ///
    /// `on_segment` is called once per segment with its summary entry. The
    /// summary is rewritten after every segment, so an interrupted run leaves
    /// an accurate partial summary behind.
    pub async fn run(
        &self,
        segments: &[SegmentRecord],
        mut on_segment: impl FnMut(&SummaryEntry),
    ) -> Result<RunSummary, EvalError> {
        check_unique_artifacts(segments)?;

        let mut summary = RunSummary::new(
            &self.config.model_id,
            &self.prompt,
            segments.len(),
            Local::now(),
        );
        match self.writer.read_summary() {
            Ok(Some(previous)) => {
                self.check_same_run(&previous)?;
                summary.timestamp = previous.timestamp;
                summary.started_at = previous.started_at;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring unreadable previous summary: {e}"),
        }
        self.persist(&summary);

        tracing::info!(
            "Evaluating {} segment(s) with {} via {} into {:?}",
            segments.len(),
            self.config.model_id,
            self.provider.name(),
            self.writer.run_dir()
        );

        for (i, segment) in segments.iter().enumerate() {
            let step = if self.writer.artifact_exists(&segment.key()) {
                Step::Continue(self.resumed_entry(segment))
            } else {
                tracing::debug!("[{}/{}] Evaluating {}", i + 1, segments.len(), segment.key());
                self.evaluate_segment(segment).await
            };

            match step {
                Step::Continue(entry) => {
                    on_segment(&entry);
                    summary.record(entry);
                    self.persist(&summary);
                }
                Step::Abort(entry, error) => {
                    tracing::error!("Aborting run: {error}");
                    on_segment(&entry);
                    summary.record(entry);
                    summary.finish(RunStatus::Aborted);
                    self.persist(&summary);
                    return Err(error.into());
                }
            }
        }

        summary.finish(RunStatus::Complete);
        self.persist(&summary);
        Ok(summary)
    }

    /// A run directory holds one model and one prompt; resuming it with
    /// anything else would mix two runs in the same place.
    fn check_same_run(&self, previous: &RunSummary) -> Result<(), OutputError> {
        let mismatch = |field, recorded: &str, requested: &str| OutputError::RunMismatch {
            dir: self.writer.run_dir().to_path_buf(),
            field,
            recorded: recorded.to_string(),
            requested: requested.to_string(),
        };
        if previous.model != self.config.model_id {
            return Err(mismatch("model", &previous.model, &self.config.model_id));
        }
        if previous.prompt != self.prompt.text {
            return Err(mismatch("prompt", &previous.prompt, &self.prompt.text));
        }
        Ok(())
    }

    /// Summary entry for a segment completed by an earlier invocation.
    fn resumed_entry(&self, segment: &SegmentRecord) -> SummaryEntry {
        let key = segment.key();
        let artifact = OutputWriter::artifact_name(&key);
        match self.writer.read_artifact(&key) {
            Ok(record) => {
                tracing::debug!("Skipping {key}: artifact already exists");
                SummaryEntry::evaluated(record, artifact, true)
            }
            Err(e) => {
                tracing::warn!("Artifact for {key} exists but cannot be read: {e}");
                let mut entry =
                    SummaryEntry::failed(&key, SegmentStatus::WriteFailure, e.to_string(), None);
                entry.artifact = Some(artifact);
                entry.resumed = true;
                entry
            }
        }
    }

    async fn evaluate_segment(&self, segment: &SegmentRecord) -> Step {
        let key = segment.key();

        let bytes = match tokio::fs::read(&segment.crop_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Cannot read crop {:?}: {e}", segment.crop_path);
                return Step::Continue(SummaryEntry::failed(
                    &key,
                    SegmentStatus::ImageUnreadable,
                    format!("Failed to read {}: {e}", segment.crop_path.display()),
                    None,
                ));
            }
        };

        let request = EvalRequest::new(
            ImageInput::from_bytes(&bytes, &segment.crop_path),
            self.prompt.text.clone(),
        );
        let attempted = self
            .coordinator
            .call(self.provider.as_ref(), &request, &self.config)
            .await;

        let response = match attempted.result {
            Ok(response) => response,
            Err(e) if e.is_terminal() => {
                let entry = SummaryEntry::failed(
                    &key,
                    SegmentStatus::ProviderFailure,
                    e.to_string(),
                    None,
                );
                return Step::Abort(entry, e);
            }
            Err(e) => {
                let status = match &e {
                    ProviderError::Parse { .. } => SegmentStatus::ParseFailure,
                    _ => SegmentStatus::ProviderFailure,
                };
                tracing::warn!(
                    "{key} failed after {} attempt(s): {e}",
                    attempted.attempts
                );
                return Step::Continue(SummaryEntry::failed(
                    &key,
                    status,
                    e.to_string(),
                    e.raw_response().cloned(),
                ));
            }
        };

        let outcome = self.validator.classify(&response);
        let finish_reason = self.validator.recorded_finish_reason(&response, outcome);
        if outcome.is_success() {
            tracing::info!("{key}: {} chars in {}ms", response.text.len(), response.latency_ms);
        } else {
            tracing::warn!(
                "{key}: {outcome} (finish_reason={}, usage={:?})",
                response.native_finish_reason.as_deref().unwrap_or("none"),
                response.usage
            );
        }

        let record = EvaluationRecord {
            segment: segment.clone(),
            prompt: self.prompt.text.clone(),
            evaluation: response.text,
            finish_reason,
            native_finish_reason: response.native_finish_reason,
            outcome,
            model: response.model,
            timestamp: iso_timestamp(Local::now()),
            usage: response.usage,
            latency_ms: response.latency_ms,
            attempts: attempted.attempts,
            raw_response: (!outcome.is_success()).then_some(response.raw),
        };

        match self.writer.write_artifact(&record) {
            Ok(artifact) => Step::Continue(SummaryEntry::evaluated(record, artifact, false)),
            Err(e) => {
                tracing::error!("Failed to persist {key}: {e}");
                Step::Continue(SummaryEntry::failed(
                    &key,
                    SegmentStatus::WriteFailure,
                    e.to_string(),
                    None,
                ))
            }
        }
    }

    fn persist(&self, summary: &RunSummary) {
        if let Err(e) = self.writer.write_summary(summary) {
            tracing::warn!("Failed to write run summary: {e}");
        }
    }
}

/// Fails when two distinct segments share an artifact name, since the
/// second would be taken as already evaluated and never sent.
fn check_unique_artifacts(segments: &[SegmentRecord]) -> Result<(), OutputError> {
    let mut seen: HashMap<String, &SegmentRecord> = HashMap::with_capacity(segments.len());
    for segment in segments {
        let artifact = OutputWriter::artifact_name(&segment.key());
        if let Some(first) = seen.get(&artifact) {
            if first.key() != segment.key() {
                return Err(OutputError::ArtifactCollision {
                    artifact,
                    first: describe(first),
                    second: describe(segment),
                });
            }
            continue;
        }
        seen.insert(artifact, segment);
    }
    Ok(())
}

fn describe(segment: &SegmentRecord) -> String {
    format!(
        "({}, {}, {})",
        segment.manuscript_id, segment.page_filename, segment.segment_index
    )
}
