//! Core data types for the evaluation dispatch engine.
//!
//! These types describe what goes into a run (segment records) and what comes
//! out of it (per-segment evaluation records and the run summary).

use crate::prompt::PromptTemplate;
use crate::validate::Outcome;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One cropped region of a manuscript page, as listed in the segment index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub manuscript_id: String,

    /// Page image file name, e.g. "D._Logic__hou02614c00458__seq15.jpg"
    pub page_filename: String,

    /// Index of the segment on its page (unique within a page)
    pub segment_index: u32,

    /// Path to the cropped segment image
    pub crop_path: PathBuf,

    // === Bounding box on the page canvas ===
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,

    /// IIIF canvas the page belongs to
    pub canvas_uri: String,

    // === Category labels ===
    #[serde(default)]
    pub category_level_1: String,
    #[serde(default)]
    pub category_level_2: String,
}

impl SegmentRecord {
    /// The identity key of this segment.
    pub fn key(&self) -> SegmentKey {
        SegmentKey {
            manuscript_id: self.manuscript_id.clone(),
            page_filename: self.page_filename.clone(),
            segment_index: self.segment_index,
        }
    }

    /// Page file name without its `.jpg` extension.
    pub fn page_stem(&self) -> &str {
        page_stem(&self.page_filename)
    }
}

/// Identity of a segment: (manuscript, page, index).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentKey {
    pub manuscript_id: String,
    pub page_filename: String,
    pub segment_index: u32,
}

impl SegmentKey {
    /// Stable identifier used for artifact file names,
    /// `{manuscript_id}_{page_stem}_{segment_index}`.
    pub fn diagram_id(&self) -> String {
        let id = format!(
            "{}_{}_{}",
            self.manuscript_id,
            page_stem(&self.page_filename),
            self.segment_index
        );
        id.replace(['/', '\\'], "_")
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.diagram_id())
    }
}

/// Strips the page image extension only. Page names carry dots of their
/// own (`D._Logic__...`), so `Path::file_stem` would cut them short.
pub fn page_stem(page_filename: &str) -> &str {
    page_filename
        .strip_suffix(".jpg")
        .unwrap_or(page_filename)
}

/// Why a provider stopped generating, mapped onto a small closed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// Natural end of the completion
    Stop,
    /// Output-token budget exhausted
    Length,
    /// Blocked by a safety or content filter
    Filtered,
    /// Provider-side failure reported in-band
    Error,
}

impl FinishReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::Filtered => "filtered",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token accounting as reported by the provider.
///
/// `reasoning_tokens` are output tokens spent on hidden chain-of-thought;
/// `content_tokens` are the visible part of the completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,
}

impl TokenUsage {
    /// Build usage from completion and reasoning counts, deriving the visible
    /// share when both are known.
    pub fn from_counts(
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
        reasoning_tokens: Option<u32>,
        total_tokens: Option<u32>,
    ) -> Self {
        let content_tokens = match (completion_tokens, reasoning_tokens) {
            (Some(completion), Some(reasoning)) => Some(completion.saturating_sub(reasoning)),
            (Some(completion), None) => Some(completion),
            _ => None,
        };
        Self {
            prompt_tokens,
            completion_tokens,
            reasoning_tokens,
            content_tokens,
            total_tokens,
        }
    }
}

/// The persisted per-segment artifact: segment metadata joined with the
/// prompt and the model's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    #[serde(flatten)]
    pub segment: SegmentRecord,

    /// Literal prompt text sent with the image
    pub prompt: String,

    /// Cleaned completion text, possibly empty
    pub evaluation: String,

    pub finish_reason: FinishReason,

    /// The provider's own finish value, before mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_finish_reason: Option<String>,

    /// Validator classification of this response
    pub outcome: Outcome,

    /// Provider model identifier
    pub model: String,

    /// When the response was received (ISO-8601, local time)
    pub timestamp: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,

    #[serde(default)]
    pub latency_ms: u64,

    /// Attempts spent on this segment, retries included
    #[serde(default)]
    pub attempts: u32,

    /// Full provider payload, kept for every unsuccessful outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<serde_json::Value>,
}

/// What happened to one segment within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    Success,
    TokenExhaustion,
    ContentFiltered,
    Malformed,
    /// Transient failures outlasted the retry budget, or a terminal rejection
    ProviderFailure,
    /// The provider body could not be normalized
    ParseFailure,
    /// The crop image could not be read
    ImageUnreadable,
    /// The artifact could not be persisted
    WriteFailure,
}

impl SegmentStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<Outcome> for SegmentStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Self::Success,
            Outcome::TokenExhaustion => Self::TokenExhaustion,
            Outcome::ContentFiltered => Self::ContentFiltered,
            Outcome::Malformed => Self::Malformed,
        }
    }
}

/// One line of the run summary's `results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub diagram_id: String,

    pub status: SegmentStatus,

    /// Artifact file name, when one was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,

    /// True when the artifact predates this invocation
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub resumed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<EvaluationRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<serde_json::Value>,
}

impl SummaryEntry {
    /// Entry for a segment whose artifact exists.
    pub fn evaluated(record: EvaluationRecord, artifact: String, resumed: bool) -> Self {
        Self {
            diagram_id: record.segment.key().diagram_id(),
            status: record.outcome.into(),
            artifact: Some(artifact),
            resumed,
            record: Some(record),
            error: None,
            raw_response: None,
        }
    }

    /// Entry for a segment that ended without an artifact.
    pub fn failed(
        key: &SegmentKey,
        status: SegmentStatus,
        error: impl Into<String>,
        raw_response: Option<serde_json::Value>,
    ) -> Self {
        Self {
            diagram_id: key.diagram_id(),
            status,
            artifact: None,
            resumed: false,
            record: None,
            error: Some(error.into()),
            raw_response,
        }
    }
}

/// Lifecycle state of a run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Complete,
    Aborted,
}

/// Aggregate record of one run, rewritten after every segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub model: String,
    pub prompt: String,
    pub prompt_id: String,
    pub total_diagrams: usize,
    pub successful: usize,
    pub failed: usize,
    /// Segments whose artifact already existed when this invocation started
    pub skipped: usize,
    pub status: RunStatus,
    /// Run start, `YYYYmmdd_HHMMSS`
    pub timestamp: String,
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    pub results: Vec<SummaryEntry>,
}

impl RunSummary {
    pub fn new(
        model: &str,
        prompt: &PromptTemplate,
        total_diagrams: usize,
        started: DateTime<Local>,
    ) -> Self {
        Self {
            model: model.to_string(),
            prompt: prompt.text.clone(),
            prompt_id: prompt.id.clone(),
            total_diagrams,
            successful: 0,
            failed: 0,
            skipped: 0,
            status: RunStatus::InProgress,
            timestamp: run_stamp(started),
            started_at: iso_timestamp(started),
            finished_at: None,
            results: Vec::with_capacity(total_diagrams),
        }
    }

    /// Append a segment entry and update the counters.
    pub fn record(&mut self, entry: SummaryEntry) {
        if entry.status.is_success() {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        if entry.resumed {
            self.skipped += 1;
        }
        self.results.push(entry);
    }

    /// Mark the summary final.
    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(iso_timestamp(Local::now()));
    }

    /// Segments accounted for so far.
    pub fn processed(&self) -> usize {
        self.successful + self.failed
    }
}

/// ISO-8601 local timestamp with microseconds, e.g. `2025-12-31T15:57:22.123456`.
pub fn iso_timestamp(at: DateTime<Local>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Compact run identifier stamp, e.g. `20251231_155722`.
pub fn run_stamp(at: DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_segment(index: u32) -> SegmentRecord {
        SegmentRecord {
            manuscript_id: "hou02614c00458".to_string(),
            page_filename: "D._Logic__hou02614c00458__seq15.jpg".to_string(),
            segment_index: index,
            crop_path: PathBuf::from(format!("/crops/seq15_cls0_{index}.jpg")),
            x: 120.0,
            y: 340.5,
            width: 410.0,
            height: 220.0,
            canvas_uri: "https://iiif.lib.harvard.edu/manifests/drs:1/canvas/15".to_string(),
            category_level_1: "logic".to_string(),
            category_level_2: "existential graph".to_string(),
        }
    }

    pub(crate) fn sample_record(index: u32, outcome: Outcome) -> EvaluationRecord {
        EvaluationRecord {
            segment: sample_segment(index),
            prompt: "Describe this diagram.".to_string(),
            evaluation: if outcome == Outcome::Success {
                "Two nested cuts.".to_string()
            } else {
                String::new()
            },
            finish_reason: if outcome == Outcome::Success {
                FinishReason::Stop
            } else {
                FinishReason::Length
            },
            native_finish_reason: None,
            outcome,
            model: "mock-vlm".to_string(),
            timestamp: "2025-12-31T15:57:22.000000".to_string(),
            usage: None,
            latency_ms: 12,
            attempts: 1,
            raw_response: None,
        }
    }

    #[test]
    fn test_diagram_id_strips_page_extension() {
        let key = sample_segment(3).key();
        assert_eq!(
            key.diagram_id(),
            "hou02614c00458_D._Logic__hou02614c00458__seq15_3"
        );
    }

    #[test]
    fn test_diagram_id_keeps_extensionless_page_names_whole() {
        let mut first = sample_segment(0);
        first.page_filename = "D._Logic__hou02614c00458__seq15".to_string();
        let mut second = sample_segment(0);
        second.page_filename = "D._Logic__hou02614c00458__seq16".to_string();

        assert_eq!(
            first.key().diagram_id(),
            "hou02614c00458_D._Logic__hou02614c00458__seq15_0"
        );
        assert_ne!(first.key().diagram_id(), second.key().diagram_id());
        assert_eq!(first.page_stem(), "D._Logic__hou02614c00458__seq15");
    }

    #[test]
    fn test_diagram_id_replaces_path_separators() {
        let mut segment = sample_segment(0);
        segment.manuscript_id = "drs/123".to_string();
        assert_eq!(segment.key().diagram_id(), "drs_123_D._Logic__hou02614c00458__seq15_0");
    }

    #[test]
    fn test_token_usage_derives_content_tokens() {
        let usage = TokenUsage::from_counts(Some(900), Some(2048), Some(2000), Some(2948));
        assert_eq!(usage.content_tokens, Some(48));
        assert_eq!(usage.reasoning_tokens, Some(2000));

        let usage = TokenUsage::from_counts(None, Some(300), None, None);
        assert_eq!(usage.content_tokens, Some(300));
    }

    #[test]
    fn test_evaluation_record_flattens_segment_fields() {
        let record = sample_record(1, Outcome::Success);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["manuscript_id"], "hou02614c00458");
        assert_eq!(json["segment_index"], 1);
        assert_eq!(json["crop_path"], "/crops/seq15_cls0_1.jpg");
        assert_eq!(json["finish_reason"], "stop");
        assert_eq!(json["outcome"], "success");
        assert!(json.get("raw_response").is_none());

        let parsed: EvaluationRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_summary_counts_by_status() {
        let prompt = PromptTemplate::custom("Describe.");
        let mut summary = RunSummary::new("mock-vlm", &prompt, 3, Local::now());
        let ok = sample_record(0, Outcome::Success);
        summary.record(SummaryEntry::evaluated(ok, "a.json".to_string(), true));
        let short = sample_record(1, Outcome::TokenExhaustion);
        summary.record(SummaryEntry::evaluated(short, "b.json".to_string(), false));
        summary.record(SummaryEntry::failed(
            &sample_segment(2).key(),
            SegmentStatus::ProviderFailure,
            "HTTP 503",
            None,
        ));

        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.processed(), 3);
        assert_eq!(summary.status, RunStatus::InProgress);

        summary.finish(RunStatus::Complete);
        assert_eq!(summary.status, RunStatus::Complete);
        assert!(summary.finished_at.is_some());
    }

    #[test]
    fn test_run_stamp_format() {
        let at = chrono::TimeZone::with_ymd_and_hms(&Local, 2025, 12, 31, 15, 57, 22).unwrap();
        assert_eq!(run_stamp(at), "20251231_155722");
        assert_eq!(iso_timestamp(at), "2025-12-31T15:57:22.000000");
    }
}
