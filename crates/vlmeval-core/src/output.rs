//! Run directory layout and durable artifact writes.
//!
//! A run owns one directory holding one JSON artifact per evaluated segment
//! plus `summary.json`. Every file is written to a hidden temporary sibling
//! and renamed into place, so a visible artifact is always complete and its
//! presence alone marks the segment as done.

use crate::error::OutputError;
use crate::types::{run_stamp, EvaluationRecord, RunSummary, SegmentKey, SegmentRecord};
use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File name of the run summary inside a run directory.
pub const SUMMARY_FILE: &str = "summary.json";

/// Writes artifacts and the summary for one run directory.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    run_dir: PathBuf,
}

impl OutputWriter {
    /// Claim a fresh run directory `{output_root}/{model_dir}/eval_{stamp}`.
    ///
    /// Fails with `RunDirExists` rather than reusing a directory another run
    /// already owns.
    pub fn create_run(
        output_root: &Path,
        model_dir: &str,
        started: DateTime<Local>,
    ) -> Result<Self, OutputError> {
        let parent = output_root.join(model_dir);
        std::fs::create_dir_all(&parent).map_err(|source| OutputError::Write {
            path: parent.clone(),
            source,
        })?;

        let run_dir = parent.join(format!("eval_{}", run_stamp(started)));
        match std::fs::create_dir(&run_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(OutputError::RunDirExists(run_dir));
            }
            Err(source) => {
                return Err(OutputError::Write {
                    path: run_dir,
                    source,
                })
            }
        }

        tracing::debug!("Created run directory {:?}", run_dir);
        Ok(Self { run_dir })
    }

    /// Re-enter an existing run directory.
    pub fn resume(run_dir: &Path) -> Result<Self, OutputError> {
        if !run_dir.is_dir() {
            return Err(OutputError::RunDirMissing(run_dir.to_path_buf()));
        }
        Ok(Self {
            run_dir: run_dir.to_path_buf(),
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Artifact file name for a segment, `{diagram_id}.json`.
    pub fn artifact_name(key: &SegmentKey) -> String {
        format!("{}.json", key.diagram_id())
    }

    pub fn artifact_path(&self, key: &SegmentKey) -> PathBuf {
        self.run_dir.join(Self::artifact_name(key))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.run_dir.join(SUMMARY_FILE)
    }

    /// Whether the segment's artifact is already in place.
    ///
    /// Temporary files never match: they carry a different, hidden name.
    pub fn artifact_exists(&self, key: &SegmentKey) -> bool {
        self.artifact_path(key).is_file()
    }

    /// Read a completed artifact back.
    pub fn read_artifact(&self, key: &SegmentKey) -> Result<EvaluationRecord, OutputError> {
        read_json(&self.artifact_path(key))
    }

    /// Persist a segment's artifact. Returns the artifact file name.
    pub fn write_artifact(&self, record: &EvaluationRecord) -> Result<String, OutputError> {
        let name = Self::artifact_name(&record.segment.key());
        write_json_atomic(&self.run_dir.join(&name), record)?;
        Ok(name)
    }

    /// Persist the run summary, replacing the previous one.
    pub fn write_summary(&self, summary: &RunSummary) -> Result<(), OutputError> {
        write_json_atomic(&self.summary_path(), summary)
    }

    /// Read the summary of an existing run, if it has one.
    pub fn read_summary(&self) -> Result<Option<RunSummary>, OutputError> {
        let path = self.summary_path();
        if !path.is_file() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    /// Segments from `segments` whose artifact is not yet in place.
    pub fn pending<'a>(&self, segments: &'a [SegmentRecord]) -> Vec<&'a SegmentRecord> {
        segments
            .iter()
            .filter(|s| !self.artifact_exists(&s.key()))
            .collect()
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, OutputError> {
    let content = std::fs::read_to_string(path).map_err(|source| OutputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| OutputError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), OutputError> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_file_atomic(path, &bytes)
}

/// Write `bytes` to a hidden temporary sibling of `path`, then rename it over
/// `path`. The rename is atomic within one filesystem.
fn write_file_atomic(path: &Path, bytes: &[u8]) -> Result<(), OutputError> {
    let write_err = |source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let tmp_path = parent.join(format!(".{base}.tmp-{}-{stamp}", std::process::id()));

    std::fs::write(&tmp_path, bytes).map_err(write_err)?;
    if let Err(err) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(write_err(err));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::PromptTemplate;
    use crate::types::tests::{sample_record, sample_segment};
    use crate::validate::Outcome;
    use chrono::TimeZone;

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 12, 31, 15, 57, 22).unwrap()
    }

    #[test]
    fn test_create_run_layout() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::create_run(dir.path(), "qwen2_5_vl_72b_instruct", started()).unwrap();
        assert_eq!(
            writer.run_dir(),
            dir.path()
                .join("qwen2_5_vl_72b_instruct")
                .join("eval_20251231_155722")
        );
        assert!(writer.run_dir().is_dir());
    }

    #[test]
    fn test_create_run_refuses_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        OutputWriter::create_run(dir.path(), "mock", started()).unwrap();
        let err = OutputWriter::create_run(dir.path(), "mock", started()).unwrap_err();
        assert!(matches!(err, OutputError::RunDirExists(_)));
    }

    #[test]
    fn test_resume_requires_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = OutputWriter::resume(&dir.path().join("eval_missing")).unwrap_err();
        assert!(matches!(err, OutputError::RunDirMissing(_)));
        assert!(OutputWriter::resume(dir.path()).is_ok());
    }

    #[test]
    fn test_artifact_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::resume(dir.path()).unwrap();
        let record = sample_record(2, Outcome::Success);
        let key = record.segment.key();

        assert!(!writer.artifact_exists(&key));
        let name = writer.write_artifact(&record).unwrap();
        assert_eq!(name, "hou02614c00458_D._Logic__hou02614c00458__seq15_2.json");
        assert!(writer.artifact_exists(&key));
        assert_eq!(writer.read_artifact(&key).unwrap(), record);
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::resume(dir.path()).unwrap();
        writer.write_artifact(&sample_record(0, Outcome::Success)).unwrap();
        writer.write_artifact(&sample_record(0, Outcome::Success)).unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(!names[0].starts_with('.'));
    }

    #[test]
    fn test_leftover_temp_file_does_not_count_as_done() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::resume(dir.path()).unwrap();
        let segment = sample_segment(4);
        let name = OutputWriter::artifact_name(&segment.key());
        std::fs::write(dir.path().join(format!(".{name}.tmp-1-2")), b"{\"partial\":").unwrap();

        assert!(!writer.artifact_exists(&segment.key()));
        let segments = vec![segment];
        assert_eq!(writer.pending(&segments).len(), 1);
    }

    #[test]
    fn test_corrupt_artifact_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::resume(dir.path()).unwrap();
        let key = sample_segment(1).key();
        std::fs::write(writer.artifact_path(&key), b"not json").unwrap();
        let err = writer.read_artifact(&key).unwrap_err();
        assert!(matches!(err, OutputError::Corrupt { .. }));
    }

    #[test]
    fn test_summary_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::resume(dir.path()).unwrap();
        assert!(writer.read_summary().unwrap().is_none());

        let summary = RunSummary::new("mock-vlm", &PromptTemplate::custom("Describe."), 6, started());
        writer.write_summary(&summary).unwrap();
        assert_eq!(writer.read_summary().unwrap(), Some(summary));
    }

    #[test]
    fn test_pending_skips_completed() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::resume(dir.path()).unwrap();
        let segments: Vec<_> = (0..3).map(sample_segment).collect();
        writer.write_artifact(&sample_record(1, Outcome::Success)).unwrap();

        let pending: Vec<u32> = writer
            .pending(&segments)
            .iter()
            .map(|s| s.segment_index)
            .collect();
        assert_eq!(pending, vec![0, 2]);
    }
}
