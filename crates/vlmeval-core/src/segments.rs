//! Segment index loading.
//!
//! The layout-detection stage writes one CSV row per detected page region.
//! Only diagram rows whose crop image exists on disk become `SegmentRecord`s.

use crate::error::SegmentError;
use crate::types::{page_stem, SegmentRecord};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Segment class label of diagram rows.
const DIAGRAM_CLASS: &str = "diagram";

/// Which part of the index a run covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentFilter {
    /// Only segments on this page (file name without extension)
    pub page: Option<String>,
    /// Stop after this many segments
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct IndexRow {
    manuscript_id: String,
    page_filename: String,
    segment_index: u32,
    segment_class: String,
    segment_class_id: u32,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    #[serde(default)]
    canvas_uri: String,
    #[serde(default)]
    category_level_1: String,
    #[serde(default)]
    category_level_2: String,
}

/// Load diagram segments from the CSV index at `index_path`.
pub fn load_segments(
    index_path: &Path,
    crops_dir: &Path,
    filter: &SegmentFilter,
) -> Result<Vec<SegmentRecord>, SegmentError> {
    let file = std::fs::File::open(index_path).map_err(|source| SegmentError::Read {
        path: index_path.to_path_buf(),
        source,
    })?;
    let segments = read_segments(file, crops_dir, filter)?;
    tracing::debug!(
        "Loaded {} diagram segment(s) from {:?}",
        segments.len(),
        index_path
    );
    Ok(segments)
}

/// Load diagram segments from any CSV source.
pub fn read_segments<R: Read>(
    source: R,
    crops_dir: &Path,
    filter: &SegmentFilter,
) -> Result<Vec<SegmentRecord>, SegmentError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);
    let mut segments = Vec::new();
    let mut missing_crops = 0usize;

    for row in reader.deserialize::<IndexRow>() {
        let row = row?;
        if row.segment_class != DIAGRAM_CLASS {
            continue;
        }

        let stem = page_stem(&row.page_filename).to_string();
        if let Some(page) = &filter.page {
            if stem != *page {
                continue;
            }
        }

        let crop_path = crop_path(crops_dir, &stem, row.segment_class_id, row.segment_index);
        if !crop_path.exists() {
            missing_crops += 1;
            tracing::debug!("Crop not found, skipping: {:?}", crop_path);
            continue;
        }

        segments.push(SegmentRecord {
            manuscript_id: row.manuscript_id,
            page_filename: row.page_filename,
            segment_index: row.segment_index,
            crop_path,
            x: row.x,
            y: row.y,
            width: row.width,
            height: row.height,
            canvas_uri: row.canvas_uri,
            category_level_1: row.category_level_1,
            category_level_2: row.category_level_2,
        });

        if filter.limit.is_some_and(|limit| segments.len() >= limit) {
            break;
        }
    }

    if missing_crops > 0 {
        tracing::warn!("{missing_crops} diagram row(s) skipped: crop image not found");
    }
    Ok(segments)
}

/// Location of a crop produced by the cropping stage:
/// `{crops_dir}/cropped/{stem}/{stem}_cls{class_id}_{index}.jpg`.
pub fn crop_path(crops_dir: &Path, page_stem: &str, class_id: u32, segment_index: u32) -> PathBuf {
    crops_dir
        .join("cropped")
        .join(page_stem)
        .join(format!("{page_stem}_cls{class_id}_{segment_index}.jpg"))
}
