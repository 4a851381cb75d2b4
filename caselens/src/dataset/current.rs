use std::path::Path;
use tracing::info;

use crate::anonymize::derive_case_id;
use crate::error::Result;
use crate::frames::{FrameSampler, Study};
use crate::models::IngestResult;

/// Prepares the study under review: derives its case id and writes sampled
/// frames to `<frames_root>/<case_id>/frame_XX.png`.
///
/// A study whose pixel data cannot be decoded still gets an id; its frame
/// list is empty.
pub fn ingest_current_study(study: &dyn Study, frames_root: &Path, frames: usize) -> Result<IngestResult> {
    let case_id = derive_case_id(study.metadata(), study.source_name());
    let dir = frames_root.join(&case_id);
    let written = FrameSampler::new(frames).extract_to_dir(study, &dir)?;
    info!(case_id = %case_id, frames = written.len(), dir = %dir.display(), "Current study ingested");

    Ok(IngestResult {
        case_id,
        frame_paths: written.into_iter().map(|(_, path)| path).collect(),
    })
}
