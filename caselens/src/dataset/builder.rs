use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::labels::{write_labels, LabelMap, LabelRow};
use super::records::write_documents;
use crate::anonymize::{anonymize_study, case_card_text, ensure_case_clean, frame_caption};
use crate::config::DataConfig;
use crate::error::{CaseLensError, Result};
use crate::frames::{DicomStudy, FrameSampler, Study};
use crate::models::Document;

/// Opens a study file. The default reads DICOM.
pub type StudyLoader = Arc<dyn Fn(&Path) -> Result<Box<dyn Study>> + Send + Sync>;

pub fn dicom_loader() -> StudyLoader {
    Arc::new(|path: &Path| Ok(Box::new(DicomStudy::open(path)?) as Box<dyn Study>))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedStudy {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub cases: usize,
    pub frame_documents: usize,
    pub skipped: Vec<SkippedStudy>,
}

/// Turns `raw_root/<label>/*.dcm` into the anonymized document store,
/// the `labels.csv` side table and per-case frame images.
///
/// Output is written to a staging directory and swapped in only when the
/// whole build succeeds, so an aborted build leaves the previous one intact.
pub struct DatasetBuilder {
    data: DataConfig,
    sampler: FrameSampler,
    labels: LabelMap,
    loader: StudyLoader,
}

impl DatasetBuilder {
    pub fn new(data: DataConfig, frames_per_case: usize) -> Self {
        Self {
            data,
            sampler: FrameSampler::new(frames_per_case),
            labels: LabelMap::default(),
            loader: dicom_loader(),
        }
    }

    pub fn with_loader(mut self, loader: StudyLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_labels(mut self, labels: LabelMap) -> Self {
        self.labels = labels;
        self
    }

    pub fn build(&self) -> Result<BuildReport> {
        let staging = staging_dir(&self.data.dataset_dir);
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        std::fs::create_dir_all(staging.join("images"))?;

        match self.build_into(&staging) {
            Ok(report) => {
                if self.data.dataset_dir.exists() {
                    std::fs::remove_dir_all(&self.data.dataset_dir)?;
                }
                std::fs::rename(&staging, &self.data.dataset_dir)?;
                info!(
                    cases = report.cases,
                    frames = report.frame_documents,
                    skipped = report.skipped.len(),
                    out = %self.data.dataset_dir.display(),
                    "Dataset built"
                );
                Ok(report)
            }
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                    warn!(error = %cleanup, "Failed to remove staging directory");
                }
                Err(e)
            }
        }
    }

    fn build_into(&self, out: &Path) -> Result<BuildReport> {
        let mut report = BuildReport::default();
        let mut documents = Vec::new();
        let mut label_rows = Vec::new();
        let mut seen: HashMap<String, String> = HashMap::new();

        for (folder, path) in list_studies(&self.data.raw_root)? {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let relative = format!("{folder}/{file_name}");

            let study = match (self.loader)(&path) {
                Ok(study) => study,
                Err(e) => {
                    warn!(file = %relative, error = %e, "Skipping unreadable study");
                    report.skipped.push(SkippedStudy {
                        file: relative,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let label = self.labels.resolve(&folder);
            let case = anonymize_study(study.metadata(), &file_name, Some(label.clone()));

            if let Some(first) = seen.get(&case.case_id) {
                return Err(CaseLensError::IdentityCollision {
                    case_id: case.case_id.clone(),
                    first: first.clone(),
                    second: relative,
                });
            }
            seen.insert(case.case_id.clone(), relative.clone());

            let case_dir = out.join("images").join(&case.case_id);
            let frames = self.sampler.extract_to_dir(study.as_ref(), &case_dir)?;

            let card = case_card_text(&case);
            let mut case_documents = vec![Document::case_card(&case, card)];
            for (ordinal, (index, frame_path)) in frames.iter().enumerate() {
                let caption = frame_caption(&case, ordinal + 1, frames.len());
                let image_path = relative_image_path(out, frame_path);
                case_documents.push(Document::frame(&case, caption, *index, &image_path));
            }

            let texts: Vec<&str> = case_documents.iter().map(|d| d.content.as_str()).collect();
            if let Err(e) = ensure_case_clean(&case, &texts) {
                error!(case_id = %case.case_id, file = %relative, error = %e, "Case blocked by anonymization check");
                std::fs::remove_dir_all(&case_dir)?;
                report.skipped.push(SkippedStudy {
                    file: relative,
                    reason: e.to_string(),
                });
                continue;
            }

            report.cases += 1;
            report.frame_documents += frames.len();
            label_rows.push(LabelRow::new(&case.case_id, &label, relative));
            documents.extend(case_documents);
        }

        write_documents(&out.join("documents.jsonl"), &documents)?;
        write_labels(&out.join("labels.csv"), &label_rows)?;
        Ok(report)
    }
}

fn staging_dir(dataset_dir: &Path) -> PathBuf {
    let mut name = dataset_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "dataset".into());
    name.push(".staging");
    dataset_dir.with_file_name(name)
}

/// `images/<case_id>/frame_01.png`, relative to the dataset directory.
fn relative_image_path(out: &Path, frame_path: &Path) -> String {
    frame_path
        .strip_prefix(out)
        .unwrap_or(frame_path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// `(label folder, study path)` pairs, folders and files in name order.
fn list_studies(raw_root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut folders: Vec<PathBuf> = std::fs::read_dir(raw_root)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    folders.sort();

    let mut studies = Vec::new();
    for folder in folders {
        let label = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut files: Vec<PathBuf> = std::fs::read_dir(&folder)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();
        files.sort();
        studies.extend(files.into_iter().map(|f| (label.clone(), f)));
    }
    Ok(studies)
}
