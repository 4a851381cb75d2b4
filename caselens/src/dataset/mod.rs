//! The anonymized case dataset on disk: `documents.jsonl`, `labels.csv` and
//! `images/<case_id>/frame_XX.png`.

mod builder;
mod current;
mod labels;
mod records;

pub use builder::{dicom_loader, BuildReport, DatasetBuilder, SkippedStudy, StudyLoader};
pub use current::ingest_current_study;
pub use labels::{read_labels, write_labels, LabelMap, LabelRow};
pub use records::{read_documents, write_documents};
