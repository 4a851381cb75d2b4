use serde::Serialize;
use std::path::Path;

use super::scrub::{is_identifying_key, looks_like_date_or_time};
use crate::error::Result;
use crate::models::{Document, DocumentType, LabelInfo, Metadata};

/// Keys whose values are generated by the pipeline and exempt from the
/// date/time value check.
const GENERATED_KEYS: &[&str] = &["case_id", "image_path", "document_type"];

/// Identity problems found in a case document's metadata.
pub fn metadata_violations(metadata: &Metadata) -> Vec<String> {
    let mut issues = Vec::new();
    for (key, value) in metadata {
        if is_identifying_key(key) {
            issues.push(format!("identifying key '{key}'"));
            continue;
        }
        if GENERATED_KEYS.contains(&key.as_str()) {
            continue;
        }
        if let Some(text) = value.as_str() {
            if looks_like_date_or_time(text) {
                issues.push(format!("date/time value in '{key}'"));
            }
        }
    }
    if metadata.get("anonymized").and_then(|v| v.as_bool()) != Some(true) {
        issues.push("anonymized flag is not set".to_string());
    }
    issues
}

/// The label surface form found in `text`, if any. Any case-insensitive
/// substring match counts, including forms joined to other text by `_`.
pub fn label_leak(text: &str, label: &LabelInfo) -> Option<String> {
    let haystack = text.to_lowercase();
    label
        .surface_forms()
        .into_iter()
        .find(|form| haystack.contains(&form.trim().to_lowercase()))
        .map(str::to_string)
}

/// Issues for one case document: identity fields, unset flag, label text
/// in the content.
pub fn document_violations(document: &Document) -> Vec<String> {
    let mut issues = metadata_violations(&document.metadata);
    let label: Option<LabelInfo> =
        serde_json::from_value(serde_json::Value::Object(document.metadata.clone())).ok();
    if let Some(label) = label {
        if let Some(form) = label_leak(&document.content, &label) {
            issues.push(format!("diagnosis label '{form}' appears in text"));
        }
    }
    issues
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentViolation {
    pub line: usize,
    pub case_id: Option<String>,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerificationReport {
    pub checked: usize,
    pub violations: Vec<DocumentViolation>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Re-checks every case document in a JSONL store. Guideline chunks carry no
/// patient data and are skipped.
pub fn verify_documents(path: &Path) -> Result<VerificationReport> {
    let documents = crate::dataset::read_documents(path)?;
    let mut report = VerificationReport::default();
    for (i, document) in documents.iter().enumerate() {
        if matches!(document.document_type(), Some(DocumentType::Guideline)) {
            continue;
        }
        report.checked += 1;
        let issues = document_violations(document);
        if !issues.is_empty() {
            report.violations.push(DocumentViolation {
                line: i + 1,
                case_id: document.case_id().map(str::to_string),
                issues,
            });
        }
    }
    Ok(report)
}
