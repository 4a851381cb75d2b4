use serde::{Deserialize, Serialize};

use super::Metadata;

/// Diagnosis label derived from the dataset's folder layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInfo {
    #[serde(rename = "diagnosis_label_raw")]
    pub raw: String,
    #[serde(rename = "diagnosis_label_short")]
    pub short: String,
    #[serde(rename = "diagnosis_label_pretty")]
    pub pretty: String,
    #[serde(rename = "diagnosis_group")]
    pub group: String,
}

impl LabelInfo {
    /// Label with no curated mapping: a slug of the folder name, a spaced
    /// rendering of it and the `unknown` group.
    pub fn unmapped(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            short: slugify(&raw),
            pretty: raw.trim().replace('_', " "),
            group: "unknown".to_string(),
            raw,
        }
    }

    /// Every surface form of the label, used for leakage checks.
    pub fn surface_forms(&self) -> Vec<&str> {
        let mut forms: Vec<&str> = vec![&self.raw, &self.short, &self.pretty];
        forms.retain(|f| !f.trim().is_empty());
        forms.dedup();
        forms
    }
}

/// Lowercase `[a-z0-9_]` form: whitespace runs become `_`, anything else
/// outside the set is dropped.
pub fn slugify(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_space = false;
    for c in value.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c.to_ascii_lowercase());
        }
    }
    out
}

/// Non-identifying acquisition attributes kept after anonymization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default)]
    pub num_frames: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_s: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photometric: Option<String>,
}

impl TechnicalMetadata {
    pub fn modality_description(&self) -> &'static str {
        match self.modality.as_deref() {
            Some("US") => "Ultrasound",
            Some("MR") => "Magnetic resonance",
            Some("CT") => "Computed tomography",
            Some("XA") => "X-ray angiography",
            Some("CR") | Some("DX") => "Radiograph",
            _ => "Imaging",
        }
    }
}

/// One anonymized study. `label` is absent for the study under review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub case_id: String,
    #[serde(flatten)]
    pub label: Option<LabelInfo>,
    #[serde(flatten)]
    pub technical: TechnicalMetadata,
    pub anonymized: bool,
}

impl Case {
    /// Flat metadata map shared by the case card and its frame documents.
    pub fn to_metadata(&self) -> Metadata {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => Metadata::new(),
        }
    }
}
