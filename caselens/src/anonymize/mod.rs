//! Case identity and anonymization.
//!
//! Every study gets a stable case id derived before any attribute is removed.
//! Only a fixed set of technical attributes survives, and nothing
//! date-, time- or person-shaped is kept. Case text is checked again before it
//! leaves this module.

mod card;
mod identity;
mod scrub;
mod verify;

pub use card::{case_card_text, frame_caption};
pub use identity::{derive_case_id, CASE_ID_LEN};
pub use scrub::{is_identifying_key, looks_like_date_or_time, scrub, RETAINED_KEYWORDS};
pub use verify::{
    document_violations, label_leak, metadata_violations, verify_documents, DocumentViolation,
    VerificationReport,
};

use crate::error::{CaseLensError, Result};
use crate::models::{Case, LabelInfo, RawMetadata, TechnicalMetadata};

fn parse_f64(meta: &RawMetadata, key: &str) -> Option<f64> {
    meta.get(key)
        .and_then(|v| v.split('\\').next())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_u32(meta: &RawMetadata, key: &str) -> Option<u32> {
    meta.get(key).and_then(|v| v.trim().parse::<u32>().ok())
}

fn text(meta: &RawMetadata, key: &str) -> Option<String> {
    meta.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Technical attributes from already scrubbed metadata.
pub fn technical_metadata(scrubbed: &RawMetadata) -> TechnicalMetadata {
    let num_frames = parse_u32(scrubbed, "NumberOfFrames").unwrap_or(1).max(1);
    let fps = parse_f64(scrubbed, "CineRate")
        .or_else(|| parse_f64(scrubbed, "RecommendedDisplayFrameRate"))
        .filter(|fps| *fps > 0.0);
    let duration_s = parse_f64(scrubbed, "EffectiveDuration")
        .or_else(|| fps.map(|fps| num_frames as f64 / fps));

    TechnicalMetadata {
        modality: text(scrubbed, "Modality"),
        view: text(scrubbed, "ViewName"),
        stage: text(scrubbed, "StageName"),
        num_frames,
        fps,
        duration_s,
        heart_rate: parse_f64(scrubbed, "HeartRate"),
        manufacturer: text(scrubbed, "Manufacturer"),
        model: text(scrubbed, "ManufacturerModelName"),
        rows: parse_u32(scrubbed, "Rows"),
        columns: parse_u32(scrubbed, "Columns"),
        photometric: text(scrubbed, "PhotometricInterpretation"),
    }
}

/// Derives the case id from the raw header, then builds the anonymized case.
pub fn anonymize_study(raw: &RawMetadata, source_name: &str, label: Option<LabelInfo>) -> Case {
    let case_id = derive_case_id(raw, source_name);
    let scrubbed = scrub(raw);
    Case {
        case_id,
        label,
        technical: technical_metadata(&scrubbed),
        anonymized: true,
    }
}

/// Rejects a case whose metadata or generated text would leak identity or
/// diagnosis.
pub fn ensure_case_clean(case: &Case, texts: &[&str]) -> Result<()> {
    let mut issues = metadata_violations(&case.to_metadata());
    if let Some(label) = &case.label {
        for text in texts {
            if let Some(form) = label_leak(text, label) {
                issues.push(format!("diagnosis label '{form}' appears in text"));
            }
        }
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(CaseLensError::AnonymizationViolation {
            case_id: case.case_id.clone(),
            reason: issues.join("; "),
        })
    }
}
