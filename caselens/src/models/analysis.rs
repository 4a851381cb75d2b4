use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::LabelVote;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceIds {
    pub cases: Vec<String>,
    pub guidelines: Vec<String>,
}

/// Outcome of one case review. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub ok: bool,
    pub answer: String,
    pub evidence_ids: EvidenceIds,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_votes: Vec<LabelVote>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_info: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    pub fn failure(error: impl Into<String>, evidence_ids: EvidenceIds) -> Self {
        Self {
            ok: false,
            answer: String::new(),
            evidence_ids,
            label_votes: Vec::new(),
            missing_info: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Result of preparing the study under review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestResult {
    pub case_id: String,
    pub frame_paths: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_serializes_error_and_flag() {
        let result = AnalysisResult::failure("Reasoning timed out after 5 seconds", EvidenceIds::default());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"], "Reasoning timed out after 5 seconds");
        assert!(json.get("missing_info").is_none());
    }
}
