use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Case, DocumentType, Metadata};

/// A unit of indexable text: case card, frame caption or guideline chunk.
///
/// The `document_type` metadata key is always present; the remaining keys
/// depend on the type. The collection-side identifier is derived from
/// [`Document::logical_key`] so re-indexing is idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn case_card(case: &Case, content: String) -> Self {
        let mut metadata = case.to_metadata();
        metadata.insert("document_type".into(), Value::from(DocumentType::CaseCard.to_string()));
        Self { content, metadata }
    }

    pub fn frame(case: &Case, content: String, frame_index: usize, image_path: &str) -> Self {
        let mut metadata = case.to_metadata();
        metadata.insert("document_type".into(), Value::from(DocumentType::Frame.to_string()));
        metadata.insert("frame_index".into(), Value::from(frame_index));
        metadata.insert("image_path".into(), Value::from(image_path));
        Self { content, metadata }
    }

    pub fn guideline(source: &str, chunk_id: usize, content: String) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("document_type".into(), Value::from(DocumentType::Guideline.to_string()));
        metadata.insert("source".into(), Value::from(source));
        metadata.insert("chunk_id".into(), Value::from(chunk_id));
        Self { content, metadata }
    }

    pub fn document_type(&self) -> Option<DocumentType> {
        self.str_field("document_type")?.parse().ok()
    }

    pub fn case_id(&self) -> Option<&str> {
        self.str_field("case_id")
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Identifier reported in evidence lists: the case id for case documents,
    /// `source#chunk_id` for guideline chunks.
    pub fn evidence_id(&self) -> Option<String> {
        match self.document_type()? {
            DocumentType::CaseCard | DocumentType::Frame => self.case_id().map(str::to_string),
            DocumentType::Guideline => {
                let source = self.str_field("source")?;
                let chunk = self.metadata.get("chunk_id")?.as_u64()?;
                Some(format!("{source}#{chunk}"))
            }
        }
    }

    /// Deterministic key the point id is derived from.
    pub fn logical_key(&self) -> Option<String> {
        match self.document_type()? {
            DocumentType::CaseCard => Some(format!("case:{}", self.case_id()?)),
            DocumentType::Frame => {
                let index = self.metadata.get("frame_index")?.as_u64()?;
                Some(format!("frame:{}:{index}", self.case_id()?))
            }
            DocumentType::Guideline => self.evidence_id().map(|id| format!("guideline:{id}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabelInfo, TechnicalMetadata};

    fn case() -> Case {
        Case {
            case_id: "abc123def456".into(),
            label: Some(LabelInfo::unmapped("dcm")),
            technical: TechnicalMetadata::default(),
            anonymized: true,
        }
    }

    #[test]
    fn test_logical_keys_per_type() {
        let card = Document::case_card(&case(), "card".into());
        assert_eq!(card.logical_key().unwrap(), "case:abc123def456");

        let frame = Document::frame(&case(), "frame".into(), 3, "images/abc123def456/frame_03.png");
        assert_eq!(frame.logical_key().unwrap(), "frame:abc123def456:3");
        assert_eq!(frame.evidence_id().unwrap(), "abc123def456");

        let chunk = Document::guideline("esc_hf.txt", 7, "text".into());
        assert_eq!(chunk.logical_key().unwrap(), "guideline:esc_hf.txt#7");
        assert_eq!(chunk.evidence_id().unwrap(), "esc_hf.txt#7");
    }

    #[test]
    fn test_document_without_type_has_no_key() {
        let doc = Document {
            content: "loose".into(),
            metadata: Metadata::new(),
        };
        assert!(doc.document_type().is_none());
        assert!(doc.logical_key().is_none());
    }
}
