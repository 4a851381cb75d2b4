use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata attached to every indexed document and returned with every hit.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Attributes read from a study header, keyed by their standard keyword
/// (`PatientName`, `NumberOfFrames`, ...). Values are already rendered as text.
pub type RawMetadata = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    CaseCard,
    Frame,
    Guideline,
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CaseCard => write!(f, "case_card"),
            Self::Frame => write!(f, "frame"),
            Self::Guideline => write!(f, "guideline"),
        }
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "case_card" => Ok(Self::CaseCard),
            "frame" => Ok(Self::Frame),
            "guideline" => Ok(Self::Guideline),
            _ => Err(format!("Unknown document type: {s}")),
        }
    }
}

/// Collections served by the retriever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Cases,
    Guidelines,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 2] = [CollectionKind::Cases, CollectionKind::Guidelines];

    pub fn name(&self) -> &'static str {
        match self {
            CollectionKind::Cases => "cases",
            CollectionKind::Guidelines => "guidelines",
        }
    }
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_type_round_trips_through_str() {
        for kind in [DocumentType::CaseCard, DocumentType::Frame, DocumentType::Guideline] {
            let parsed: DocumentType = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("report".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_document_type_serializes_snake_case() {
        let json = serde_json::to_string(&DocumentType::CaseCard).unwrap();
        assert_eq!(json, "\"case_card\"");
    }
}
