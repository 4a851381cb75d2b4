#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use caselens::config::{Config, DataConfig, IndexingConfig, StoreConfig};
use caselens::dataset::{write_documents, write_labels, LabelRow};
use caselens::db::MemoryVectorStore;
use caselens::embeddings::{l2_normalize, Embedder};
use caselens::error::Result;
use caselens::llm::{Reasoner, ReasoningRequest};
use caselens::models::{Case, Document, LabelInfo, TechnicalMetadata};
use caselens::CaseLensContext;

pub const DIMENSIONS: usize = 64;

/// Feature-hashing bag of words: deterministic and model-free.
pub struct HashEmbedder;

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(0xcbf29ce484222325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; DIMENSIONS];
                for token in text
                    .to_lowercase()
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|t| !t.is_empty())
                {
                    vector[(fnv1a(token) % DIMENSIONS as u64) as usize] += 1.0;
                }
                l2_normalize(&mut vector);
                vector
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }
}

/// Returns the text context it receives, so tests can inspect the prompt.
#[derive(Default)]
pub struct EchoReasoner {
    pub requests: Mutex<Vec<ReasoningRequest>>,
}

#[async_trait]
impl Reasoner for EchoReasoner {
    async fn reason(&self, request: &ReasoningRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(format!("ECHO\n{}", request.text))
    }
}

pub struct FixtureCase {
    pub case_id: &'static str,
    pub label: &'static str,
    pub card: &'static str,
    pub frames: usize,
}

pub fn case(fixture: &FixtureCase) -> Case {
    Case {
        case_id: fixture.case_id.to_string(),
        label: Some(LabelInfo::unmapped(fixture.label)),
        technical: TechnicalMetadata {
            modality: Some("US".to_string()),
            num_frames: 30,
            ..Default::default()
        },
        anonymized: true,
    }
}

/// Writes a built dataset (documents, labels, frame images) and guideline
/// texts under `root`.
pub fn write_corpus(root: &Path, cases: &[FixtureCase], guidelines: &[(&str, &str)]) -> DataConfig {
    let data = DataConfig::from_root(root);
    std::fs::create_dir_all(data.images_dir()).unwrap();
    std::fs::create_dir_all(&data.guidelines_dir).unwrap();

    let mut documents = Vec::new();
    let mut labels = Vec::new();
    for fixture in cases {
        let case = case(fixture);
        documents.push(Document::case_card(&case, fixture.card.to_string()));

        let case_dir = data.images_dir().join(fixture.case_id);
        std::fs::create_dir_all(&case_dir).unwrap();
        for ordinal in 1..=fixture.frames {
            let name = format!("frame_{ordinal:02}.png");
            std::fs::write(case_dir.join(&name), format!("{}-{ordinal}", fixture.case_id)).unwrap();
            documents.push(Document::frame(
                &case,
                format!(
                    "Representative ultrasound frame {ordinal} of {} from case {}.",
                    fixture.frames, fixture.case_id
                ),
                (ordinal - 1) * 10,
                &format!("images/{}/{name}", fixture.case_id),
            ));
        }
        labels.push(LabelRow::new(
            fixture.case_id,
            case.label.as_ref().unwrap(),
            format!("{}/{}.dcm", fixture.label, fixture.case_id),
        ));
    }
    write_documents(&data.documents_path(), &documents).unwrap();
    write_labels(&data.labels_path(), &labels).unwrap();

    for (name, text) in guidelines {
        std::fs::write(data.guidelines_dir.join(name), text).unwrap();
    }
    data
}

pub fn config(data: DataConfig, indexing: IndexingConfig) -> Config {
    let mut config = Config::default();
    config.data = data;
    config.indexing = indexing;
    config.store = StoreConfig {
        url: ":memory:".to_string(),
        auth_token: None,
    };
    config.reasoning = None;
    config
}

pub fn context(config: Config, reasoner: Arc<dyn Reasoner>) -> CaseLensContext {
    CaseLensContext::from_parts(
        config,
        Arc::new(HashEmbedder),
        Arc::new(MemoryVectorStore::new()),
        reasoner,
    )
}

pub fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1,
        "model": "gpt-4o-mini",
        "choices": [
            {
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": content
                },
                "finish_reason": "stop"
            }
        ],
        "usage": {
            "prompt_tokens": 1,
            "completion_tokens": 1,
            "total_tokens": 2
        }
    })
}

pub fn api_error_body(message: &str, error_type: &str, code: &str) -> serde_json::Value {
    json!({
        "error": {
            "message": message,
            "type": error_type,
            "param": serde_json::Value::Null,
            "code": code
        }
    })
}
