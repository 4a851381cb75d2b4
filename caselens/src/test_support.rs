//! Deterministic collaborators for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::embeddings::Embedder;
use crate::error::{CaseLensError, Result};
use crate::llm::{Reasoner, ReasoningRequest};

/// One dimension per keyword, valued by how often the keyword occurs.
pub struct KeywordEmbedder {
    keywords: Vec<String>,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let text = text.to_lowercase();
                self.keywords
                    .iter()
                    .map(|k| text.matches(k.as_str()).count() as f32)
                    .collect()
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.keywords.len()
    }
}

/// Answers with the context it was given and keeps every request.
#[derive(Default)]
pub struct EchoReasoner {
    pub requests: Mutex<Vec<ReasoningRequest>>,
}

#[async_trait]
impl Reasoner for EchoReasoner {
    async fn reason(&self, request: &ReasoningRequest) -> Result<String> {
        self.requests
            .lock()
            .map_err(|_| CaseLensError::Internal("poisoned".into()))?
            .push(request.clone());
        Ok(format!("ECHO ({} images)\n{}", request.images.len(), request.text))
    }
}
