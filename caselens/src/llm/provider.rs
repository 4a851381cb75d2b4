use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{parse_llm_provider_model, ReasoningConfig};
use crate::error::{CaseLensError, Result};
use crate::llm::api::LlmApiClient;
use crate::llm::{Reasoner, ReasoningRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAI,
    OpenRouter,
    Ollama,
    LmStudio,
    OpenAICompatible { base_url: String },
    Unavailable { reason: String },
}

#[derive(Debug, Clone)]
pub struct LlmProvider {
    backend: LlmBackend,
    config: Option<Arc<ReasoningConfig>>,
}

impl LlmProvider {
    pub fn new(config: Option<&ReasoningConfig>) -> Self {
        let Some(config) = config else {
            return Self::unavailable("No reasoning model configured (set REASONING_MODEL)");
        };

        let (provider, _model) = parse_llm_provider_model(&config.model);
        let provider = provider.to_lowercase();

        let backend = match provider.as_str() {
            "openai" => LlmBackend::OpenAI,
            "openrouter" => LlmBackend::OpenRouter,
            "ollama" => LlmBackend::Ollama,
            "lmstudio" => LlmBackend::LmStudio,
            _ => {
                if let Some(base_url) = &config.base_url {
                    LlmBackend::OpenAICompatible {
                        base_url: base_url.clone(),
                    }
                } else {
                    LlmBackend::Unavailable {
                        reason: format!("Unknown provider in model: {}", config.model),
                    }
                }
            }
        };

        let needs_api_key = matches!(backend, LlmBackend::OpenAI | LlmBackend::OpenRouter);
        if needs_api_key && config.api_key.is_none() {
            return Self::unavailable(&format!(
                "API key required for provider '{provider}' (set REASONING_API_KEY)"
            ));
        }

        Self {
            backend,
            config: Some(Arc::new(config.clone())),
        }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            backend: LlmBackend::Unavailable {
                reason: reason.to_string(),
            },
            config: None,
        }
    }

    pub fn backend(&self) -> &LlmBackend {
        &self.backend
    }

    pub fn config(&self) -> Option<&ReasoningConfig> {
        self.config.as_deref()
    }

    pub fn base_url(&self) -> Option<&str> {
        match &self.backend {
            LlmBackend::OpenAI => Some("https://api.openai.com/v1"),
            LlmBackend::OpenRouter => Some("https://openrouter.ai/api/v1"),
            LlmBackend::Ollama => Some("http://localhost:11434/v1"),
            LlmBackend::LmStudio => Some("http://localhost:1234/v1"),
            LlmBackend::OpenAICompatible { base_url } => Some(base_url),
            LlmBackend::Unavailable { .. } => None,
        }
    }

    fn unavailable_reason(&self) -> String {
        match &self.backend {
            LlmBackend::Unavailable { reason } => reason.clone(),
            _ => "Reasoning provider has no configuration".to_string(),
        }
    }
}

#[async_trait]
impl Reasoner for LlmProvider {
    async fn reason(&self, request: &ReasoningRequest) -> Result<String> {
        if !self.is_available() {
            return Err(CaseLensError::ReasoningUnavailable(self.unavailable_reason()));
        }

        let config = self
            .config()
            .ok_or_else(|| CaseLensError::ReasoningUnavailable(self.unavailable_reason()))?;

        let client = LlmApiClient::new(config)?;
        client.complete(request).await
    }

    fn is_available(&self) -> bool {
        !matches!(self.backend, LlmBackend::Unavailable { .. })
    }
}
