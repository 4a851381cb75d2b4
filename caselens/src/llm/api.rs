use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse, ImageDetail, ImageUrlArgs,
    },
    Client,
};

use crate::{
    config::{parse_llm_provider_model, ReasoningConfig},
    error::{CaseLensError, Result},
    llm::ReasoningRequest,
};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
const LMSTUDIO_BASE_URL: &str = "http://localhost:1234/v1";

#[derive(Debug, Clone)]
struct ApiConfig {
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout_secs: u64,
    max_retries: u32,
}

/// OpenAI-compatible chat completions client for multimodal reasoning.
#[derive(Clone)]
pub struct LlmApiClient {
    client: Client<OpenAIConfig>,
    config: ApiConfig,
}

impl LlmApiClient {
    pub fn new(config: &ReasoningConfig) -> Result<Self> {
        let api_config = ApiConfig::from_reasoning_config(config);

        let openai_config = OpenAIConfig::new()
            .with_api_base(api_config.base_url.clone())
            .with_api_key(api_config.api_key.clone().unwrap_or_default());

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(api_config.timeout_secs))
            .build()
            .map_err(|error| {
                CaseLensError::Llm(format!("Failed to create LLM HTTP client: {error}"))
            })?;

        // async-openai retries 5xx on its own; cap it so our loop stays in charge.
        let backoff = backoff::ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(api_config.timeout_secs)),
            ..Default::default()
        };

        let client = Client::with_config(openai_config)
            .with_http_client(http_client)
            .with_backoff(backoff);

        Ok(Self {
            client,
            config: api_config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub async fn complete(&self, request: &ReasoningRequest) -> Result<String> {
        if request.text.trim().is_empty() {
            return Err(CaseLensError::Validation(
                "Reasoning context cannot be empty".to_string(),
            ));
        }

        let mut last_error: Option<CaseLensError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay_ms = 100 * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let chat_request = self.build_request(request)?;

            match self.client.chat().create(chat_request).await {
                Ok(response) => return Self::extract_content(response),
                Err(error) => {
                    if let Some(rate_limit_error) = Self::rate_limit_error(&error) {
                        return Err(rate_limit_error);
                    }

                    if let Some(auth_error) = Self::auth_error(&error) {
                        return Err(auth_error);
                    }

                    let retryable = Self::is_retryable(&error);
                    let mapped_error = Self::map_openai_error(error);

                    if retryable && attempt < self.config.max_retries {
                        tracing::warn!(attempt, error = %mapped_error, "Reasoning call failed, retrying");
                        last_error = Some(mapped_error);
                        continue;
                    }

                    return Err(mapped_error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            CaseLensError::Llm("Reasoning call failed after retries".to_string())
        }))
    }

    fn build_request(&self, request: &ReasoningRequest) -> Result<CreateChatCompletionRequest> {
        let mut messages = Vec::new();

        if !request.system.trim().is_empty() {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(request.system.as_str())
                    .build()
                    .map_err(|error| {
                        CaseLensError::Validation(format!("Invalid system prompt: {error}"))
                    })?
                    .into(),
            );
        }

        let mut parts: Vec<ChatCompletionRequestUserMessageContentPart> =
            Vec::with_capacity(request.images.len() + 1);
        parts.push(
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(request.text.as_str())
                .build()
                .map_err(|error| CaseLensError::Validation(format!("Invalid text part: {error}")))?
                .into(),
        );

        for data_url in &request.images {
            let image_url = ImageUrlArgs::default()
                .url(data_url.as_str())
                .detail(ImageDetail::Auto)
                .build()
                .map_err(|error| CaseLensError::Validation(format!("Invalid image url: {error}")))?;
            parts.push(
                ChatCompletionRequestMessageContentPartImageArgs::default()
                    .image_url(image_url)
                    .build()
                    .map_err(|error| {
                        CaseLensError::Validation(format!("Invalid image part: {error}"))
                    })?
                    .into(),
            );
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(parts))
                .build()
                .map_err(|error| {
                    CaseLensError::Validation(format!("Invalid user message: {error}"))
                })?
                .into(),
        );

        let mut chat_request = CreateChatCompletionRequestArgs::default();
        chat_request.model(self.config.model.clone()).messages(messages);
        if request.max_output_tokens > 0 {
            chat_request.max_tokens(request.max_output_tokens);
        }

        chat_request.build().map_err(|error| {
            CaseLensError::Validation(format!("Invalid reasoning request: {error}"))
        })
    }

    fn extract_content(response: CreateChatCompletionResponse) -> Result<String> {
        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CaseLensError::Llm("LLM response contained no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();

        if message.trim().is_empty() {
            return Err(CaseLensError::Llm(
                "LLM response contained empty content".to_string(),
            ));
        }

        Ok(message)
    }

    fn is_retryable(error: &OpenAIError) -> bool {
        match error {
            OpenAIError::ApiError(api_error) => {
                api_error.r#type.is_none() && api_error.code.is_none()
            }
            OpenAIError::Reqwest(reqwest_error) => reqwest_error
                .status()
                .map(|status| status.is_server_error())
                .unwrap_or(true),
            _ => false,
        }
    }

    fn rate_limit_error(error: &OpenAIError) -> Option<CaseLensError> {
        match error {
            OpenAIError::Reqwest(reqwest_error)
                if reqwest_error.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) =>
            {
                Some(CaseLensError::LlmRateLimit { retry_after: None })
            }
            OpenAIError::ApiError(api_error) if Self::is_rate_limit_api_error(api_error) => {
                Some(CaseLensError::LlmRateLimit { retry_after: None })
            }
            _ => None,
        }
    }

    fn auth_error(error: &OpenAIError) -> Option<CaseLensError> {
        match error {
            OpenAIError::Reqwest(reqwest_error)
                if reqwest_error.status() == Some(reqwest::StatusCode::UNAUTHORIZED)
                    || reqwest_error.status() == Some(reqwest::StatusCode::FORBIDDEN) =>
            {
                Some(CaseLensError::ReasoningUnavailable(format!(
                    "LLM authentication failed: {reqwest_error}"
                )))
            }
            OpenAIError::ApiError(api_error) if Self::is_auth_api_error(api_error) => {
                Some(CaseLensError::ReasoningUnavailable(format!(
                    "LLM authentication failed: {api_error}"
                )))
            }
            _ => None,
        }
    }

    fn is_rate_limit_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("rate limit")
            || message.contains("too many requests")
            || error_type.contains("rate_limit")
            || code.contains("rate_limit")
            || code == "insufficient_quota"
    }

    fn is_auth_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("unauthorized")
            || message.contains("invalid api key")
            || code.contains("invalid_api_key")
            || error_type.contains("authentication")
    }

    fn map_openai_error(error: OpenAIError) -> CaseLensError {
        match error {
            OpenAIError::Reqwest(reqwest_error) => {
                CaseLensError::Llm(format!("LLM request failed: {reqwest_error}"))
            }
            OpenAIError::ApiError(api_error) => {
                CaseLensError::Llm(format!("LLM API error: {api_error}"))
            }
            OpenAIError::JSONDeserialize(err) => {
                CaseLensError::Llm(format!("Failed to parse LLM response: {err}"))
            }
            OpenAIError::InvalidArgument(message) => CaseLensError::Validation(message),
            other => CaseLensError::Llm(other.to_string()),
        }
    }
}

impl ApiConfig {
    fn from_reasoning_config(config: &ReasoningConfig) -> Self {
        let (provider, model) = parse_llm_provider_model(&config.model);

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(provider).to_string());

        let normalized_model = if provider.eq_ignore_ascii_case("local") {
            config.model.clone()
        } else {
            model.to_string()
        };

        Self {
            base_url,
            api_key: config.api_key.clone(),
            model: normalized_model,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        }
    }
}

fn default_base_url(provider: &str) -> &'static str {
    match provider.to_lowercase().as_str() {
        "openrouter" => OPENROUTER_BASE_URL,
        "ollama" => OLLAMA_BASE_URL,
        "lmstudio" => LMSTUDIO_BASE_URL,
        _ => OPENAI_BASE_URL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::types::ChatCompletionRequestMessage;

    fn client(model: &str) -> LlmApiClient {
        let config = ReasoningConfig {
            api_key: Some("test-key".to_string()),
            ..ReasoningConfig::new(model)
        };
        LlmApiClient::new(&config).unwrap()
    }

    #[test]
    fn test_model_prefix_is_stripped() {
        let client = client("openrouter/openai/gpt-4o");
        assert_eq!(client.model(), "openai/gpt-4o");
        assert_eq!(client.base_url(), OPENROUTER_BASE_URL);
    }

    #[test]
    fn test_request_orders_text_before_images() {
        let client = client("openai/gpt-4o");
        let request = ReasoningRequest {
            system: "system".to_string(),
            text: "CLINICAL REPORT:\nDilated LV".to_string(),
            images: vec![
                "data:image/png;base64,AAAA".to_string(),
                "data:image/png;base64,BBBB".to_string(),
            ],
            max_output_tokens: 900,
        };

        let built = client.build_request(&request).unwrap();
        assert_eq!(built.messages.len(), 2);
        assert_eq!(built.model, "gpt-4o");

        let ChatCompletionRequestMessage::User(user) = &built.messages[1] else {
            panic!("second message should be the user message");
        };
        let ChatCompletionRequestUserMessageContent::Array(parts) = &user.content else {
            panic!("user content should be multipart");
        };
        assert_eq!(parts.len(), 3);
        assert!(matches!(
            parts[0],
            ChatCompletionRequestUserMessageContentPart::Text(_)
        ));
        match &parts[2] {
            ChatCompletionRequestUserMessageContentPart::ImageUrl(image) => {
                assert_eq!(image.image_url.url, "data:image/png;base64,BBBB")
            }
            other => panic!("expected image part, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_system_prompt_is_omitted() {
        let client = client("openai/gpt-4o");
        let request = ReasoningRequest {
            text: "report".to_string(),
            ..Default::default()
        };
        let built = client.build_request(&request).unwrap();
        assert_eq!(built.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_context_is_rejected() {
        let client = client("openai/gpt-4o");
        let result = client.complete(&ReasoningRequest::default()).await;
        assert!(matches!(result, Err(CaseLensError::Validation(_))));
    }
}
