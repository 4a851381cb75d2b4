mod common;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use caselens::config::ReasoningConfig;
use caselens::error::CaseLensError;
use caselens::llm::{LlmApiClient, LlmBackend, LlmProvider, Reasoner, ReasoningRequest};
use common::{api_error_body, completion_body};

fn reasoning_config(model: &str, base_url: String, max_retries: u32) -> ReasoningConfig {
    ReasoningConfig {
        api_key: Some("test-key".to_string()),
        base_url: Some(base_url),
        timeout_secs: 5,
        max_retries,
        ..ReasoningConfig::new(model)
    }
}

fn request(images: usize) -> ReasoningRequest {
    ReasoningRequest {
        system: "You are a cardiology clinical decision support assistant.".to_string(),
        text: "CLINICAL REPORT:\nDilated left ventricle".to_string(),
        images: (0..images)
            .map(|i| format!("data:image/png;base64,AAAA{i}"))
            .collect(),
        max_output_tokens: 900,
    }
}

#[test]
fn test_api_client_uses_provider_default_base_url() {
    let config = ReasoningConfig {
        api_key: Some("test-key".to_string()),
        ..ReasoningConfig::new("openrouter/openai/gpt-4o-mini")
    };
    let client = LlmApiClient::new(&config).unwrap();
    assert_eq!(client.base_url(), "https://openrouter.ai/api/v1");
    assert!(matches!(
        LlmProvider::new(Some(&config)).backend(),
        LlmBackend::OpenRouter
    ));
}

#[tokio::test]
async fn test_reason_sends_text_then_images() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("1) Suggested diagnosis")))
        .expect(1)
        .mount(&server)
        .await;

    let config = reasoning_config("openai/gpt-4o", format!("{}/v1", server.uri()), 1);
    let provider = LlmProvider::new(Some(&config));

    let answer = provider.reason(&request(2)).await.unwrap();
    assert_eq!(answer, "1) Suggested diagnosis");

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["max_tokens"], 900);
    assert_eq!(body["messages"][0]["role"], "system");

    let parts = body["messages"][1]["content"].as_array().unwrap();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0]["type"], "text");
    assert_eq!(parts[1]["type"], "image_url");
    assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AAAA0");
    assert_eq!(parts[2]["image_url"]["url"], "data:image/png;base64,AAAA1");
}

#[tokio::test]
async fn test_retry_on_server_error() {
    let server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_for_mock = Arc::clone(&attempts);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(move |_request: &Request| {
            if attempts_for_mock.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(500).set_body_string("upstream temporary failure")
            } else {
                ResponseTemplate::new(200).set_body_json(completion_body("Recovered response"))
            }
        })
        .mount(&server)
        .await;

    let config = reasoning_config("openai/gpt-4o-mini", format!("{}/v1", server.uri()), 2);
    let provider = LlmProvider::new(Some(&config));

    let answer = provider.reason(&request(0)).await.unwrap();
    assert_eq!(answer, "Recovered response");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rate_limit_handling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(api_error_body(
                "Rate limit exceeded",
                "insufficient_quota",
                "insufficient_quota",
            )),
        )
        .mount(&server)
        .await;

    let config = reasoning_config("openai/gpt-4o-mini", format!("{}/v1", server.uri()), 1);
    let provider = LlmProvider::new(Some(&config));

    let result = provider.reason(&request(0)).await;
    assert!(matches!(
        result,
        Err(CaseLensError::LlmRateLimit { retry_after: None })
    ));
}

#[tokio::test]
async fn test_auth_error_is_reasoning_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(api_error_body(
            "Invalid API key",
            "invalid_request_error",
            "invalid_api_key",
        )))
        .mount(&server)
        .await;

    let config = reasoning_config("openai/gpt-4o-mini", format!("{}/v1", server.uri()), 1);
    let provider = LlmProvider::new(Some(&config));

    match provider.reason(&request(0)).await {
        Err(CaseLensError::ReasoningUnavailable(message)) => {
            assert!(message.to_lowercase().contains("authentication failed"))
        }
        other => panic!("Expected ReasoningUnavailable, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_unconfigured_provider_is_unavailable() {
    let provider = LlmProvider::new(None);
    assert!(!provider.is_available());
    assert!(matches!(
        provider.reason(&request(0)).await,
        Err(CaseLensError::ReasoningUnavailable(_))
    ));
}
