//! HTTP provider client behavior against a fake litellm-style gateway:
//! a successful structured-output call, and classification of retryable
//! vs. fatal failures (§4.G step 8).

use docrouter::llm::{ChatRequest, HttpProviderClient, ProviderClient};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(model: &str) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        system_message: "system".to_string(),
        user_message: "user".to_string(),
        response_format: None,
        api_key: "test-token".to_string(),
        aws_credentials: None,
    }
}

#[tokio::test]
async fn successful_chat_call_returns_content_and_usage() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "{\"document_type\": \"invoice\"}"}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 12, "total_tokens": 132},
        })))
        .mount(&server)
        .await;

    let client = HttpProviderClient::new(server.uri());
    let response = client.chat(request("gpt-4o-mini")).await.unwrap();

    assert_eq!(response.content, "{\"document_type\": \"invoice\"}");
    assert_eq!(response.prompt_tokens, 120);
    assert_eq!(response.total_tokens, 132);
}

#[tokio::test]
async fn rate_limit_response_is_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let client = HttpProviderClient::new(server.uri());
    let err = client.chat(request("gpt-4o-mini")).await.unwrap_err();

    assert!(
        matches!(err, docrouter::PipelineError::ProviderRetryable(_)),
        "expected ProviderRetryable, got {err:?}"
    );
}

#[tokio::test]
async fn server_error_response_is_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = HttpProviderClient::new(server.uri());
    let err = client.chat(request("gpt-4o-mini")).await.unwrap_err();

    assert!(matches!(err, docrouter::PipelineError::ProviderRetryable(_)));
}

#[tokio::test]
async fn client_error_response_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {"message": "model not found"},
        })))
        .mount(&server)
        .await;

    let client = HttpProviderClient::new(server.uri());
    let err = client.chat(request("not-a-real-model")).await.unwrap_err();

    assert!(matches!(err, docrouter::PipelineError::ProviderFatal(_)));
}
