//! Provider HTTP client abstraction: one async `chat`-style call per
//! provider over a single OpenAI-compatible request/response shape, since
//! every provider in the catalog (§4.E) is reached through a litellm-style
//! proxy that normalizes the wire format.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::models::ResponseFormat;

#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system_message: String,
    pub user_message: String,
    pub response_format: Option<ResponseFormat>,
    pub api_key: String,
    pub aws_credentials: Option<AwsCredentials>,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// A single provider HTTP call (§4.G step 8). Implementations translate
/// [`ChatRequest`] into the wire format their endpoint expects and surface
/// retryable vs. fatal failures via [`PipelineError::ProviderRetryable`] /
/// [`PipelineError::ProviderFatal`].
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aws_access_key_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aws_secret_access_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Deserialize)]
struct WireChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireErrorBody {
    #[serde(default)]
    error: Option<Value>,
}

/// Talks to a litellm-style OpenAI-compatible `/chat/completions` endpoint.
pub struct HttpProviderClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProviderClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let wire = WireRequest {
            model: &request.model,
            messages: vec![
                WireMessage { role: "system", content: &request.system_message },
                WireMessage { role: "user", content: &request.user_message },
            ],
            response_format: request.response_format.as_ref(),
            aws_access_key_id: request.aws_credentials.as_ref().map(|c| c.access_key_id.as_str()),
            aws_secret_access_key: request.aws_credentials.as_ref().map(|c| c.secret_access_key.as_str()),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&request.api_key)
            .json(&wire)
            .send()
            .await
            .map_err(|e| PipelineError::ProviderRetryable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::ProviderRetryable(format!("{status}: {body}")));
        }
        if !status.is_success() {
            let body: WireErrorBody = response.json().await.unwrap_or(WireErrorBody { error: None });
            return Err(PipelineError::ProviderFatal(format!(
                "{status}: {}",
                body.error.map(|e| e.to_string()).unwrap_or_default()
            )));
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::ProviderFatal(format!("malformed provider response: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::ProviderFatal("provider returned no choices".to_string()))?;

        let usage = parsed.usage.unwrap_or(WireUsage { prompt_tokens: 0, completion_tokens: 0, total_tokens: 0 });

        Ok(ChatResponse {
            content: choice.message.content,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        })
    }
}
