//! NLU capability: chat completions for the assisted intake mode
//!
//! `NluBackend` turns a system prompt plus transcript into a free-text reply. The reply may
//! carry one structured report payload; see `crate::payload` for extraction.
//!
//! `ChatCompletionClient` speaks the OpenAI-compatible `/chat/completions` protocol, which
//! Groq serves at `https://api.groq.com/openai/v1`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::NluConfig;
use crate::models::{ChatRole, ChatTurn};

#[async_trait]
pub trait NluBackend: Send + Sync {
    async fn complete(&self, system_prompt: &str, transcript: &[ChatTurn])
        -> Result<String, NluError>;

    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum NluError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing completion in response")]
    MissingCompletion,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },
}

/// Chat completion client configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl ChatConfig {
    /// Reads the API key from `GROQ_API_KEY` when not given.
    pub fn from_config(config: &NluConfig, api_key: Option<String>) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("GROQ_API_KEY").ok())
            .unwrap_or_default();
        Self {
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_seconds),
            max_retries: config.max_retries,
            retry_delay_ms: 500,
        }
    }
}

// ============================================================================
// Chat completion API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionContent,
}

#[derive(Debug, Deserialize)]
struct CompletionContent {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn role_name(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    }
}

// ============================================================================
// ChatCompletionClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    client: Client,
    config: ChatConfig,
}

impl ChatCompletionClient {
    pub fn new(config: ChatConfig) -> Result<Self, NluError> {
        if config.api_key.is_empty() {
            return Err(NluError::MissingApiKey);
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    async fn complete_once(
        &self,
        system_prompt: &str,
        transcript: &[ChatTurn],
    ) -> Result<String, NluError> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(CompletionMessage {
            role: "system",
            content: system_prompt,
        });
        messages.extend(transcript.iter().map(|turn| CompletionMessage {
            role: role_name(turn.role),
            content: &turn.content,
        }));

        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: 0.3,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(body);
            tracing::error!(code = status.as_u16(), message = %message, "NLU API error");
            return Err(NluError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let parsed: CompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(NluError::MissingCompletion)
    }
}

#[async_trait]
impl NluBackend for ChatCompletionClient {
    async fn complete(
        &self,
        system_prompt: &str,
        transcript: &[ChatTurn],
    ) -> Result<String, NluError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(4))
            .map(jitter)
            .take(self.config.max_retries);

        let result = Retry::spawn(retry_strategy, || {
            self.complete_once(system_prompt, transcript)
        })
        .await;

        result.map_err(|e| {
            tracing::error!(
                attempts = self.config.max_retries + 1,
                error = %e,
                "All NLU attempts failed"
            );
            NluError::RetryExhausted {
                attempts: self.config.max_retries + 1,
            }
        })
    }

    fn name(&self) -> &str {
        "chat-completions"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(uri: String, api_key: &str) -> ChatConfig {
        ChatConfig {
            api_key: api_key.to_string(),
            model: "test-model".to_string(),
            base_url: uri,
            timeout: Duration::from_secs(2),
            max_retries: 1,
            retry_delay_ms: 10,
        }
    }

    fn completion(text: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": text } }]
        })
    }

    #[tokio::test]
    async fn test_complete_sends_system_prompt_then_transcript() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "messages": [
                    { "role": "system", "content": "be kind" },
                    { "role": "user", "content": "I lost my phone" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Where?")))
            .mount(&server)
            .await;

        let client = ChatCompletionClient::new(test_config(server.uri(), "test-key")).unwrap();
        let reply = client
            .complete("be kind", &[ChatTurn::user("I lost my phone")])
            .await
            .unwrap();
        assert_eq!(reply, "Where?");
    }

    #[tokio::test]
    async fn test_complete_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "rate limited" }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .mount(&server)
            .await;

        let client = ChatCompletionClient::new(test_config(server.uri(), "k")).unwrap();
        assert_eq!(client.complete("p", &[]).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_complete_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ChatCompletionClient::new(test_config(server.uri(), "k")).unwrap();
        let err = client.complete("p", &[]).await.unwrap_err();
        assert!(matches!(err, NluError::RetryExhausted { attempts: 2 }));
    }

    #[tokio::test]
    async fn test_empty_completion_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
            .mount(&server)
            .await;

        let mut config = test_config(server.uri(), "k");
        config.max_retries = 0;
        let client = ChatCompletionClient::new(config).unwrap();
        assert!(client.complete("p", &[]).await.is_err());
    }

    #[test]
    fn test_missing_api_key() {
        let result = ChatCompletionClient::new(test_config("http://localhost".to_string(), ""));
        assert!(matches!(result, Err(NluError::MissingApiKey)));
    }
}
