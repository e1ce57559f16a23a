use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use relay_core::config::CompletionConfig;

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// OpenAI-compatible `chat/completions` client (OpenRouter by default).
///
/// Adds the `HTTP-Referer` / `X-Title` pair OpenRouter uses to identify the
/// calling application. Every request is bounded by the configured timeout.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    referer: String,
    app_title: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(
        api_key: String,
        endpoint: String,
        referer: String,
        app_title: String,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            endpoint,
            referer,
            app_title,
            timeout,
        })
    }

    pub fn from_config(config: &CompletionConfig) -> Result<Self, ProviderError> {
        Self::new(
            config.api_key.clone(),
            config.endpoint.clone(),
            config.referer.clone(),
            config.app_title.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn map_transport(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout {
                ms: self.timeout.as_millis() as u64,
            }
        } else {
            ProviderError::Http(e)
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        debug!(model = %req.model, turns = req.messages.len(), "sending completion request");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.app_title)
            .json(req)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| self.map_transport(e))?;

        if !(200..300).contains(&status) {
            warn!(status, body = %text, "completion API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        debug!(body = %text, "completion API response");

        let api_resp: ApiResponse =
            serde_json::from_str(&text).map_err(|e| ProviderError::Parse(e.to_string()))?;

        parse_response(api_resp, &req.model)
    }
}

fn parse_response(resp: ApiResponse, requested_model: &str) -> Result<ChatResponse, ProviderError> {
    let choice = resp.choices.into_iter().next().ok_or_else(|| {
        ProviderError::MalformedResponse("response has no choices".to_string())
    })?;

    let content = choice
        .message
        .and_then(|m| m.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| {
            ProviderError::MalformedResponse("choices[0].message.content is missing".to_string())
        })?;

    Ok(ChatResponse {
        content,
        model: resp.model.unwrap_or_else(|| requested_model.to_string()),
        tokens_in: resp.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
        tokens_out: resp.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0),
        stop_reason: choice.finish_reason.unwrap_or_default(),
    })
}

// Completion response types (private, deserialization only). Every field is
// optional so a partial body surfaces as MalformedResponse instead of Parse.

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    use relay_core::types::ConversationTurn;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::provider::SamplingParams;

    fn provider(server: &MockServer, timeout: Duration) -> OpenAiProvider {
        OpenAiProvider::new(
            "sk-test".into(),
            format!("{}/api/v1/chat/completions", server.uri()),
            "https://example.com/bot".into(),
            "Test-Bot".into(),
            timeout,
        )
        .unwrap()
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "qwen/qwen3-1.7b:free".into(),
            messages: vec![
                ConversationTurn::system("be helpful"),
                ConversationTurn::user("Hello"),
            ],
            sampling: SamplingParams::default(),
        }
    }

    #[tokio::test]
    async fn sends_auth_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("http-referer", "https://example.com/bot"))
            .and(header("x-title", "Test-Bot"))
            .and(body_partial_json(json!({
                "model": "qwen/qwen3-1.7b:free",
                "max_tokens": 4096,
                "messages": [
                    { "role": "system", "content": "be helpful" },
                    { "role": "user", "content": "Hello" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "qwen/qwen3-1.7b:free",
                "choices": [{
                    "message": { "role": "assistant", "content": "Hi there!" },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 12, "completion_tokens": 3 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = provider(&server, Duration::from_secs(5))
            .send(&request())
            .await
            .unwrap();
        assert_eq!(resp.content, "Hi there!");
        assert_eq!(resp.tokens_in, 12);
        assert_eq!(resp.tokens_out, 3);
        assert_eq!(resp.stop_reason, "stop");
    }

    #[tokio::test]
    async fn missing_content_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant" } }]
            })))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .send(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)), "{err:?}");
    }

    #[tokio::test]
    async fn empty_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .send(&request())
            .await
            .unwrap_err();
        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn non_json_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .send(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn http_error_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .send(&request())
            .await
            .unwrap_err();
        match err {
            ProviderError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid key");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_millis(100))
            .send(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { ms: 100 }), "{err:?}");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_http_error() {
        let p = OpenAiProvider::new(
            "k".into(),
            "http://127.0.0.1:9/v1/chat/completions".into(),
            "r".into(),
            "t".into(),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = p.send(&request()).await.unwrap_err();
        assert!(!err.is_malformed());
    }
}
