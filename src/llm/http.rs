//! OpenAI-compatible HTTP provider.
//!
//! Works against any endpoint speaking the `/chat/completions` shape:
//! hosted gateways as well as local servers (LM Studio, Ollama's
//! compatibility mode, vLLM).

use super::{build_http_client, LlmHttpConfig, LlmProvider};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct HttpProvider {
    /// API endpoint base (e.g. `http://localhost:1234/v1`).
    endpoint: String,
    /// Model to use.
    model: Option<String>,
    /// Optional bearer token.
    api_key: Option<String>,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl HttpProvider {
    /// Creates a provider for the given endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: None,
            api_key: None,
            client: build_http_client(LlmHttpConfig::default()),
        }
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: LlmHttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    /// Checks whether the endpoint answers.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/models", self.endpoint))
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn request(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let model = self
            .model
            .clone()
            .unwrap_or_else(|| "local-model".to_string());
        let request = ChatCompletionRequest {
            model: model.clone(),
            messages,
            max_tokens: Some(2048),
            temperature: Some(0.7),
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.json(&request).send().map_err(|e| {
            let error_kind = if e.is_timeout() {
                "timeout"
            } else if e.is_connect() {
                "connect"
            } else if e.is_request() {
                "request"
            } else {
                "unknown"
            };
            tracing::error!(
                provider = "http",
                model = %model,
                error = %e,
                error_kind = error_kind,
                "LLM request failed"
            );
            Error::ExternalService {
                service: "llm".to_string(),
                cause: format!("{error_kind} error: {e}"),
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            tracing::error!(
                provider = "http",
                model = %model,
                status = %status,
                "LLM API returned error status"
            );
            return Err(Error::ExternalService {
                service: "llm".to_string(),
                cause: format!("API returned status: {status} - {body}"),
            });
        }

        let parsed: ChatCompletionResponse = response.json().map_err(|e| Error::ExternalService {
            service: "llm".to_string(),
            cause: format!("invalid response body: {e}"),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::ExternalService {
                service: "llm".to_string(),
                cause: "response contained no choices".to_string(),
            })
    }
}

impl LlmProvider for HttpProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.request(vec![ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }])
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        self.request(vec![
            ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: user.to_string(),
            },
        ])
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let provider = HttpProvider::new("http://localhost:1234/v1")
            .with_model("test-model")
            .with_api_key("key");
        assert_eq!(provider.name(), "http");
        assert_eq!(provider.model.as_deref(), Some("test-model"));
    }

    #[test]
    fn test_request_shape_serializes() {
        let request = ChatCompletionRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            max_tokens: Some(10),
            temperature: None,
        };
        let json = serde_json::to_string(&request).expect("serialize");
        assert!(json.contains("\"messages\""));
        assert!(!json.contains("temperature"));
    }
}
