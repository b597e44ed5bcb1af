//! LLM client abstraction.
//!
//! Content tools and deep-analysis paths consume LLMs exclusively through
//! [`LlmProvider`] and [`LlmManager`]. Every consumer carries a
//! deterministic local fallback, so a missing or failing provider never
//! turns into a failed tool response — see [`with_llm_fallback`].
//!
//! # Configuration
//!
//! ```toml
//! [llm]
//! endpoint = "http://localhost:1234/v1"
//! model = "local-model"
//! timeout_ms = 30000
//! ```

mod http;

pub use http::HttpProvider;

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Trait for LLM providers.
pub trait LlmProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Generates a completion for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Generates a completion with a system prompt.
    ///
    /// Default implementation concatenates system and user prompts.
    /// Providers should override this to use native system prompt support.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        let combined = format!("{system}\n\n---\n\nUser message:\n{user}");
        self.complete(&combined)
    }
}

/// HTTP client configuration for LLM providers.
#[derive(Debug, Clone, Copy)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from the crate config.
    #[must_use]
    pub fn from_config(config: &crate::config::LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(timeout_ms) = config.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = config.connect_timeout_ms {
            settings.connect_timeout_ms = connect_timeout_ms;
        }
        settings
    }
}

/// Builds a blocking HTTP client for LLM requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Manager wrapping a provider with typed-output helpers.
///
/// Cloneable and cheap to share; tools receive it by injection.
#[derive(Clone)]
pub struct LlmManager {
    provider: Arc<dyn LlmProvider>,
}

impl std::fmt::Debug for LlmManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmManager")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl LlmManager {
    /// Wraps a provider.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Builds a manager from configuration, when an endpoint is set.
    #[must_use]
    pub fn from_config(config: &crate::config::LlmConfig) -> Option<Self> {
        let endpoint = config.endpoint.clone()?;
        let mut provider = HttpProvider::new(endpoint).with_http_config(LlmHttpConfig::from_config(config));
        if let Some(model) = &config.model {
            provider = provider.with_model(model.clone());
        }
        if let Some(api_key) = &config.api_key {
            provider = provider.with_api_key(api_key.clone());
        }
        Some(Self::new(Arc::new(provider)))
    }

    /// The underlying provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Generates raw text, optionally with a system prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails.
    pub fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String> {
        match system_prompt {
            Some(system) => self.provider.complete_with_system(system, prompt),
            None => self.provider.complete(prompt),
        }
    }

    /// Generates a completion and parses it as typed JSON.
    ///
    /// Handles markdown code fences and surrounding prose in the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails or the response is not
    /// valid JSON for `T`.
    pub fn generate_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<T> {
        let response = self.generate(prompt, system_prompt)?;
        parse_json_response(&response)
    }
}

/// Parses a typed value out of an LLM response.
///
/// # Errors
///
/// Returns an error when no valid JSON for `T` can be extracted.
pub fn parse_json_response<T: DeserializeOwned>(response: &str) -> Result<T> {
    let json_str = extract_json_from_response(response);
    serde_json::from_str(json_str).map_err(|e| {
        let preview: String = response.chars().take(200).collect();
        Error::ExternalService {
            service: "llm".to_string(),
            cause: format!("invalid JSON: {e}. Response: {preview}"),
        }
    })
}

/// Extracts JSON from an LLM response, handling markdown code blocks.
///
/// # Handling
///
/// 1. Markdown code blocks with `json` language marker
/// 2. Markdown code blocks without language marker
/// 3. Raw JSON objects (first `{` to last `}`)
/// 4. JSON arrays (first `[` to last `]`)
#[must_use]
pub fn extract_json_from_response(response: &str) -> &str {
    let trimmed = response.trim();

    // Handle ```json ... ``` blocks
    if let Some((json_start, end)) = trimmed.find("```json").and_then(|start| {
        let json_start = start + 7;
        trimmed[json_start..]
            .find("```")
            .map(|end| (json_start, end))
    }) {
        return trimmed[json_start..json_start + end].trim();
    }

    // Handle ``` ... ``` blocks (without json marker)
    if let Some((json_start, end)) = trimmed.find("```").and_then(|start| {
        let content_start = start + 3;
        let after_marker = &trimmed[content_start..];
        let json_start = after_marker
            .find('{')
            .map_or(content_start, |pos| content_start + pos);
        trimmed[json_start..]
            .find("```")
            .map(|end| (json_start, end))
    }) {
        return trimmed[json_start..json_start + end].trim();
    }

    // Handle raw JSON (find first { to last })
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }

    // Handle JSON arrays
    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

/// Runs an LLM-backed path with a deterministic local fallback.
///
/// When no manager is available, or prompt generation/parsing fails at any
/// step, the fallback result is returned and the failure is only logged.
pub fn with_llm_fallback<T>(
    llm_manager: Option<&LlmManager>,
    build_prompt: impl FnOnce() -> String,
    parse_output: impl FnOnce(&str) -> Result<T>,
    local_fallback: impl FnOnce() -> T,
) -> T {
    let Some(manager) = llm_manager else {
        tracing::debug!("no LLM manager available, using local fallback");
        return local_fallback();
    };

    let prompt = build_prompt();
    match manager.generate(&prompt, None) {
        Ok(response) => match parse_output(&response) {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(error = %err, "LLM output parsing failed, using local fallback");
                local_fallback()
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, "LLM generation failed, using local fallback");
            crate::observability::metrics::record_external_service_error("llm");
            local_fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    struct StaticProvider(&'static str);

    impl LlmProvider for StaticProvider {
        fn name(&self) -> &'static str {
            "static"
        }

        fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingProvider;

    impl LlmProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn complete(&self, _prompt: &str) -> Result<String> {
            Err(Error::ExternalService {
                service: "llm".to_string(),
                cause: "offline".to_string(),
            })
        }
    }

    #[test]
    fn test_extract_json_raw() {
        let response = r#"{"key": "value"}"#;
        assert_eq!(extract_json_from_response(response), r#"{"key": "value"}"#);
    }

    #[test]
    fn test_extract_json_markdown() {
        let response = "```json\n{\"key\": \"value\"}\n```";
        assert!(extract_json_from_response(response).contains("\"key\""));
    }

    #[test]
    fn test_extract_json_with_prefix() {
        let response = "Here is the result: {\"key\": \"value\"} hope this helps";
        assert_eq!(extract_json_from_response(response), r#"{"key": "value"}"#);
    }

    #[test]
    fn test_extract_json_array() {
        let response = r#"["tag1", "tag2"]"#;
        assert_eq!(extract_json_from_response(response), r#"["tag1", "tag2"]"#);
    }

    #[derive(Deserialize)]
    struct Typed {
        score: f64,
    }

    #[test]
    fn test_generate_json_typed() {
        let manager = LlmManager::new(Arc::new(StaticProvider(r#"{"score": 0.9}"#)));
        let typed: Typed = manager.generate_json("prompt", None).expect("typed");
        assert!((typed.score - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fallback_without_manager() {
        let result = with_llm_fallback(
            None,
            || "prompt".to_string(),
            |_| Ok(1),
            || 42,
        );
        assert_eq!(result, 42);
    }

    #[test]
    fn test_fallback_on_provider_error() {
        let manager = LlmManager::new(Arc::new(FailingProvider));
        let result = with_llm_fallback(
            Some(&manager),
            || "prompt".to_string(),
            |_| Ok(1),
            || 42,
        );
        assert_eq!(result, 42);
    }

    #[test]
    fn test_fallback_on_parse_error() {
        let manager = LlmManager::new(Arc::new(StaticProvider("not json at all")));
        let result = with_llm_fallback(
            Some(&manager),
            || "prompt".to_string(),
            |raw| parse_json_response::<Typed>(raw).map(|t| t.score),
            || -1.0,
        );
        assert!((result + 1.0).abs() < f64::EPSILON);
    }
}
