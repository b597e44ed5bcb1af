//! Configuration management.

use serde::Deserialize;
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Expands environment variable references in a string.
///
/// Supports `${VAR_NAME}` syntax. If the variable is not set, the original
/// reference is preserved (e.g., `${MISSING_VAR}` stays as-is).
///
/// Uses `Cow<str>` to avoid allocation when no expansion is needed.
fn expand_env_vars(input: &str) -> Cow<'_, str> {
    // Fast path: no ${} pattern at all
    if !input.contains("${") {
        return Cow::Borrowed(input);
    }

    let mut result = input.to_string();
    let mut start = 0;

    while let Some(var_start) = result[start..].find("${") {
        let var_start = start + var_start;
        if let Some(var_end) = result[var_start..].find('}') {
            let var_end = var_start + var_end;
            let var_name = result[var_start + 2..var_end].to_string();
            if let Ok(value) = std::env::var(&var_name) {
                result.replace_range(var_start..=var_end, &value);
                start = var_start + value.len();
            } else {
                start = var_end + 1;
            }
        } else {
            break;
        }
    }

    Cow::Owned(result)
}

/// Main configuration for collegue.
#[derive(Debug, Clone, Default)]
pub struct CollegueConfig {
    /// Directory for persisted session contexts. `None` keeps sessions
    /// in memory only.
    pub storage_dir: Option<PathBuf>,
    /// LLM provider configuration.
    pub llm: LlmConfig,
    /// Default hard timeout for the test runner, in seconds.
    pub test_timeout_secs: Option<u64>,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Config files that were loaded (for debugging).
    pub config_sources: Vec<PathBuf>,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible endpoint.
    pub endpoint: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key; `${ENV_VAR}` references are expanded at load time.
    pub api_key: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
}

/// Logging configuration settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// Log format ("json" or "pretty").
    pub format: Option<String>,
    /// Log level (e.g. "info").
    pub level: Option<String>,
    /// Full filter override (e.g. "collegue=debug,hyper=info").
    pub filter: Option<String>,
}

/// On-disk configuration file shape (`collegue.toml`).
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    storage_dir: Option<String>,
    test_timeout_secs: Option<u64>,
    #[serde(default)]
    llm: LlmConfig,
    #[serde(default)]
    logging: LoggingSettings,
}

impl CollegueConfig {
    /// Loads configuration from a TOML file, applying `${ENV}` expansion
    /// and environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
            operation: "config_read".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        let file: ConfigFile =
            toml::from_str(&content).map_err(|e| crate::Error::OperationFailed {
                operation: "config_parse".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;

        let mut config = Self::from_file(file);
        config.config_sources.push(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    /// Builds a configuration from environment variables only.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn from_file(file: ConfigFile) -> Self {
        Self {
            storage_dir: file
                .storage_dir
                .map(|dir| PathBuf::from(expand_env_vars(&dir).into_owned())),
            llm: LlmConfig {
                api_key: file
                    .llm
                    .api_key
                    .map(|key| expand_env_vars(&key).into_owned()),
                ..file.llm
            },
            test_timeout_secs: file.test_timeout_secs,
            logging: file.logging,
            config_sources: Vec::new(),
        }
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("COLLEGUE_STORAGE_DIR") {
            if !dir.is_empty() {
                self.storage_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(endpoint) = std::env::var("COLLEGUE_LLM_ENDPOINT") {
            if !endpoint.is_empty() {
                self.llm.endpoint = Some(endpoint);
            }
        }
        if let Ok(model) = std::env::var("COLLEGUE_LLM_MODEL") {
            if !model.is_empty() {
                self.llm.model = Some(model);
            }
        }
        if let Ok(key) = std::env::var("COLLEGUE_LLM_API_KEY") {
            if !key.is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Some(timeout_ms) = std::env::var("COLLEGUE_LLM_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.llm.timeout_ms = Some(timeout_ms);
        }
        self
    }

    /// Sets the session storage directory.
    #[must_use]
    pub fn with_storage_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_no_pattern() {
        let input = "plain value";
        assert!(matches!(expand_env_vars(input), Cow::Borrowed(_)));
    }

    #[test]
    fn test_expand_env_vars_missing_preserved() {
        let expanded = expand_env_vars("${COLLEGUE_TEST_DEFINITELY_MISSING}");
        assert_eq!(expanded, "${COLLEGUE_TEST_DEFINITELY_MISSING}");
    }

    #[test]
    fn test_config_file_parse() {
        let toml_src = r#"
storage_dir = "/tmp/collegue-sessions"
test_timeout_secs = 120

[llm]
endpoint = "http://localhost:1234/v1"
model = "local-model"

[logging]
level = "debug"
"#;
        let file: ConfigFile = toml::from_str(toml_src).expect("parse config");
        let config = CollegueConfig::from_file(file);
        assert_eq!(
            config.storage_dir.as_deref(),
            Some(Path::new("/tmp/collegue-sessions"))
        );
        assert_eq!(config.test_timeout_secs, Some(120));
        assert_eq!(config.llm.model.as_deref(), Some("local-model"));
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
    }
}
