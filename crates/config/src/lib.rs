//! Configuration loading, validation, and management for aegent.
//!
//! Loads configuration from `~/.aegent/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use aegent_core::provider::ModelKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.aegent/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model family used when none is selected explicitly
    #[serde(default = "default_model")]
    pub default_model: ModelKind,

    /// Sampling temperature for agent turns
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-provider credentials and model ids
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Agent loop limits and capabilities
    #[serde(default)]
    pub agent: AgentSettings,

    /// Documentation search backend
    #[serde(default)]
    pub search: SearchConfig,

    /// Host scripting bridge
    #[serde(default)]
    pub bridge: BridgeConfig,
}

fn default_model() -> ModelKind {
    ModelKind::Gemini
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub gemini: ProviderConfig,

    #[serde(default)]
    pub openai: ProviderConfig,

    #[serde(default)]
    pub claude: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ModelKind) -> &ProviderConfig {
        match kind {
            ModelKind::Gemini => &self.gemini,
            ModelKind::OpenAi => &self.openai,
            ModelKind::Claude => &self.claude,
        }
    }

    pub fn get_mut(&mut self, kind: ModelKind) -> &mut ProviderConfig {
        match kind {
            ModelKind::Gemini => &mut self.gemini,
            ModelKind::OpenAi => &mut self.openai,
            ModelKind::Claude => &mut self.claude,
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Default concrete model id for each family.
pub fn default_model_id(kind: ModelKind) -> &'static str {
    match kind {
        ModelKind::Gemini => "gemini-2.0-flash",
        ModelKind::OpenAi => "gpt-4o",
        ModelKind::Claude => "claude-3-5-sonnet-latest",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Hard ceiling on executed tool calls per user request
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: usize,

    /// Ceiling on completion round-trips per user request
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Messages kept in conversation history
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Messages of history rendered into each prompt
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Stream completion text as it arrives
    #[serde(default)]
    pub streaming: bool,

    /// Offer the `search_docs` tool to the model
    #[serde(default = "default_true")]
    pub doc_search: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

fn default_max_tool_calls() -> usize {
    25
}
fn default_max_iterations() -> usize {
    30
}
fn default_history_limit() -> usize {
    20
}
fn default_history_window() -> usize {
    6
}
fn default_true() -> bool {
    true
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_tool_calls: default_max_tool_calls(),
            max_iterations: default_max_iterations(),
            history_limit: default_history_limit(),
            history_window: default_history_window(),
            streaming: false,
            doc_search: true,
            system_prompt_override: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_url")]
    pub url: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_top_k_per_query")]
    pub top_k_per_query: usize,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,

    /// Snippets rendered into a documentation answer
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,

    /// Characters of content used as the dedup fingerprint
    #[serde(default = "default_dedup_prefix_len")]
    pub dedup_prefix_len: usize,

    /// Snippets shorter than this are discarded as noise
    #[serde(default = "default_min_content_len")]
    pub min_content_len: usize,
}

fn default_search_url() -> String {
    "http://localhost:5002".into()
}
fn default_top_k() -> usize {
    5
}
fn default_top_k_per_query() -> usize {
    3
}
fn default_search_timeout() -> u64 {
    30
}
fn default_health_timeout() -> u64 {
    3
}
fn default_max_sources() -> usize {
    6
}
fn default_dedup_prefix_len() -> usize {
    200
}
fn default_min_content_len() -> usize {
    50
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
            top_k: default_top_k(),
            top_k_per_query: default_top_k_per_query(),
            timeout_secs: default_search_timeout(),
            health_timeout_secs: default_health_timeout(),
            max_sources: default_max_sources(),
            dedup_prefix_len: default_dedup_prefix_len(),
            min_content_len: default_min_content_len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_bridge_url")]
    pub url: String,

    #[serde(default = "default_bridge_timeout")]
    pub timeout_secs: u64,

    /// JSON or TOML file describing the host tool catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
}

fn default_bridge_url() -> String {
    "http://localhost:5005".into()
}
fn default_bridge_timeout() -> u64 {
    60
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
            timeout_secs: default_bridge_timeout(),
            catalog_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.aegent/config.toml).
    ///
    /// Environment variables override file values:
    /// - `AEGENT_MODEL`
    /// - `GEMINI_API_KEY`, `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`
    /// - `AEGENT_SEARCH_URL`, `AEGENT_BRIDGE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup function.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(model) = lookup("AEGENT_MODEL") {
            self.default_model = model
                .parse()
                .map_err(ConfigError::ValidationError)?;
        }

        let keys = [
            (ModelKind::Gemini, "GEMINI_API_KEY"),
            (ModelKind::OpenAi, "OPENAI_API_KEY"),
            (ModelKind::Claude, "ANTHROPIC_API_KEY"),
        ];
        for (kind, var) in keys {
            let provider = self.providers.get_mut(kind);
            if provider.api_key.is_none() {
                provider.api_key = lookup(var);
            }
        }

        if let Some(url) = lookup("AEGENT_SEARCH_URL") {
            self.search.url = url;
        }
        if let Some(url) = lookup("AEGENT_BRIDGE_URL") {
            self.bridge.url = url;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".aegent")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_tool_calls == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_calls must be > 0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be > 0".into(),
            ));
        }

        if self.search.dedup_prefix_len == 0 {
            return Err(ConfigError::ValidationError(
                "search.dedup_prefix_len must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available for the given model family.
    pub fn has_api_key(&self, kind: ModelKind) -> bool {
        self.providers.get(kind).api_key.is_some()
    }

    /// The concrete model id for a family (configured or default).
    pub fn model_id(&self, kind: ModelKind) -> String {
        self.providers
            .get(kind)
            .model
            .clone()
            .unwrap_or_else(|| default_model_id(kind).to_string())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            providers: ProvidersConfig::default(),
            agent: AgentSettings::default(),
            search: SearchConfig::default(),
            bridge: BridgeConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_model, ModelKind::Gemini);
        assert_eq!(config.agent.max_tool_calls, 25);
        assert_eq!(config.search.dedup_prefix_len, 200);
        assert_eq!(config.search.min_content_len, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.search.url, config.search.url);
        assert_eq!(parsed.agent.max_iterations, config.agent.max_iterations);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_tool_call_ceiling_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_tool_calls = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().default_model, ModelKind::Gemini);
    }

    #[test]
    fn load_from_file_with_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_model = "claude"

[providers.claude]
api_key = "sk-ant-test"
model = "claude-3-opus"

[agent]
max_tool_calls = 10
streaming = true

[search]
url = "http://docs.local:9000"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_model, ModelKind::Claude);
        assert!(config.has_api_key(ModelKind::Claude));
        assert!(!config.has_api_key(ModelKind::Gemini));
        assert_eq!(config.model_id(ModelKind::Claude), "claude-3-opus");
        assert_eq!(config.model_id(ModelKind::OpenAi), "gpt-4o");
        assert_eq!(config.agent.max_tool_calls, 10);
        assert_eq!(config.agent.max_iterations, 30);
        assert!(config.agent.streaming);
        assert_eq!(config.search.url, "http://docs.local:9000");
        assert_eq!(config.search.top_k, 5);
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_model = [").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AEGENT_MODEL", "openai"),
            ("OPENAI_API_KEY", "sk-env"),
            ("AEGENT_SEARCH_URL", "http://search:1"),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.default_model, ModelKind::OpenAi);
        assert_eq!(config.providers.openai.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.search.url, "http://search:1");
        assert_eq!(config.bridge.url, "http://localhost:5005");
    }

    #[test]
    fn env_does_not_replace_file_key() {
        let mut config = AppConfig::default();
        config.providers.gemini.api_key = Some("from-file".into());
        config
            .apply_env_overrides(|k| (k == "GEMINI_API_KEY").then(|| "from-env".to_string()))
            .unwrap();
        assert_eq!(config.providers.gemini.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn bad_model_in_env_is_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(|k| (k == "AEGENT_MODEL").then(|| "llama".to_string()));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn debug_redacts_api_keys() {
        let mut config = AppConfig::default();
        config.providers.openai.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini"));
        assert!(toml_str.contains("localhost:5002"));
    }
}
