//! Alerta Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// LLM and embedding provider configuration
    pub llm: LlmConfig,

    /// Index construction configuration
    pub index: IndexConfig,

    /// Retrieval and answering configuration
    pub rag: RagConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    /// Apply every recognised variable found by `lookup`
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        // LLM
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.llm.openai_base_url = Some(url);
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.llm.ollama_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.llm.embedding_model = model;
        }

        // Index
        if let Some(value) = lookup("EMBEDDING_CONCURRENCY") {
            self.index.embedding_concurrency = parse_value("EMBEDDING_CONCURRENCY", value)?;
        }

        // RAG
        if let Some(value) = lookup("RAG_TOP_K") {
            self.rag.top_k = parse_value("RAG_TOP_K", value)?;
        }
        if let Some(value) = lookup("RAG_MMR_LAMBDA") {
            let lambda: f32 = parse_value("RAG_MMR_LAMBDA", value.clone())?;
            if !(0.0..=1.0).contains(&lambda) {
                return Err(ConfigError::InvalidValue {
                    key: "RAG_MMR_LAMBDA".to_string(),
                    value,
                });
            }
            self.rag.mmr_lambda = lambda;
        }
        if let Some(value) = lookup("RAG_CANDIDATE_POOL") {
            self.rag.candidate_pool = Some(parse_value("RAG_CANDIDATE_POOL", value)?);
        }
        if let Some(value) = lookup("RAG_HISTORY_MESSAGES") {
            self.rag.history_messages = parse_value("RAG_HISTORY_MESSAGES", value)?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    pub openai_base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name to use
    pub model: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            openai_api_key: None,
            openai_base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            max_tokens: 1024,
            temperature: 0.2,
            timeout_secs: 60,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Ollama,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Index construction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Maximum outstanding embedding requests during a batch build
    pub embedding_concurrency: usize,

    /// Maximum entries kept by the embedding cache
    pub cache_max_capacity: u64,

    /// Time-to-live for embedding cache entries (in seconds)
    pub cache_ttl_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            embedding_concurrency: 8,
            cache_max_capacity: 10_000,
            cache_ttl_secs: 3600,
        }
    }
}

/// Retrieval and answering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Number of documents selected per question
    pub top_k: usize,

    /// MMR trade-off: 1.0 is pure relevance, 0.0 pure diversity
    pub mmr_lambda: f32,

    /// Candidate pool size before MMR (None = full index)
    pub candidate_pool: Option<usize>,

    /// Trailing history messages sent with each question
    pub history_messages: usize,

    /// Maximum context length (characters)
    pub max_context_length: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            mmr_lambda: 0.5,
            candidate_pool: None,
            history_messages: 4,
            max_context_length: 8000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.rag.top_k, 5);
        assert_eq!(config.rag.mmr_lambda, 0.5);
        assert_eq!(config.rag.history_messages, 4);
        assert!(config.rag.candidate_pool.is_none());
        assert_eq!(config.index.embedding_concurrency, 8);
        assert_eq!(config.llm.embedding_model, "text-embedding-3-small");
    }

    #[test]
    fn test_llm_provider_parse() {
        assert_eq!(
            "openai".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenAI
        );
        assert_eq!(
            "Ollama".parse::<LlmProvider>().unwrap(),
            LlmProvider::Ollama
        );
        assert!("invalid".parse::<LlmProvider>().is_err());
        // only OpenAI-compatible and Ollama endpoints are spoken
        assert!("azure".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_env_values_applied() {
        let mut config = AppConfig::default();
        config
            .apply_env(lookup_from(&[
                ("LLM_PROVIDER", "ollama"),
                ("RAG_TOP_K", "3"),
                ("RAG_MMR_LAMBDA", "0.7"),
                ("RAG_CANDIDATE_POOL", "50"),
                ("EMBEDDING_CONCURRENCY", "2"),
            ]))
            .unwrap();

        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.rag.top_k, 3);
        assert!((config.rag.mmr_lambda - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.rag.candidate_pool, Some(50));
        assert_eq!(config.index.embedding_concurrency, 2);
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(lookup_from(&[("RAG_MMR_LAMBDA", "1.5")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = config
            .apply_env(lookup_from(&[("RAG_TOP_K", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "RAG_TOP_K"));
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [rag]
            top_k = 2
            mmr_lambda = 1.0

            [logging]
            json_format = true
            "#,
        )
        .unwrap();

        assert_eq!(config.rag.top_k, 2);
        assert_eq!(config.rag.history_messages, 4);
        assert!(config.logging.json_format);
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }
}
