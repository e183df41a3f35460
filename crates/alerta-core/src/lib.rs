//! Alerta Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout Alerta:
//! - Source records coming from the news pipeline and stored documents
//! - Conversation turns and the grounded prompt handed to the LLM
//! - Common error types
//! - Gateway traits for embedding and generation services
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, ConfigError, IndexConfig, LlmConfig, LlmProvider, LoggingConfig, RagConfig,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for Alerta operations
#[derive(Error, Debug)]
pub enum AlertaError {
    /// Embedding or generation service unavailable, rate limited,
    /// or returned something that could not be decoded
    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Length mismatch: {vectors} vectors for {documents} documents")]
    LengthMismatch { vectors: usize, documents: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AlertaError {
    /// Whether the error came from an external service rather than from input
    pub fn is_gateway(&self) -> bool {
        matches!(self, Self::Gateway(_))
    }
}

pub type Result<T> = std::result::Result<T, AlertaError>;

/// Open mapping of auxiliary fields (title, url, severity, coordinates...)
pub type Meta = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Records and Documents
// ============================================================================

/// Maximum characters kept when a non-object payload is used as summary
const FALLBACK_SUMMARY_CHARS: usize = 200;

/// Which build flow produced a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSource {
    /// Summarized news article
    #[default]
    News,
    /// Flattened row of an uploaded table
    Table,
}

/// A record handed over by an upstream collaborator, not yet indexed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Text that will be embedded
    pub summary: String,

    /// Auxiliary fields, stored and returned unchanged
    #[serde(default)]
    pub meta: Meta,

    /// Build flow the record comes from
    #[serde(default)]
    pub source: DocumentSource,

    /// Set when the upstream payload had no usable summary
    #[serde(skip)]
    pub malformed: bool,
}

impl SourceRecord {
    /// Create a news record
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            meta: Meta::new(),
            source: DocumentSource::News,
            malformed: false,
        }
    }

    /// Attach a metadata field
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Set the build flow
    pub fn with_source(mut self, source: DocumentSource) -> Self {
        self.source = source;
        self
    }

    /// Interpret an arbitrary upstream JSON value as a record
    ///
    /// Objects keep all their fields as `meta`. A missing or non-string
    /// `summary` degrades to an empty summary and flags the record. Bare
    /// strings become the summary; anything else is stringified.
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(meta) => {
                let summary = meta.get("summary").and_then(|s| s.as_str()).map(str::to_owned);
                let malformed = summary.is_none();
                if malformed {
                    tracing::warn!(
                        fields = meta.len(),
                        "Upstream record has no string `summary`, substituting empty text"
                    );
                }
                Self {
                    summary: summary.unwrap_or_default(),
                    meta,
                    source: DocumentSource::News,
                    malformed,
                }
            }
            serde_json::Value::String(summary) => Self::new(summary),
            other => {
                tracing::warn!("Upstream record is not an object, using its JSON text as summary");
                let summary = other.to_string().chars().take(FALLBACK_SUMMARY_CHARS).collect::<String>();
                Self {
                    malformed: true,
                    ..Self::new(summary)
                }
            }
        }
    }

    /// Parse a JSON array (or a single value) of upstream records
    pub fn parse_many(json: &str) -> Result<Vec<Self>> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| AlertaError::Validation(format!("Invalid records JSON: {e}")))?;

        let records = match value {
            serde_json::Value::Array(items) => items.into_iter().map(Self::from_value).collect(),
            single => vec![Self::from_value(single)],
        };
        Ok(records)
    }

    /// Whether the summary carries any embeddable text
    pub fn is_blank(&self) -> bool {
        self.summary.trim().is_empty()
    }
}

/// A unit of retrievable text stored in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Position in the index, assigned at insertion
    pub id: u64,

    /// The text that was embedded
    pub summary: String,

    /// Auxiliary fields, never used for similarity
    pub meta: Meta,

    /// Build flow the document comes from
    pub source: DocumentSource,
}

impl Document {
    /// Materialize a record at the given index position
    pub fn from_record(id: u64, record: SourceRecord) -> Self {
        Self {
            id,
            summary: record.summary,
            meta: record.meta,
            source: record.source,
        }
    }

    /// Title from the metadata, if any
    pub fn title(&self) -> Option<&str> {
        self.meta.get("title").and_then(|t| t.as_str())
    }
}

// ============================================================================
// Conversation Types
// ============================================================================

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of the conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A message in the wire shape shared by chat-completion APIs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

/// Grounded prompt: system instruction, trailing history and the new user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Fixed system instruction
    pub system: String,

    /// Trailing history window, oldest first
    pub history: Vec<ChatTurn>,

    /// Context plus question
    pub user: String,
}

impl Prompt {
    /// Flatten into chat messages: system, history, then user
    pub fn to_messages(&self) -> Vec<PromptMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(PromptMessage {
            role: "system".to_string(),
            content: self.system.clone(),
        });
        messages.extend(self.history.iter().map(|turn| PromptMessage {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        }));
        messages.push(PromptMessage {
            role: "user".to_string(),
            content: self.user.clone(),
        });
        messages
    }

    /// Total characters across all messages
    pub fn char_len(&self) -> usize {
        self.system.chars().count()
            + self.history.iter().map(|t| t.content.chars().count()).sum::<usize>()
            + self.user.chars().count()
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for embedding generation
#[async_trait::async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Get embedding dimension
    fn dimension(&self) -> usize;
}

#[async_trait::async_trait]
impl<T: EmbeddingClient + ?Sized> EmbeddingClient for Box<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts).await
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }
}

/// Trait for LLM clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response for a grounded prompt
    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}

// ============================================================================
// Tests
// ============================================================================
