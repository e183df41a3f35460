//! Alerta RAG - Retrieval-Augmented Generation over disaster news
//!
//! This crate turns records into an index and questions into grounded answers:
//! - Index construction from news records and uploaded tables
//! - Maximal Marginal Relevance selection of references
//! - Grounded prompts with a trailing conversation window
//! - LLM gateways for OpenAI-compatible APIs and Ollama

pub mod builder;
pub mod history;
pub mod llm;
pub mod mmr;
pub mod prompt;
pub mod responder;

pub use builder::{table_records, BuildReport, IndexBuilder};
pub use history::{append_exchange, trailing_window};
pub use llm::{create_llm_client, OllamaClient, OpenAiClient};
pub use mmr::{mmr_indices, mmr_select, MmrSelection, DEFAULT_LAMBDA};
pub use prompt::{
    assemble_context, PromptBuilder, EMPTY_CONTEXT_MARKER, NO_CONTEXT_ANSWER, SYSTEM_INSTRUCTION,
};
pub use responder::{extract_citations, select_references, Answer, Reference, Responder};
