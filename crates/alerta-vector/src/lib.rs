//! Alerta Vector - Embedding gateway and vector index
//!
//! Provides the gateway clients that turn text into vectors, a cache and
//! a bounded batch helper in front of them, and the append-only
//! in-memory index searched by inner product.

pub mod batch;
pub mod cache;
pub mod embedding;
pub mod index;

pub use batch::embed_all;
pub use cache::CachedEmbedding;
pub use embedding::{create_embedding_client, OllamaEmbedding, OpenAiEmbedding};
pub use index::{dot, IndexHandle, Neighbor, VectorIndex};
