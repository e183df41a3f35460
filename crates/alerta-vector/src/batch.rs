//! Bounded concurrent batch embedding

use alerta_core::{EmbeddingClient, Result};
use futures::stream::{self, StreamExt, TryStreamExt};

/// Embed every text with at most `concurrency` requests in flight
///
/// Results come back in input order. The first gateway error aborts the
/// batch; vectors already received are discarded.
pub async fn embed_all(
    client: &dyn EmbeddingClient,
    texts: &[String],
    concurrency: usize,
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let limit = concurrency.max(1);
    tracing::debug!(texts = texts.len(), limit, "Embedding batch");

    stream::iter(texts.iter().map(|text| client.embed(text)))
        .buffered(limit)
        .try_collect()
        .await
}
