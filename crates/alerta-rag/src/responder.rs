//! Retrieval-augmented responder
//!
//! Answers one question against an [`IndexHandle`]: embed the question,
//! select references by MMR, build a grounded prompt with the trailing
//! history, generate, and hand back the history extended by the exchange.

use alerta_core::{
    AlertaError, ChatTurn, Document, EmbeddingClient, LlmClient, RagConfig, Result,
};
use alerta_vector::{IndexHandle, VectorIndex};
use serde::Serialize;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use crate::history::{append_exchange, trailing_window};
use crate::mmr::mmr_select;
use crate::prompt::{assemble_context, PromptBuilder, NO_CONTEXT_ANSWER};

static CITATION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("citation marker pattern is valid"));

/// A document selected for the context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    /// 1-based position in the context, as cited by `[rank]`
    pub rank: usize,
    /// Inner product with the question embedding
    pub similarity: f32,
    /// Marginal score at the round it was picked
    pub mmr_score: f32,
    /// The selected document
    pub document: Document,
}

impl Reference {
    pub fn id(&self) -> u64 {
        self.document.id
    }
}

/// Result of answering one question
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Generated answer, trimmed
    pub text: String,
    /// References placed in the context, in selection order
    pub references: Vec<Reference>,
    /// Ids of the documents cited with `[n]` markers, by ascending rank
    pub citations: Vec<u64>,
    /// Set when the index was empty and no model was consulted
    pub no_context: bool,
    /// Wall time spent answering
    pub processing_time_ms: u64,
}

/// Stateless question answering over an index
pub struct Responder {
    embedder: Arc<dyn EmbeddingClient>,
    llm: Arc<dyn LlmClient>,
    config: RagConfig,
}

impl Responder {
    /// Create a new responder
    pub fn new(embedder: Arc<dyn EmbeddingClient>, llm: Arc<dyn LlmClient>, config: RagConfig) -> Self {
        Self {
            embedder,
            llm,
            config,
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Answer `question` and return the answer with the extended history
    ///
    /// The caller's history is never modified; on success the returned
    /// history is `history` plus the question and the answer.
    pub async fn answer(
        &self,
        question: &str,
        handle: &IndexHandle,
        history: &[ChatTurn],
    ) -> Result<(Answer, Vec<ChatTurn>)> {
        let start_time = Instant::now();
        let question = question.trim();
        if question.is_empty() {
            return Err(AlertaError::Validation("Question is empty".to_string()));
        }

        tracing::info!(history = history.len(), "RAG query started");

        // 1. Nothing indexed yet
        if handle.is_empty().await {
            tracing::info!("Index is empty, answering without context");
            let answer = Answer {
                text: NO_CONTEXT_ANSWER.to_string(),
                references: Vec::new(),
                citations: Vec::new(),
                no_context: true,
                processing_time_ms: start_time.elapsed().as_millis() as u64,
            };
            let history = append_exchange(history.to_vec(), question, NO_CONTEXT_ANSWER);
            return Ok((answer, history));
        }

        // 2-4. Embed and select
        let mut references = self.retrieve(question, handle).await?;
        tracing::debug!(selected = references.len(), "References selected");

        // 5-6. Grounded prompt; only documents that fit in the context are kept
        let (context, kept) = assemble_context(
            references.iter().map(|r| r.document.summary.as_str()),
            self.config.max_context_length,
        );
        references.truncate(kept);
        let prompt = PromptBuilder::new()
            .history(trailing_window(history, self.config.history_messages))
            .context(context)
            .question(question)
            .build();

        // 7. Generate
        tracing::info!(prompt_chars = prompt.char_len(), "Calling LLM");
        let text = self.llm.generate(&prompt).await?.trim().to_string();
        tracing::info!(answer_chars = text.len(), "LLM response received");

        // 8-9. Citations and history
        let citations = extract_citations(&text, &references);
        let history = append_exchange(history.to_vec(), question, text.clone());

        let answer = Answer {
            text,
            references,
            citations,
            no_context: false,
            processing_time_ms: start_time.elapsed().as_millis() as u64,
        };
        Ok((answer, history))
    }

    /// Embed the question and select up to `top_k` references
    pub async fn retrieve(&self, question: &str, handle: &IndexHandle) -> Result<Vec<Reference>> {
        let query = self.embedder.embed(question).await?;
        let index = handle.read().await;
        select_references(
            &index,
            &query,
            self.config.top_k,
            self.config.mmr_lambda,
            self.config.candidate_pool,
        )
    }
}

/// Select references for an embedded query
///
/// Candidates are every document unless `candidate_pool` is set, in which
/// case only the `max(pool, k)` most similar documents are re-ranked.
pub fn select_references(
    index: &VectorIndex,
    query: &[f32],
    k: usize,
    lambda: f32,
    candidate_pool: Option<usize>,
) -> Result<Vec<Reference>> {
    if index.is_empty() || k == 0 {
        return Ok(Vec::new());
    }
    if let Some(expected) = index.dimension() {
        if query.len() != expected {
            return Err(AlertaError::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }
    }

    let candidate_ids: Vec<u64> = match candidate_pool {
        Some(pool) => index
            .search(query, pool.max(k))?
            .into_iter()
            .map(|n| n.id)
            .collect(),
        None => index.documents().iter().map(|d| d.id).collect(),
    };
    tracing::debug!(candidates = candidate_ids.len(), "Candidate pool");

    let vectors = candidate_ids
        .iter()
        .map(|&id| index.reconstruct(id))
        .collect::<Result<Vec<_>>>()?;

    mmr_select(query, &vectors, k, lambda)
        .into_iter()
        .enumerate()
        .map(|(i, pick)| {
            let document = index.document(candidate_ids[pick.index])?.clone();
            Ok(Reference {
                rank: i + 1,
                similarity: pick.similarity,
                mmr_score: pick.score,
                document,
            })
        })
        .collect()
}

/// Map `[n]` markers in an answer to the ids of the cited references
///
/// Markers outside `1..=references.len()` are ignored.
pub fn extract_citations(answer: &str, references: &[Reference]) -> Vec<u64> {
    let ranks: BTreeSet<usize> = CITATION_MARKER
        .captures_iter(answer)
        .filter_map(|cap| cap.get(1)?.as_str().parse::<usize>().ok())
        .filter(|&rank| rank >= 1 && rank <= references.len())
        .collect();

    ranks
        .into_iter()
        .map(|rank| references[rank - 1].id())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerta_core::SourceRecord;

    fn index_of(vectors: Vec<Vec<f32>>) -> VectorIndex {
        let records = (0..vectors.len())
            .map(|i| SourceRecord::new(format!("doc {i}")))
            .collect();
        let mut index = VectorIndex::new();
        index.add(vectors, records).unwrap();
        index
    }

    fn references(n: usize) -> Vec<Reference> {
        let index = index_of((0..n).map(|i| vec![1.0, i as f32]).collect());
        select_references(&index, &[1.0, 0.0], n, 1.0, None).unwrap()
    }

    #[test]
    fn test_select_full_pool() {
        let index = index_of(vec![
            vec![0.8, 0.6, 0.0],
            vec![0.6, 0.0, 0.8],
            vec![0.78, 0.62, 0.0],
        ]);
        let refs = select_references(&index, &[1.0, 0.0, 0.0], 2, 0.5, None).unwrap();
        let ids: Vec<_> = refs.iter().map(Reference::id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(refs[0].rank, 1);
        assert_eq!(refs[1].rank, 2);
        assert_eq!(refs[1].document.summary, "doc 1");
    }

    #[test]
    fn test_bounded_pool_maps_back_to_ids() {
        let index = index_of(vec![
            vec![0.1, 0.0],
            vec![0.9, 0.1],
            vec![0.5, 0.5],
            vec![0.95, 0.0],
        ]);
        // pool of 2 only sees ids 3 and 1
        let refs = select_references(&index, &[1.0, 0.0], 2, 1.0, Some(2)).unwrap();
        let ids: Vec<_> = refs.iter().map(Reference::id).collect();
        assert_eq!(ids, vec![3, 1]);

        // the pool never shrinks below k
        let refs = select_references(&index, &[1.0, 0.0], 3, 1.0, Some(1)).unwrap();
        assert_eq!(refs.len(), 3);
    }

    #[test]
    fn test_select_rejects_wrong_query_dimension() {
        let index = index_of(vec![vec![1.0, 0.0]]);
        let err = select_references(&index, &[1.0, 0.0, 0.0], 1, 0.5, None).unwrap_err();
        assert!(matches!(
            err,
            AlertaError::DimensionMismatch { expected: 2, actual: 3 }
        ));
    }

    #[test]
    fn test_select_empty_index() {
        let refs = select_references(&VectorIndex::new(), &[1.0], 5, 0.5, None).unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn test_extract_citations() {
        let refs = references(3);
        let ids: Vec<_> = refs.iter().map(Reference::id).collect();

        let cited = extract_citations("Según [2] y [1], y otra vez [2].", &refs);
        assert_eq!(cited, vec![ids[0], ids[1]]);

        assert!(extract_citations("Sin marcadores", &refs).is_empty());
        assert!(extract_citations("Fuera de rango [0] [4] [99999999999999999999]", &refs).is_empty());
    }
}
