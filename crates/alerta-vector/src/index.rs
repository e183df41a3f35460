//! Append-only in-memory vector index
//!
//! Vectors are stored contiguously (one row of `dimension` floats per
//! document) and searched exhaustively by inner product, which equals
//! cosine similarity when the embedding gateway returns unit vectors.
//!
//! The index grows without bound: there is no eviction and no capacity
//! limit, so the whole corpus stays searchable for the session.

use alerta_core::{AlertaError, Document, Result, SourceRecord};
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};

/// Inner product of two equally sized vectors
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// A search hit: index position and similarity to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: u64,
    pub score: f32,
}

/// Exact inner-product index with positionally aligned documents
#[derive(Debug, Default, Clone)]
pub struct VectorIndex {
    /// Fixed by the first successful insertion
    dimension: Option<usize>,
    /// Row-major storage, `documents.len() * dimension` floats
    data: Vec<f32>,
    documents: Vec<Document>,
}

impl VectorIndex {
    /// Create an empty index; the dimension is set by the first `add`
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Vector dimension, once known
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Append a batch of vectors with their records
    ///
    /// The whole batch is validated before anything is written, so a
    /// rejected call leaves the index untouched. Returns the assigned ids.
    pub fn add(&mut self, vectors: Vec<Vec<f32>>, records: Vec<SourceRecord>) -> Result<Vec<u64>> {
        if vectors.len() != records.len() {
            return Err(AlertaError::LengthMismatch {
                vectors: vectors.len(),
                documents: records.len(),
            });
        }
        let Some(first) = vectors.first() else {
            return Ok(Vec::new());
        };

        let expected = self.dimension.unwrap_or(first.len());
        if expected == 0 {
            return Err(AlertaError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(AlertaError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        let start = self.documents.len() as u64;
        self.dimension = Some(expected);
        self.data.reserve(vectors.len() * expected);
        self.documents.reserve(records.len());

        for (offset, (vector, record)) in vectors.into_iter().zip(records).enumerate() {
            self.data.extend_from_slice(&vector);
            self.documents
                .push(Document::from_record(start + offset as u64, record));
        }

        Ok((start..self.documents.len() as u64).collect())
    }

    /// The `k` nearest vectors by inner product, best first
    ///
    /// Ties keep the lower position first. Asking for more than the index
    /// holds returns everything.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(AlertaError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let mut hits: Vec<Neighbor> = self
            .rows()
            .enumerate()
            .map(|(i, row)| Neighbor {
                id: i as u64,
                score: dot(row, query),
            })
            .collect();

        // Stable sort keeps ascending positions among equal scores
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    /// Raw vector stored at `id`
    pub fn reconstruct(&self, id: u64) -> Result<&[f32]> {
        let dimension = self.dimension.unwrap_or(0);
        let position = self.position(id)?;
        Ok(&self.data[position * dimension..(position + 1) * dimension])
    }

    /// Document stored at `id`
    pub fn document(&self, id: u64) -> Result<&Document> {
        let position = self.position(id)?;
        Ok(&self.documents[position])
    }

    /// All documents in insertion order
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// All stored vectors in insertion order
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact panics on zero, and an empty index has no rows anyway
        self.data.chunks_exact(self.dimension.unwrap_or(1).max(1))
    }

    fn position(&self, id: u64) -> Result<usize> {
        usize::try_from(id)
            .ok()
            .filter(|&p| p < self.documents.len())
            .ok_or_else(|| AlertaError::NotFound(format!("document {id}")))
    }
}

// ============================================================================
// Shared Handle
// ============================================================================

/// Shared handle to a session's index
///
/// Writers are serialized by the write lock and each batch is appended
/// while it is held, so readers never observe half of a batch.
#[derive(Debug, Clone, Default)]
pub struct IndexHandle {
    inner: Arc<RwLock<VectorIndex>>,
}

impl IndexHandle {
    /// Handle to a fresh empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing index
    pub fn from_index(index: VectorIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }

    /// Append a batch atomically with respect to readers
    pub async fn add(&self, vectors: Vec<Vec<f32>>, records: Vec<SourceRecord>) -> Result<Vec<u64>> {
        let mut index = self.inner.write().await;
        let ids = index.add(vectors, records)?;
        tracing::debug!(added = ids.len(), total = index.len(), "Index extended");
        Ok(ids)
    }

    /// Consistent read view of the index
    pub async fn read(&self) -> RwLockReadGuard<'_, VectorIndex> {
        self.inner.read().await
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Whether two handles point at the same index
    pub fn same_index(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

// ============================================================================
// Tests
// ============================================================================
