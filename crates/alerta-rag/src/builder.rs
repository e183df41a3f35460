//! Index construction from news records and uploaded tables
//!
//! Embeddings for a batch are computed first, with bounded concurrency,
//! and only then appended under the index write lock. A gateway failure
//! therefore leaves the index exactly as it was.

use alerta_core::{DocumentSource, EmbeddingClient, Result, SourceRecord};
use alerta_parser::Table;
use alerta_vector::{embed_all, IndexHandle};
use std::sync::Arc;

/// Outcome of one build or extension
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Documents appended by this call
    pub added: usize,
    /// Records skipped because their summary was blank
    pub skipped_blank: usize,
    /// Records whose upstream payload had no usable summary
    pub malformed: usize,
    /// Id of the first appended document, if any
    pub first_id: Option<u64>,
    /// Index size after the call
    pub total: usize,
}

/// Embeds records and appends them to an index
pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingClient>,
    concurrency: usize,
}

impl IndexBuilder {
    /// Create a builder with at most `concurrency` embedding requests in flight
    pub fn new(embedder: Arc<dyn EmbeddingClient>, concurrency: usize) -> Self {
        Self {
            embedder,
            concurrency: concurrency.max(1),
        }
    }

    /// Append records to `handle`, or to a fresh index when none is given
    ///
    /// Calling it again with the returned handle only appends; ids keep
    /// growing from the current size.
    pub async fn build_or_extend_index(
        &self,
        records: Vec<SourceRecord>,
        handle: Option<IndexHandle>,
    ) -> Result<(IndexHandle, BuildReport)> {
        let handle = handle.unwrap_or_default();
        let malformed = records.iter().filter(|r| r.malformed).count();

        let (records, blank): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| !r.is_blank());
        if !blank.is_empty() {
            tracing::warn!(skipped = blank.len(), "Skipping records with blank summary");
        }

        let texts: Vec<String> = records.iter().map(|r| r.summary.clone()).collect();
        let vectors = embed_all(self.embedder.as_ref(), &texts, self.concurrency).await?;
        let ids = handle.add(vectors, records).await?;
        let total = handle.len().await;

        let report = BuildReport {
            added: ids.len(),
            skipped_blank: blank.len(),
            malformed,
            first_id: ids.first().copied(),
            total,
        };
        tracing::info!(
            added = report.added,
            skipped = report.skipped_blank,
            malformed = report.malformed,
            total = report.total,
            "Index updated"
        );

        Ok((handle, report))
    }

    /// Append the rows of an uploaded table
    ///
    /// Each row becomes one document whose text is the row's cell values
    /// joined in column order.
    pub async fn add_table(
        &self,
        table: &Table,
        handle: Option<IndexHandle>,
    ) -> Result<(IndexHandle, BuildReport)> {
        self.build_or_extend_index(table_records(table), handle)
            .await
    }
}

/// Turn every table row into a record tagged as table data
pub fn table_records(table: &Table) -> Vec<SourceRecord> {
    table
        .row_texts()
        .into_iter()
        .enumerate()
        .map(|(row, text)| {
            let record = SourceRecord::new(text)
                .with_source(DocumentSource::Table)
                .with_meta("row", row as u64);
            match &table.caption {
                Some(caption) => record.with_meta("table", caption.clone()),
                None => record,
            }
        })
        .collect()
}
