//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow for one uploaded document: parse → chunk →
//! record construction → batched upsert into the vector index, reporting
//! progress through the resource status side channel
//! (`processing → completed | error | empty`).
//!
//! Jobs arrive over a queue and are consumed by a single worker loop, so
//! ingestion runs are serialized process-wide — two uploads of the same
//! resource can never interleave their upserts. The pipeline never
//! retries; a failed run leaves the resource in `error` and retry policy
//! belongs to the caller.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::chunk::chunk_text;
use crate::config::{ChunkingConfig, IngestConfig};
use crate::index::{IndexError, VectorIndex};
use crate::models::{DocumentMetadata, DocumentRecord, RecordMetadata, TextChunk};
use crate::parser::parse_document;
use crate::resources::{ProcessingStatus, ResourceStore};

/// One queued upload: the raw bytes plus the identity needed to scope its
/// records. Held by the queue until the worker picks it up.
#[derive(Debug)]
pub struct IngestJob {
    pub resource_id: i64,
    pub lesson_id: i64,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Terminal outcome of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Records were written to the index.
    Indexed { records: usize },
    /// Parsing yielded no ingestible text; nothing was written.
    NoContent,
}

pub struct IngestPipeline {
    index: Arc<dyn VectorIndex>,
    resources: Arc<dyn ResourceStore>,
    chunking: ChunkingConfig,
    batching: IngestConfig,
}

impl IngestPipeline {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        resources: Arc<dyn ResourceStore>,
        chunking: ChunkingConfig,
        batching: IngestConfig,
    ) -> Self {
        Self {
            index,
            resources,
            chunking,
            batching,
        }
    }

    /// Consume ingestion jobs until the queue closes. Failures are
    /// reported through resource status, never propagated — the worker
    /// must outlive any single bad document.
    pub async fn run(&self, mut jobs: mpsc::Receiver<IngestJob>) {
        while let Some(job) = jobs.recv().await {
            let resource_id = job.resource_id;
            let file_name = job.file_name.clone();
            match self.ingest(job).await {
                Ok(IngestOutcome::Indexed { records }) => {
                    tracing::info!(resource_id, file_name = %file_name, records, "ingestion complete");
                }
                Ok(IngestOutcome::NoContent) => {
                    tracing::warn!(resource_id, file_name = %file_name, "no content extracted");
                }
                Err(e) => {
                    tracing::error!(resource_id, file_name = %file_name, error = %e, "ingestion failed");
                }
            }
        }
    }

    /// Run the pipeline for one document. Every failure after the
    /// `processing` transition lands the resource in `error`.
    pub async fn ingest(&self, job: IngestJob) -> Result<IngestOutcome> {
        self.resources
            .update_status(job.resource_id, ProcessingStatus::Processing)
            .await?;

        match self.ingest_inner(&job).await {
            Ok(outcome) => {
                let status = match outcome {
                    IngestOutcome::Indexed { .. } => ProcessingStatus::Completed,
                    IngestOutcome::NoContent => ProcessingStatus::Empty,
                };
                self.resources.update_status(job.resource_id, status).await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(status_err) = self
                    .resources
                    .update_status(job.resource_id, ProcessingStatus::Error)
                    .await
                {
                    tracing::error!(
                        resource_id = job.resource_id,
                        error = %status_err,
                        "failed to record error status"
                    );
                }
                Err(e)
            }
        }
    }

    async fn ingest_inner(&self, job: &IngestJob) -> Result<IngestOutcome> {
        let parsed = parse_document(&job.bytes, &job.file_name, &job.mime_type)?;

        if parsed.text.is_placeholder() {
            tracing::warn!(
                resource_id = job.resource_id,
                file_name = %job.file_name,
                "slide extraction degraded to placeholder text"
            );
        }

        let text = parsed.text.as_str();
        if text.trim().is_empty() {
            return Ok(IngestOutcome::NoContent);
        }

        let chunks = chunk_text(text, self.chunking.chunk_size, self.chunking.overlap);
        if chunks.is_empty() {
            return Ok(IngestOutcome::NoContent);
        }
        tracing::debug!(
            resource_id = job.resource_id,
            chunks = chunks.len(),
            "chunked document"
        );

        let records = build_records(
            &chunks,
            job.resource_id,
            job.lesson_id,
            &job.file_name,
            &parsed.metadata,
        );
        self.store_records(&records).await?;

        Ok(IngestOutcome::Indexed {
            records: records.len(),
        })
    }

    /// Upsert records in fixed-size batches with a pause between batches.
    /// A failed batch aborts the remaining ones.
    async fn store_records(&self, records: &[DocumentRecord]) -> Result<(), IndexError> {
        let batches = records.len().div_ceil(self.batching.batch_size);
        for (i, batch) in records.chunks(self.batching.batch_size).enumerate() {
            self.index.upsert(batch).await?;
            tracing::debug!("stored batch {}/{}", i + 1, batches);
            if i + 1 < batches {
                tokio::time::sleep(Duration::from_millis(self.batching.batch_delay_ms)).await;
            }
        }
        Ok(())
    }
}

/// Build one index record per chunk, flattening document-level and
/// chunk-level metadata. Record IDs are deterministic per
/// `(resource, chunk index)`, so re-ingestion overwrites rather than
/// duplicates. Chunks beyond a shorter re-upload's count are not cleaned
/// up here; issue a delete-by-resource first when that matters.
pub fn build_records(
    chunks: &[TextChunk],
    resource_id: i64,
    lesson_id: i64,
    file_name: &str,
    metadata: &DocumentMetadata,
) -> Vec<DocumentRecord> {
    chunks
        .iter()
        .map(|chunk| DocumentRecord {
            id: DocumentRecord::record_id(resource_id, chunk.index),
            text: chunk.content.clone(),
            metadata: RecordMetadata {
                resource_id,
                lesson_id,
                file_name: file_name.to_string(),
                file_type: metadata.file_kind,
                chunk_index: chunk.index,
                start_char: chunk.span.start_char,
                end_char: chunk.span.end_char,
                word_count: chunk.span.word_count,
                title: metadata.title.clone(),
                author: metadata.author.clone(),
                page_count: metadata.page_count,
            },
        })
        .collect()
}
