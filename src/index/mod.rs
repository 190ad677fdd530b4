//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait defines the three operations the pipeline
//! needs from a similarity-search store: batched upsert, bulk delete by
//! resource, and filtered search. Implementations must be `Send + Sync`
//! so one index handle can be shared across the server, the ingestion
//! worker, and the retrieval service.
//!
//! Two backends ship in-tree:
//! - [`remote::RemoteIndex`] — the hosted serverless index used in
//!   production; the provider embeds both records and queries, so no
//!   local embedding model exists anywhere in this crate.
//! - [`memory::InMemoryIndex`] — a process-local double used by the test
//!   suite.

pub mod memory;
pub mod remote;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DocumentRecord, RetrievedChunk};

/// Failure talking to the vector index.
///
/// Upsert and delete failures propagate to the ingestion pipeline (which
/// turns them into a resource `error` status); search failures are
/// swallowed by the retrieval service.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("upsert failed: {0}")]
    Upsert(String),
    #[error("delete failed: {0}")]
    Delete(String),
    #[error("search failed: {0}")]
    Search(String),
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite records by ID.
    async fn upsert(&self, records: &[DocumentRecord]) -> Result<(), IndexError>;

    /// Delete every record whose `resourceId` matches (used when a
    /// resource is removed).
    async fn delete_by_resource(&self, resource_id: i64) -> Result<(), IndexError>;

    /// Similarity search over record text, optionally scoped to one
    /// lesson. An absent `lesson_id` searches all lessons; only trusted
    /// internal callers may do that. Hits come back ordered by
    /// descending score.
    async fn search(
        &self,
        query: &str,
        lesson_id: Option<i64>,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, IndexError>;
}
