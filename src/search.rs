//! Retrieval service.
//!
//! Thin shaping layer between the chat agent and the vector index:
//! builds the lesson-scoped filter, delegates ranking to the index
//! provider, and never lets an index failure crash the surrounding chat
//! turn — transport errors come back as an empty hit list, which the
//! caller reads as "no relevant context found".

use std::sync::Arc;

use crate::index::VectorIndex;
use crate::models::RetrievedChunk;

pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    default_top_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, default_top_k: usize) -> Self {
        Self {
            index,
            default_top_k,
        }
    }

    /// Top-k passages relevant to `query`, scoped to `lesson_id` when
    /// given. Unscoped search reaches every lesson and is reserved for
    /// trusted internal callers. Results keep the index's descending
    /// score order; no local re-ranking.
    pub async fn search(
        &self,
        query: &str,
        lesson_id: Option<i64>,
        top_k: Option<usize>,
    ) -> Vec<RetrievedChunk> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let k = top_k.unwrap_or(self.default_top_k);

        match self.index.search(query, lesson_id, k).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "retrieval failed; returning no context");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::memory::InMemoryIndex;
    use crate::index::IndexError;
    use crate::models::{DocumentRecord, FileKind, RecordMetadata};
    use async_trait::async_trait;

    struct FailingIndex;

    #[async_trait]
    impl VectorIndex for FailingIndex {
        async fn upsert(&self, _records: &[DocumentRecord]) -> Result<(), IndexError> {
            Err(IndexError::Upsert("connection refused".to_string()))
        }

        async fn delete_by_resource(&self, _resource_id: i64) -> Result<(), IndexError> {
            Err(IndexError::Delete("connection refused".to_string()))
        }

        async fn search(
            &self,
            _query: &str,
            _lesson_id: Option<i64>,
            _top_k: usize,
        ) -> Result<Vec<RetrievedChunk>, IndexError> {
            Err(IndexError::Search("connection refused".to_string()))
        }
    }

    fn record(id: &str, lesson_id: i64, text: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            text: text.to_string(),
            metadata: RecordMetadata {
                resource_id: 1,
                lesson_id,
                file_name: "notes.pdf".to_string(),
                file_type: FileKind::Pdf,
                chunk_index: 0,
                start_char: 0,
                end_char: text.len(),
                word_count: text.split_whitespace().count(),
                title: Some("Notes".to_string()),
                author: None,
                page_count: None,
            },
        }
    }

    #[tokio::test]
    async fn index_errors_become_empty_results() {
        let retriever = Retriever::new(Arc::new(FailingIndex), 5);
        let hits = retriever.search("anything", Some(1), None).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn blank_query_short_circuits() {
        let retriever = Retriever::new(Arc::new(FailingIndex), 5);
        assert!(retriever.search("   ", None, None).await.is_empty());
    }

    #[tokio::test]
    async fn hits_carry_citation_metadata() {
        let index = Arc::new(InMemoryIndex::new());
        index
            .upsert(&[record("1-0", 4, "mitochondria are the powerhouse")])
            .await
            .unwrap();
        let retriever = Retriever::new(index, 5);
        let hits = retriever.search("mitochondria", Some(4), None).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file_name, "notes.pdf");
        assert_eq!(hits[0].file_type, "pdf");
        assert_eq!(hits[0].title, "Notes");
        assert_eq!(hits[0].chunk_index, 0);
        assert!(hits[0].score > 0.0);
    }
}
