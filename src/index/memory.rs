//! In-memory [`VectorIndex`] implementation for tests.
//!
//! Records live in a `HashMap` keyed by record ID, which makes idempotent
//! re-ingestion observable (same IDs overwrite, never duplicate). Search
//! ranks by naive term overlap — the real provider ranks by embedding
//! similarity, but overlap is deterministic and good enough to exercise
//! filtering, ordering, and shaping.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::models::{DocumentRecord, RetrievedChunk};

use super::{IndexError, VectorIndex};

#[derive(Default)]
pub struct InMemoryIndex {
    records: RwLock<HashMap<String, DocumentRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch one record by ID.
    pub fn get(&self, id: &str) -> Option<DocumentRecord> {
        self.records.read().unwrap().get(id).cloned()
    }

    /// All records for a resource, ordered by chunk index.
    pub fn records_for_resource(&self, resource_id: i64) -> Vec<DocumentRecord> {
        let mut records: Vec<DocumentRecord> = self
            .records
            .read()
            .unwrap()
            .values()
            .filter(|r| r.metadata.resource_id == resource_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.metadata.chunk_index);
        records
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, records: &[DocumentRecord]) -> Result<(), IndexError> {
        let mut stored = self.records.write().unwrap();
        for record in records {
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn delete_by_resource(&self, resource_id: i64) -> Result<(), IndexError> {
        self.records
            .write()
            .unwrap()
            .retain(|_, r| r.metadata.resource_id != resource_id);
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        lesson_id: Option<i64>,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let stored = self.records.read().unwrap();
        let mut hits: Vec<RetrievedChunk> = stored
            .values()
            .filter(|r| lesson_id.is_none_or(|id| r.metadata.lesson_id == id))
            .filter_map(|r| {
                let text_lower = r.text.to_lowercase();
                let matches = terms.iter().filter(|t| text_lower.contains(*t)).count();
                if matches == 0 {
                    return None;
                }
                Some(RetrievedChunk {
                    id: r.id.clone(),
                    score: matches as f64 / terms.len() as f64,
                    text: r.text.clone(),
                    file_name: r.metadata.file_name.clone(),
                    file_type: r.metadata.file_type.as_str().to_string(),
                    chunk_index: r.metadata.chunk_index,
                    resource_id: r.metadata.resource_id,
                    lesson_id: r.metadata.lesson_id,
                    title: r.metadata.title.clone().unwrap_or_default(),
                    author: r.metadata.author.clone().unwrap_or_default(),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}
