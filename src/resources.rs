//! Resource records and the processing-status side channel.
//!
//! A resource is one uploaded document and its processing lifecycle:
//! `pending → processing → completed | error | empty`. The ingestion
//! pipeline reports progress exclusively through this channel — callers
//! that fired an upload poll the resource rather than awaiting the
//! pipeline.
//!
//! `empty` is a terminal status of its own: a document that parsed to no
//! ingestible text is neither completed nor failed, and must not sit in
//! `processing` forever.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Error,
    Empty,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Error => "error",
            ProcessingStatus::Empty => "empty",
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded source document's record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: i64,
    pub name: String,
    pub file_type: String,
    pub lesson_id: i64,
    pub processing_status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// External collaborator holding resource rows.
///
/// The pipeline only needs create/update-status/lookup/remove; relational
/// persistence beyond that lives outside this crate.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn create(&self, name: &str, file_type: &str, lesson_id: i64) -> Result<Resource>;

    async fn update_status(&self, resource_id: i64, status: ProcessingStatus) -> Result<()>;

    async fn get(&self, resource_id: i64) -> Result<Option<Resource>>;

    async fn remove(&self, resource_id: i64) -> Result<Option<Resource>>;
}

/// Process-local [`ResourceStore`] with sequential IDs.
#[derive(Default)]
pub struct InMemoryResourceStore {
    next_id: AtomicI64,
    rows: Mutex<HashMap<i64, Resource>>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn create(&self, name: &str, file_type: &str, lesson_id: i64) -> Result<Resource> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let resource = Resource {
            id,
            name: name.to_string(),
            file_type: file_type.to_string(),
            lesson_id,
            processing_status: ProcessingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().insert(id, resource.clone());
        Ok(resource)
    }

    async fn update_status(&self, resource_id: i64, status: ProcessingStatus) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(&resource_id)
            .ok_or_else(|| anyhow::anyhow!("unknown resource: {}", resource_id))?;
        row.processing_status = status;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn get(&self, resource_id: i64) -> Result<Option<Resource>> {
        Ok(self.rows.lock().unwrap().get(&resource_id).cloned())
    }

    async fn remove(&self, resource_id: i64) -> Result<Option<Resource>> {
        Ok(self.rows.lock().unwrap().remove(&resource_id))
    }
}
