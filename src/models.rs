//! Core data models for the ingestion and retrieval pipeline.
//!
//! These types represent the documents, chunks, and index records that flow
//! from an uploaded file to the vector index, and the hits that flow back
//! out to the chat agent.

use serde::{Deserialize, Serialize};

/// Supported source document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Docx,
    Pptx,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Docx => "docx",
            FileKind::Pptx => "pptx",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document-level metadata recovered during parsing.
#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub page_count: Option<u32>,
    pub file_kind: FileKind,
}

/// Extracted body text, or a stand-in when extraction degraded.
///
/// Slide-text extraction is unreliable for some decks; those parse to
/// [`DocumentText::Placeholder`] instead of failing the whole upload.
#[derive(Debug, Clone)]
pub enum DocumentText {
    Extracted(String),
    Placeholder { text: String, reason: String },
}

impl DocumentText {
    pub fn as_str(&self) -> &str {
        match self {
            DocumentText::Extracted(text) => text,
            DocumentText::Placeholder { text, .. } => text,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, DocumentText::Placeholder { .. })
    }
}

/// Result of parsing one uploaded file.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub text: DocumentText,
    pub metadata: DocumentMetadata,
}

/// Byte span of a chunk within the source text it was cut from.
///
/// Offsets index the original text, not the chunk's own (trimmed) content;
/// they exist for provenance and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub start_char: usize,
    pub end_char: usize,
    pub word_count: usize,
}

/// One segment of a document's text, ordered by `index` within its document.
#[derive(Debug, Clone)]
pub struct TextChunk {
    pub content: String,
    pub index: usize,
    pub span: ChunkSpan,
}

/// Metadata persisted alongside each record in the vector index.
///
/// Document-level and chunk-level fields are flattened into one object so
/// the index can filter on any of them (`lessonId` for retrieval scoping,
/// `resourceId` for bulk deletes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    pub resource_id: i64,
    pub lesson_id: i64,
    pub file_name: String,
    pub file_type: FileKind,
    pub chunk_index: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub word_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
}

/// The unit persisted to the vector index.
///
/// `id` is deterministic per `(resource, chunk index)`, so re-ingesting a
/// resource overwrites matching chunks instead of duplicating them. The
/// index provider embeds `text` server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub text: String,
    #[serde(flatten)]
    pub metadata: RecordMetadata,
}

impl DocumentRecord {
    /// Deterministic record ID for a chunk of a resource.
    pub fn record_id(resource_id: i64, chunk_index: usize) -> String {
        format!("{}-{}", resource_id, chunk_index)
    }
}

/// A scored hit returned from similarity search, shaped for direct
/// inclusion in an LLM tool-result payload (citations need no second
/// lookup).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    pub id: String,
    pub score: f64,
    pub text: String,
    pub file_name: String,
    pub file_type: String,
    pub chunk_index: usize,
    pub resource_id: i64,
    pub lesson_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
}
