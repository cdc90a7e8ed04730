//! Core data models used throughout Ragmill.
//!
//! These types represent the documents, chunks, and search results that flow
//! through the ingestion and retrieval pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Chunk field names owned by the pipeline. Caller-supplied metadata keys
/// must not collide with these; ingestion rejects the request if they do.
pub const RESERVED_FIELDS: [&str; 5] = ["id", "text", "doc_id", "title", "chunk_index"];

/// Registry entry for an ingested document. One entry per distinct content
/// hash; re-ingesting the same content overwrites the entry wholesale.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    /// Number of chunks present in the last successful index commit.
    #[serde(rename = "chunks")]
    pub chunk_count: usize,
    pub metadata: Map<String, Value>,
    pub ingested_at: DateTime<Utc>,
}

/// A chunk as handed to the vector index. Immutable once created; a
/// document's chunk set is replaced wholesale on re-ingestion.
///
/// `id` is `{doc_id}_{chunk_index}` and is unique only within a single
/// committed index generation. `title` is copied from the document at
/// creation time and is not kept live-synced.
#[derive(Debug, Clone, Serialize)]
pub struct IndexedChunk {
    pub id: String,
    pub doc_id: String,
    pub title: String,
    pub chunk_index: usize,
    pub text: String,
    /// Caller metadata merged at the top level of the wire representation.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Raw similarity hit returned by a vector index backend. Provenance fields
/// are optional; the resolver backfills them from the registry.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub id: String,
    pub text: String,
    pub score: f64,
    pub doc_id: Option<String>,
    pub title: Option<String>,
    pub chunk_index: usize,
}

/// A fully resolved search result as served to clients. Missing provenance
/// resolves to empty strings, matching the service's wire format.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub score: f64,
    pub doc_id: String,
    pub title: String,
    pub chunk_index: usize,
}
