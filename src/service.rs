//! Service composition root.
//!
//! [`RagService`] owns the configuration, the segmenter, the vector index
//! handle, and the registry + synchronizer pair behind a single mutation
//! lock. Every insert, append, and delete is a non-atomic read-modify-write
//! sequence against the shared index, so all of them run as fully ordered
//! transactions under that lock; searches run concurrently and observe the
//! most recently committed generation.
//!
//! Tests construct isolated instances per case — there is no process-global
//! state anywhere in the pipeline.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::address::address_of;
use crate::config::Config;
use crate::extract::{extract_text, ExtractError};
use crate::index::{ChunkFilter, IndexError, VectorIndex};
use crate::models::{Document, IndexedChunk, SearchHit, RESERVED_FIELDS};
use crate::registry::DocumentRegistry;
use crate::resolve::resolve_hits;
use crate::segment::Segmenter;
use crate::sync::{IndexState, IndexSync, SyncStatus};

/// Failure taxonomy surfaced to the boundary layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractError),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("vector index unavailable: {0}")]
    IndexUnavailable(#[from] IndexError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result of a successful ingestion. `status` carries any degradation that
/// occurred while synchronizing the index; it is part of the outcome, not an
/// error, because the new chunks did land.
#[derive(Debug)]
pub struct IngestOutcome {
    pub doc_id: String,
    pub chunk_count: usize,
    pub title: String,
    pub status: SyncStatus,
}

/// Service statistics, mirroring `GET /stats`.
#[derive(Debug, Serialize)]
pub struct Stats {
    pub documents: usize,
    pub chunks: usize,
    pub model: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Registry and synchronizer, guarded together so a mutation sees and leaves
/// a consistent pair. The registry sits behind an `Arc` so searches can take
/// a copy-on-write snapshot without cloning the entries; mutations go through
/// `Arc::make_mut`, which only copies while a snapshot is still alive.
struct Core {
    registry: Arc<DocumentRegistry>,
    sync: IndexSync,
}

pub struct RagService {
    config: Arc<Config>,
    segmenter: Segmenter,
    index: Arc<dyn VectorIndex>,
    core: Mutex<Core>,
}

impl RagService {
    pub fn new(config: Config, index: Arc<dyn VectorIndex>) -> anyhow::Result<Self> {
        let segmenter = Segmenter::new(
            config.chunking.kind()?,
            config.chunking.max_chars,
            config.chunking.overlap,
        )?;
        let sync = IndexSync::new(
            index.clone(),
            config.index.read_back_limit,
            config.index.call_timeout(),
        );
        Ok(Self {
            config: Arc::new(config),
            segmenter,
            index,
            core: Mutex::new(Core {
                registry: Arc::new(DocumentRegistry::new()),
                sync,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ingest raw text: address, segment, register, and synchronize.
    ///
    /// On an outright commit failure the registry entry is rolled back so
    /// `chunk_count` keeps matching the last successful commit. A degraded
    /// append (prior chunks dropped) still succeeds and is reported through
    /// [`IngestOutcome::status`].
    pub async fn ingest_text(
        &self,
        content: &str,
        title: &str,
        metadata: &Map<String, Value>,
    ) -> Result<IngestOutcome, ServiceError> {
        if let Some(key) = metadata.keys().find(|k| RESERVED_FIELDS.contains(&k.as_str())) {
            return Err(ServiceError::InvalidRequest(format!(
                "metadata key '{}' collides with a reserved chunk field",
                key
            )));
        }

        let doc_id = address_of(content.as_bytes());
        let texts = self.segmenter.segment(content);
        let chunk_count = texts.len();
        let chunks: Vec<IndexedChunk> = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| IndexedChunk {
                id: format!("{}_{}", doc_id, i),
                doc_id: doc_id.clone(),
                title: title.to_string(),
                chunk_index: i,
                text,
                extra: metadata.clone(),
            })
            .collect();

        let mut core = self.core.lock().await;
        let previous = core.registry.get(&doc_id).cloned();
        Arc::make_mut(&mut core.registry).put(Document {
            id: doc_id.clone(),
            title: title.to_string(),
            chunk_count,
            metadata: metadata.clone(),
            ingested_at: Utc::now(),
        });

        match core.sync.insert(chunks).await {
            Ok(status) => {
                info!(doc_id = %doc_id, chunks = chunk_count, "document ingested");
                Ok(IngestOutcome {
                    doc_id,
                    chunk_count,
                    title: title.to_string(),
                    status,
                })
            }
            Err(err) => {
                // Nothing landed in the index; undo the registry entry so the
                // chunk-count invariant holds.
                let registry = Arc::make_mut(&mut core.registry);
                match previous {
                    Some(doc) => registry.put(doc),
                    None => {
                        registry.remove(&doc_id);
                    }
                }
                Err(err.into())
            }
        }
    }

    /// Extract text from an uploaded file and ingest it, tagging the chunks
    /// with the filename and content type.
    pub async fn ingest_file(
        &self,
        filename: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<IngestOutcome, ServiceError> {
        let text = extract_text(filename, bytes)?;
        let mut metadata = Map::new();
        metadata.insert("filename".to_string(), Value::String(filename.to_string()));
        if let Some(ct) = content_type {
            metadata.insert("content_type".to_string(), Value::String(ct.to_string()));
        }
        self.ingest_text(&text, filename, &metadata).await
    }

    /// Similarity search with inclusive score threshold and provenance
    /// backfill. Returns an empty list without touching the index while
    /// nothing has ever been committed.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        threshold: f64,
    ) -> Result<Vec<SearchHit>, ServiceError> {
        // Arc clone: a constant-time snapshot, not a copy of the entries.
        let (state, registry) = {
            let core = self.core.lock().await;
            (core.sync.state(), Arc::clone(&core.registry))
        };
        if state == IndexState::NotIndexed {
            return Ok(Vec::new());
        }

        let timeout = self.config.index.call_timeout();
        let raw = match tokio::time::timeout(timeout, self.index.search(query, limit)).await {
            Ok(result) => result?,
            Err(_) => return Err(IndexError::Timeout(timeout).into()),
        };
        Ok(resolve_hits(&registry, raw, threshold))
    }

    /// Remove a document and rebuild the index without its chunks.
    ///
    /// Unknown ids fail with `NotFound` and no side effects. If the rebuild
    /// commit fails the old generation is still active, so the registry
    /// entry is restored to keep the pair consistent.
    pub async fn delete_document(&self, doc_id: &str) -> Result<SyncStatus, ServiceError> {
        let mut core = self.core.lock().await;
        let Some(doc) = core.registry.get(doc_id).cloned() else {
            return Err(ServiceError::NotFound(doc_id.to_string()));
        };
        Arc::make_mut(&mut core.registry).remove(doc_id);

        match core.sync.delete(doc_id).await {
            Ok(status) => {
                info!(doc_id, "document deleted");
                Ok(status)
            }
            Err(err) => {
                Arc::make_mut(&mut core.registry).put(doc);
                Err(err.into())
            }
        }
    }

    /// All registered documents in insertion order.
    pub async fn list_documents(&self) -> Vec<Document> {
        let core = self.core.lock().await;
        core.registry.list().into_iter().cloned().collect()
    }

    /// Document and committed-chunk counts. A failed read-back degrades the
    /// status to `"error"` instead of failing the request.
    pub async fn stats(&self) -> Stats {
        let (state, documents) = {
            let core = self.core.lock().await;
            (core.sync.state(), core.registry.count())
        };
        let model = self.config.index.model.clone();

        if state == IndexState::NotIndexed {
            return Stats {
                documents,
                chunks: 0,
                model,
                status: "operational".to_string(),
                error: None,
            };
        }

        let timeout = self.config.index.call_timeout();
        let read_back = tokio::time::timeout(
            timeout,
            self.index
                .query(&ChunkFilter::MatchAll, self.config.index.read_back_limit),
        )
        .await
        .unwrap_or(Err(IndexError::Timeout(timeout)));

        match read_back {
            Ok(chunks) => Stats {
                documents,
                chunks: chunks.len(),
                model,
                status: "operational".to_string(),
                error: None,
            },
            Err(err) => Stats {
                documents,
                chunks: 0,
                model,
                status: "error".to_string(),
                error: Some(err.to_string()),
            },
        }
    }

    /// One-off segmentation preview with request-supplied parameters; backs
    /// the `/chunk` endpoint and the `chunk` CLI command.
    pub fn chunk_preview(
        &self,
        content: &str,
        chunk_size: usize,
        overlap: usize,
    ) -> Result<Vec<String>, ServiceError> {
        let segmenter = Segmenter::new(self.segmenter.kind(), chunk_size, overlap)
            .map_err(|e| ServiceError::InvalidRequest(e.to_string()))?;
        Ok(segmenter.segment(content))
    }
}
