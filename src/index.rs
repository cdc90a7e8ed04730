//! Vector index interface and the in-memory generation-based backend.
//!
//! The index is an opaque collaborator with three primitives: `commit`
//! replaces the entire contents atomically, `query` reads back committed
//! chunks through a filter, and `search` runs a relevance-ordered similarity
//! query. There is no targeted delete; every mutation above this layer is a
//! full rebuild (see [`crate::sync`]).
//!
//! [`MemoryIndex`] models a commit as a copy-on-write generation behind an
//! atomic pointer swap: readers always observe the most recently committed
//! generation and never a partially written one. Similarity is brute-force
//! cosine over term-frequency vectors.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{IndexedChunk, ScoredChunk};

/// Failure modes of an index backend. A timed-out call is treated the same
/// as an unreachable backend by the synchronizer.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index backend unreachable: {0}")]
    Unreachable(String),
    #[error("index call timed out after {0:?}")]
    Timeout(Duration),
}

/// Read-back filter over committed chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkFilter {
    MatchAll,
    DocEquals(String),
    DocNotEquals(String),
}

impl ChunkFilter {
    pub fn matches(&self, doc_id: &str) -> bool {
        match self {
            ChunkFilter::MatchAll => true,
            ChunkFilter::DocEquals(id) => doc_id == id,
            ChunkFilter::DocNotEquals(id) => doc_id != id,
        }
    }
}

/// Opaque vector index collaborator.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Replace the entire index contents with `chunks`, atomically.
    async fn commit(&self, chunks: Vec<IndexedChunk>) -> Result<(), IndexError>;

    /// Read back committed chunks, in commit order, up to `limit`.
    async fn query(
        &self,
        filter: &ChunkFilter,
        limit: usize,
    ) -> Result<Vec<IndexedChunk>, IndexError>;

    /// Similarity query, relevance-ordered, scores in `[0, 1]`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredChunk>, IndexError>;
}

/// One committed index generation. Chunk ids are unique only within a single
/// generation; a rebuild may reuse them.
#[derive(Default)]
struct Generation {
    seq: u64,
    chunks: Vec<IndexedChunk>,
}

/// In-memory vector index backed by copy-on-write generations.
pub struct MemoryIndex {
    current: RwLock<Arc<Generation>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Generation::default())),
        }
    }

    fn snapshot(&self) -> Arc<Generation> {
        self.current.read().unwrap().clone()
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn commit(&self, chunks: Vec<IndexedChunk>) -> Result<(), IndexError> {
        let mut current = self.current.write().unwrap();
        let next = Generation {
            seq: current.seq + 1,
            chunks,
        };
        *current = Arc::new(next);
        Ok(())
    }

    async fn query(
        &self,
        filter: &ChunkFilter,
        limit: usize,
    ) -> Result<Vec<IndexedChunk>, IndexError> {
        let generation = self.snapshot();
        Ok(generation
            .chunks
            .iter()
            .filter(|chunk| filter.matches(&chunk.doc_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        let generation = self.snapshot();
        let query_tf = term_freqs(query);
        let mut results: Vec<ScoredChunk> = generation
            .chunks
            .iter()
            .map(|chunk| ScoredChunk {
                id: chunk.id.clone(),
                text: chunk.text.clone(),
                score: cosine(&query_tf, &term_freqs(&chunk.text)),
                doc_id: Some(chunk.doc_id.clone()),
                title: Some(chunk.title.clone()),
                chunk_index: chunk.chunk_index,
            })
            .collect();
        // Stable sort keeps commit order among equal scores.
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);
        Ok(results)
    }
}

/// Lowercased alphanumeric term frequencies.
fn term_freqs(text: &str) -> HashMap<String, f64> {
    let mut tf = HashMap::new();
    for token in text.split(|c: char| !c.is_alphanumeric()) {
        if token.is_empty() {
            continue;
        }
        *tf.entry(token.to_lowercase()).or_insert(0.0) += 1.0;
    }
    tf
}

fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(term, weight)| b.get(term).map(|other| weight * other))
        .sum();
    let mag_a: f64 = a.values().map(|w| w * w).sum::<f64>().sqrt();
    let mag_b: f64 = b.values().map(|w| w * w).sum::<f64>().sqrt();
    if mag_a < f64::EPSILON || mag_b < f64::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn chunk(doc_id: &str, index: usize, text: &str) -> IndexedChunk {
        IndexedChunk {
            id: format!("{}_{}", doc_id, index),
            doc_id: doc_id.to_string(),
            title: format!("title-{}", doc_id),
            chunk_index: index,
            text: text.to_string(),
            extra: Map::new(),
        }
    }

    #[tokio::test]
    async fn commit_replaces_contents_wholesale() {
        let index = MemoryIndex::new();
        index
            .commit(vec![chunk("d1", 0, "old text")])
            .await
            .unwrap();
        index
            .commit(vec![chunk("d2", 0, "new text")])
            .await
            .unwrap();
        let all = index.query(&ChunkFilter::MatchAll, 100).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].doc_id, "d2");
    }

    #[tokio::test]
    async fn query_filters_by_document() {
        let index = MemoryIndex::new();
        index
            .commit(vec![
                chunk("d1", 0, "alpha"),
                chunk("d2", 0, "beta"),
                chunk("d1", 1, "gamma"),
            ])
            .await
            .unwrap();

        let d1 = index
            .query(&ChunkFilter::DocEquals("d1".to_string()), 100)
            .await
            .unwrap();
        assert_eq!(d1.len(), 2);

        let not_d1 = index
            .query(&ChunkFilter::DocNotEquals("d1".to_string()), 100)
            .await
            .unwrap();
        assert_eq!(not_d1.len(), 1);
        assert_eq!(not_d1[0].doc_id, "d2");
    }

    #[tokio::test]
    async fn query_honors_limit_in_commit_order() {
        let index = MemoryIndex::new();
        index
            .commit(vec![chunk("d1", 0, "a"), chunk("d1", 1, "b")])
            .await
            .unwrap();
        let limited = index.query(&ChunkFilter::MatchAll, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].chunk_index, 0);
    }

    #[tokio::test]
    async fn search_orders_by_relevance() {
        let index = MemoryIndex::new();
        index
            .commit(vec![
                chunk("d1", 0, "nothing in common here"),
                chunk("d2", 0, "mammals mammals everywhere"),
                chunk("d3", 0, "some mammals and other words"),
            ])
            .await
            .unwrap();
        let hits = index.search("mammals", 10).await.unwrap();
        assert_eq!(hits[0].doc_id.as_deref(), Some("d2"));
        assert_eq!(hits[1].doc_id.as_deref(), Some("d3"));
        for hit in &hits {
            assert!((0.0..=1.0).contains(&hit.score));
        }
        assert!(hits[0].score > hits[1].score);
        assert_eq!(hits[2].score, 0.0);
    }

    #[tokio::test]
    async fn search_on_empty_index_is_empty() {
        let index = MemoryIndex::new();
        assert!(index.search("anything", 5).await.unwrap().is_empty());
    }
}
