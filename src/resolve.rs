//! Search-result resolution: threshold filtering and provenance backfill.
//!
//! Raw index hits may arrive without a document id or title. The resolver
//! keeps only hits at or above the score threshold, then fills the gaps from
//! the registry. The index's relevance ordering is preserved; results are
//! never re-sorted here.
//!
//! Document-id recovery is a best-effort heuristic: the first registry id
//! (in insertion order) contained as a substring of the hit's own id wins.
//! Since chunk ids are `{doc_id}_{index}` this is usually right, but it is
//! not a guaranteed-correct join and deliberately stays that way.

use crate::models::{ScoredChunk, SearchHit};
use crate::registry::DocumentRegistry;

/// Filter raw hits by `threshold` (inclusive) and backfill provenance.
pub fn resolve_hits(
    registry: &DocumentRegistry,
    raw: Vec<ScoredChunk>,
    threshold: f64,
) -> Vec<SearchHit> {
    raw.into_iter()
        .filter(|hit| hit.score >= threshold)
        .map(|hit| {
            let doc_id = hit
                .doc_id
                .clone()
                .filter(|id| !id.is_empty())
                .or_else(|| guess_doc_id(registry, &hit.id));
            let title = hit
                .title
                .clone()
                .filter(|t| !t.is_empty())
                .or_else(|| {
                    doc_id
                        .as_deref()
                        .and_then(|id| registry.get(id))
                        .map(|doc| doc.title.clone())
                });
            SearchHit {
                text: hit.text,
                score: hit.score,
                doc_id: doc_id.unwrap_or_default(),
                title: title.unwrap_or_default(),
                chunk_index: hit.chunk_index,
            }
        })
        .collect()
}

fn guess_doc_id(registry: &DocumentRegistry, hit_id: &str) -> Option<String> {
    registry
        .list()
        .into_iter()
        .find(|doc| hit_id.contains(doc.id.as_str()))
        .map(|doc| doc.id.clone())
}
