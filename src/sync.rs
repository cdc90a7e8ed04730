//! Registry ↔ index synchronization state machine.
//!
//! The index offers only full-contents `commit` and filtered `query`, so
//! every mutation here is a read-back-then-rebuild sequence. [`IndexSync`]
//! owns the process-wide [`IndexState`] and turns each sequence's outcome
//! into an explicit [`SyncStatus`]: degradation is a reported result, never
//! a silent state flip.
//!
//! State machine:
//!
//! ```text
//! NotIndexed --insert--> Indexed            commit(new)
//! Indexed    --insert--> Indexed            query(all) + commit(all ++ new)
//!                                           read-back fails: commit(new only),
//!                                           reported as PriorChunksDropped
//! Indexed    --delete--> Indexed            query(doc_id != id) + commit(rest)
//! Indexed    --delete--> NotIndexed         read-back fails: nothing committed,
//!                                           reported as IndexStateLost
//! ```
//!
//! Every index call runs under a bounded timeout; a timeout follows the same
//! failure path as a read-back error. All mutating sequences are serialized
//! by the caller holding `&mut IndexSync` behind the service's mutation lock.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::index::{ChunkFilter, IndexError, VectorIndex};
use crate::models::IndexedChunk;

/// Whether at least one commit has ever succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    NotIndexed,
    Indexed,
}

/// What was lost when a read-back-then-commit sequence failed part-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degradation {
    /// Append-path read-back failed: the new chunks were committed alone and
    /// every previously committed chunk was dropped from the index.
    PriorChunksDropped,
    /// Delete-path read-back failed: nothing was committed and the index
    /// contents are now unknown relative to the registry.
    IndexStateLost,
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::PriorChunksDropped => write!(
                f,
                "index read-back failed; previously indexed chunks were dropped from the index"
            ),
            Degradation::IndexStateLost => write!(
                f,
                "index read-back failed; index contents are unknown and the index state was reset"
            ),
        }
    }
}

/// Outcome of a mutating synchronization sequence that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Clean,
    Degraded(Degradation),
}

impl SyncStatus {
    pub fn degradation(&self) -> Option<Degradation> {
        match self {
            SyncStatus::Clean => None,
            SyncStatus::Degraded(d) => Some(*d),
        }
    }
}

/// Keeps an external vector index consistent with the document registry
/// across insert, append, and delete.
pub struct IndexSync {
    index: Arc<dyn VectorIndex>,
    state: IndexState,
    read_back_limit: usize,
    call_timeout: Duration,
}

impl IndexSync {
    pub fn new(index: Arc<dyn VectorIndex>, read_back_limit: usize, call_timeout: Duration) -> Self {
        Self {
            index,
            state: IndexState::NotIndexed,
            read_back_limit,
            call_timeout,
        }
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    /// Insert a freshly segmented chunk set.
    ///
    /// First ever insert commits directly; later inserts append by reading
    /// back the committed generation and committing the concatenation. A
    /// failed read-back falls back to committing the new chunks alone and
    /// reports [`Degradation::PriorChunksDropped`]. A failed commit leaves
    /// the previously committed generation active and surfaces the error.
    pub async fn insert(&mut self, new_chunks: Vec<IndexedChunk>) -> Result<SyncStatus, IndexError> {
        match self.state {
            IndexState::NotIndexed => {
                let committed = new_chunks.len();
                self.call(self.index.commit(new_chunks)).await?;
                self.state = IndexState::Indexed;
                debug!(chunks = committed, "first index commit");
                Ok(SyncStatus::Clean)
            }
            IndexState::Indexed => {
                match self
                    .call(self.index.query(&ChunkFilter::MatchAll, self.read_back_limit))
                    .await
                {
                    Ok(mut combined) => {
                        let existing = combined.len();
                        combined.extend(new_chunks);
                        let total = combined.len();
                        self.call(self.index.commit(combined)).await?;
                        debug!(existing, total, "appended to index");
                        Ok(SyncStatus::Clean)
                    }
                    Err(err) => {
                        warn!(
                            error = %err,
                            "append read-back failed; committing new chunks only"
                        );
                        self.call(self.index.commit(new_chunks)).await?;
                        Ok(SyncStatus::Degraded(Degradation::PriorChunksDropped))
                    }
                }
            }
        }
    }

    /// Rebuild the index without `doc_id`'s chunks.
    ///
    /// A failed read-back commits nothing, resets the state to `NotIndexed`,
    /// and reports [`Degradation::IndexStateLost`]. With nothing ever
    /// committed there is nothing to rebuild and the delete is trivially
    /// clean.
    pub async fn delete(&mut self, doc_id: &str) -> Result<SyncStatus, IndexError> {
        if self.state == IndexState::NotIndexed {
            return Ok(SyncStatus::Clean);
        }
        let filter = ChunkFilter::DocNotEquals(doc_id.to_string());
        match self.call(self.index.query(&filter, self.read_back_limit)).await {
            Ok(remaining) => {
                let kept = remaining.len();
                self.call(self.index.commit(remaining)).await?;
                debug!(doc_id, kept, "rebuilt index without document");
                Ok(SyncStatus::Clean)
            }
            Err(err) => {
                warn!(
                    doc_id,
                    error = %err,
                    "delete read-back failed; index state reset to NotIndexed"
                );
                self.state = IndexState::NotIndexed;
                Ok(SyncStatus::Degraded(Degradation::IndexStateLost))
            }
        }
    }

    async fn call<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, IndexError>>,
    ) -> Result<T, IndexError> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(IndexError::Timeout(self.call_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;
    use async_trait::async_trait;
    use serde_json::Map;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Wraps a [`MemoryIndex`] and fails `query` on demand, simulating an
    /// unreachable backend during read-back.
    struct FlakyIndex {
        inner: MemoryIndex,
        fail_queries: AtomicBool,
    }

    impl FlakyIndex {
        fn new() -> Self {
            Self {
                inner: MemoryIndex::new(),
                fail_queries: AtomicBool::new(false),
            }
        }

        fn set_fail_queries(&self, fail: bool) {
            self.fail_queries.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl VectorIndex for FlakyIndex {
        async fn commit(&self, chunks: Vec<IndexedChunk>) -> Result<(), IndexError> {
            self.inner.commit(chunks).await
        }

        async fn query(
            &self,
            filter: &ChunkFilter,
            limit: usize,
        ) -> Result<Vec<IndexedChunk>, IndexError> {
            if self.fail_queries.load(Ordering::SeqCst) {
                return Err(IndexError::Unreachable("injected failure".to_string()));
            }
            self.inner.query(filter, limit).await
        }

        async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredChunk>, IndexError> {
            self.inner.search(query, limit).await
        }
    }

    use crate::models::ScoredChunk;

    fn chunks_for(doc_id: &str, texts: &[&str]) -> Vec<IndexedChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| IndexedChunk {
                id: format!("{}_{}", doc_id, i),
                doc_id: doc_id.to_string(),
                title: doc_id.to_string(),
                chunk_index: i,
                text: text.to_string(),
                extra: Map::new(),
            })
            .collect()
    }

    fn sync_over(index: Arc<dyn VectorIndex>) -> IndexSync {
        IndexSync::new(index, 10_000, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn first_insert_transitions_to_indexed() {
        let index = Arc::new(MemoryIndex::new());
        let mut sync = sync_over(index.clone());
        assert_eq!(sync.state(), IndexState::NotIndexed);

        let status = sync.insert(chunks_for("d1", &["alpha"])).await.unwrap();
        assert_eq!(status, SyncStatus::Clean);
        assert_eq!(sync.state(), IndexState::Indexed);
        assert_eq!(index.query(&ChunkFilter::MatchAll, 100).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn append_preserves_existing_chunks_in_order() {
        let index = Arc::new(MemoryIndex::new());
        let mut sync = sync_over(index.clone());
        sync.insert(chunks_for("d1", &["alpha", "beta"])).await.unwrap();
        sync.insert(chunks_for("d2", &["gamma"])).await.unwrap();

        let all = index.query(&ChunkFilter::MatchAll, 100).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["d1_0", "d1_1", "d2_0"]);
    }

    #[tokio::test]
    async fn append_read_back_failure_reports_data_loss() {
        let index = Arc::new(FlakyIndex::new());
        let mut sync = sync_over(index.clone());
        sync.insert(chunks_for("d1", &["alpha"])).await.unwrap();

        index.set_fail_queries(true);
        let status = sync.insert(chunks_for("d2", &["beta"])).await.unwrap();
        assert_eq!(status, SyncStatus::Degraded(Degradation::PriorChunksDropped));
        assert_eq!(sync.state(), IndexState::Indexed);

        // The fallback commit discarded d1 but landed d2.
        index.set_fail_queries(false);
        let all = index.query(&ChunkFilter::MatchAll, 100).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].doc_id, "d2");
    }

    #[tokio::test]
    async fn delete_rebuilds_without_target_document() {
        let index = Arc::new(MemoryIndex::new());
        let mut sync = sync_over(index.clone());
        sync.insert(chunks_for("d1", &["alpha", "beta"])).await.unwrap();
        sync.insert(chunks_for("d2", &["gamma"])).await.unwrap();

        let status = sync.delete("d1").await.unwrap();
        assert_eq!(status, SyncStatus::Clean);
        assert_eq!(sync.state(), IndexState::Indexed);

        let all = index.query(&ChunkFilter::MatchAll, 100).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].doc_id, "d2");
    }

    #[tokio::test]
    async fn delete_read_back_failure_resets_state() {
        let index = Arc::new(FlakyIndex::new());
        let mut sync = sync_over(index.clone());
        sync.insert(chunks_for("d1", &["alpha"])).await.unwrap();

        index.set_fail_queries(true);
        let status = sync.delete("d1").await.unwrap();
        assert_eq!(status, SyncStatus::Degraded(Degradation::IndexStateLost));
        assert_eq!(sync.state(), IndexState::NotIndexed);

        // Recovery: the next insert recommits from scratch.
        index.set_fail_queries(false);
        let status = sync.insert(chunks_for("d3", &["delta"])).await.unwrap();
        assert_eq!(status, SyncStatus::Clean);
        assert_eq!(sync.state(), IndexState::Indexed);
        let all = index.query(&ChunkFilter::MatchAll, 100).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].doc_id, "d3");
    }

    #[tokio::test]
    async fn delete_with_nothing_committed_is_clean() {
        let index = Arc::new(MemoryIndex::new());
        let mut sync = sync_over(index);
        let status = sync.delete("missing").await.unwrap();
        assert_eq!(status, SyncStatus::Clean);
    }
}
