//! Volatile document metadata registry.
//!
//! A pure in-memory id → [`Document`] store with insertion-ordered listing.
//! No durability; lifetime is the process lifetime. Concurrent callers are
//! serialized externally by the service's mutation lock.

use std::collections::HashMap;

use crate::models::Document;

#[derive(Debug, Clone, Default)]
pub struct DocumentRegistry {
    docs: HashMap<String, Document>,
    order: Vec<String>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document, overwriting any previous entry for the same id.
    /// An overwritten entry keeps its original position in `list` order.
    pub fn put(&mut self, doc: Document) {
        if !self.docs.contains_key(&doc.id) {
            self.order.push(doc.id.clone());
        }
        self.docs.insert(doc.id.clone(), doc);
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.docs.get(id)
    }

    /// All documents in insertion order.
    pub fn list(&self) -> Vec<&Document> {
        self.order
            .iter()
            .filter_map(|id| self.docs.get(id))
            .collect()
    }

    /// Remove a document. Returns true iff it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        if self.docs.remove(id).is_some() {
            self.order.retain(|existing| existing != id);
            true
        } else {
            false
        }
    }

    pub fn count(&self) -> usize {
        self.docs.len()
    }
}
