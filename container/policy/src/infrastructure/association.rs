// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::domain::association::{AssociationError, AssociationQuery, AssociationTriple};

/// In-process association index, used for development and tests.
///
/// Records every query it serves so callers can assert on traversal order and
/// short-circuiting.
pub struct InMemoryAssociationStore {
    triples: Arc<RwLock<HashSet<AssociationTriple>>>,
    queries: RwLock<Vec<AssociationTriple>>,
    query_count: AtomicUsize,
}

impl InMemoryAssociationStore {
    pub fn new() -> Self {
        Self {
            triples: Arc::new(RwLock::new(HashSet::new())),
            queries: RwLock::new(Vec::new()),
            query_count: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, subject: &str, predicate: &str, object: &str) {
        self.triples
            .write()
            .insert(AssociationTriple::new(subject, predicate, object));
    }

    pub fn remove(&self, subject: &str, predicate: &str, object: &str) -> bool {
        self.triples
            .write()
            .remove(&AssociationTriple::new(subject, predicate, object))
    }

    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    /// Object ids of every query served, in order.
    pub fn queried_objects(&self) -> Vec<String> {
        self.queries.read().iter().map(|t| t.object.clone()).collect()
    }
}

impl Default for InMemoryAssociationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssociationQuery for InMemoryAssociationStore {
    async fn exists_association(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
    ) -> Result<bool, AssociationError> {
        let triple = AssociationTriple::new(subject, predicate, object);
        self.query_count.fetch_add(1, Ordering::SeqCst);
        let exists = self.triples.read().contains(&triple);
        self.queries.write().push(triple);
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::association::OWNED_BY;

    #[tokio::test]
    async fn test_exists_association() {
        let store = InMemoryAssociationStore::new();
        store.insert("ooi-1", OWNED_BY, "R1");

        assert!(store.exists_association("ooi-1", OWNED_BY, "R1").await.unwrap());
        assert!(!store.exists_association("ooi-2", OWNED_BY, "R1").await.unwrap());
        assert!(store.remove("ooi-1", OWNED_BY, "R1"));
        assert!(!store.exists_association("ooi-1", OWNED_BY, "R1").await.unwrap());
        assert_eq!(store.query_count(), 3);
        assert_eq!(store.queried_objects(), vec!["R1", "R1", "R1"]);
    }
}
