// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::graph::{GraphError, LinkRef, ObjectNode, ObjectRepository};

/// Content-addressed object repository held in memory.
///
/// Links are derived from object content (type, fields, child links), so
/// inserting an identical object twice yields the same link.
pub struct InMemoryObjectRepository {
    objects: Arc<RwLock<HashMap<LinkRef, ObjectNode>>>,
}

impl InMemoryObjectRepository {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store `node` and return its content link.
    pub fn insert(&self, node: ObjectNode) -> LinkRef {
        let link = content_link(&node);
        self.objects.write().insert(link.clone(), node);
        link
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl Default for InMemoryObjectRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectRepository for InMemoryObjectRepository {
    async fn resolve_link(&self, link: &LinkRef) -> Result<ObjectNode, GraphError> {
        self.objects
            .read()
            .get(link)
            .cloned()
            .ok_or_else(|| GraphError::LinkNotFound(link.clone()))
    }
}

fn content_link(node: &ObjectNode) -> LinkRef {
    let fields: BTreeMap<_, _> = node.fields.iter().collect();
    let canonical = format!("{}|{:?}|{:?}", node.object_type, fields, node.child_links);
    LinkRef(Uuid::new_v5(&Uuid::NAMESPACE_OID, canonical.as_bytes()).to_string())
}
