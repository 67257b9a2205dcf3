// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0
//! # Ownership Resolver
//!
//! Decides whether a requester owns every resource referenced by a linked
//! message payload.
//!
//! ## Traversal
//!
//! ```text
//! root.child_links = [A, B]          A.child_links = [A1]
//!
//! visit order: A → A1 → B            (depth-first, link order preserved)
//!   └─ resolve link
//!        └─ unknown link                    → DanglingLink (BAD_REQUEST)
//!        └─ repository down / timeout       → fail closed (UNAUTHORIZED)
//!   └─ node.object_type ∈ resource_fields?
//!        └─ resource id = node.fields[resource_fields[type]]
//!             └─ missing / empty            → MissingResourceId (BAD_REQUEST)
//!             └─ exists_association(requester, OWNED_BY, id)
//!                  └─ false                 → NotOwned, stop immediately
//!                  └─ timeout / error       → fail closed, stop immediately
//!   └─ descend into node's own child links (matched or not)
//! ```
//!
//! The check is a conjunction over all matched nodes with early termination on
//! the first failure: nodes after the failing one are never resolved and their
//! ownership is never queried. A node with no child links contributes nothing
//! and is trivially satisfied.
//!
//! Content-addressed graphs may share sub-objects, so each link is visited at
//! most once per check.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::association::{AssociationError, AssociationQuery, OWNED_BY};
use crate::domain::envelope::LinkedPayload;
use crate::domain::graph::{FieldValue, GraphError, LinkRef, ObjectNode, ObjectRepository, TypeId};
use crate::domain::invocation::DropCode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OwnershipError {
    #[error("Error: resource id missing from payload (type {object_type}, field '{field}')")]
    MissingResourceId { object_type: TypeId, field: String },
    #[error("Error: message payload references an unknown object: {0}")]
    DanglingLink(LinkRef),
    #[error("Not authorized: policy check failed: {0}")]
    Repository(GraphError),
    #[error("Not authorized: requester does not own resource {resource_id}")]
    NotOwned { resource_id: String },
    #[error("Not authorized: policy check timed out querying ownership of {resource_id}")]
    TimedOut { resource_id: String },
    #[error("Not authorized: policy check timed out resolving object {link}")]
    ResolveTimedOut { link: LinkRef },
    #[error("Not authorized: policy check failed: {0}")]
    Association(#[from] AssociationError),
}

impl From<GraphError> for OwnershipError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::LinkNotFound(link) => OwnershipError::DanglingLink(link),
            other => OwnershipError::Repository(other),
        }
    }
}

impl OwnershipError {
    /// Malformed payloads are the requester's fault; everything else fails
    /// closed as unauthorized.
    pub fn drop_code(&self) -> DropCode {
        match self {
            OwnershipError::MissingResourceId { .. } | OwnershipError::DanglingLink(_) => {
                DropCode::BadRequest
            }
            OwnershipError::Repository(_)
            | OwnershipError::NotOwned { .. }
            | OwnershipError::TimedOut { .. }
            | OwnershipError::ResolveTimedOut { .. }
            | OwnershipError::Association(_) => DropCode::Unauthorized,
        }
    }
}

/// Summary of a successful check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnershipReport {
    pub nodes_visited: usize,
    pub resources_verified: usize,
}

pub struct OwnershipResolver {
    association: Arc<dyn AssociationQuery>,
    predicate: String,
    query_timeout: Duration,
}

impl OwnershipResolver {
    /// Every collaborator call made during a check (link resolution and
    /// association query) is bounded by `query_timeout`.
    pub fn new(association: Arc<dyn AssociationQuery>, query_timeout: Duration) -> Self {
        Self {
            association,
            predicate: OWNED_BY.to_string(),
            query_timeout,
        }
    }

    /// Override the ownership predicate id (registries that key predicates by
    /// preloaded object id rather than by name).
    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = predicate.into();
        self
    }

    pub async fn check(
        &self,
        payload: &LinkedPayload,
        requester: &str,
        resource_fields: &HashMap<TypeId, String>,
    ) -> Result<OwnershipReport, OwnershipError> {
        let mut report = OwnershipReport::default();
        let mut visited: HashSet<LinkRef> = HashSet::new();
        // Reversed so that popping yields links in declaration order
        let mut pending: Vec<LinkRef> = payload.root.child_links.iter().rev().cloned().collect();

        while let Some(link) = pending.pop() {
            if !visited.insert(link.clone()) {
                continue;
            }

            let node = self.resolve(payload.repository.as_ref(), &link).await?;
            report.nodes_visited += 1;

            if let Some(field) = resource_fields.get(&node.object_type) {
                let resource_id = node
                    .field(field)
                    .and_then(FieldValue::as_text)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        warn!(
                            link = %link,
                            object_type = %node.object_type,
                            field = %field,
                            "Resource id missing from payload"
                        );
                        OwnershipError::MissingResourceId {
                            object_type: node.object_type,
                            field: field.clone(),
                        }
                    })?;

                self.verify_owner(requester, resource_id).await?;
                report.resources_verified += 1;
            }

            pending.extend(node.child_links.iter().rev().cloned());
        }

        debug!(
            requester = %requester,
            nodes_visited = report.nodes_visited,
            resources_verified = report.resources_verified,
            "Ownership check passed"
        );
        Ok(report)
    }

    async fn resolve(
        &self,
        repository: &dyn ObjectRepository,
        link: &LinkRef,
    ) -> Result<ObjectNode, OwnershipError> {
        match tokio::time::timeout(self.query_timeout, repository.resolve_link(link)).await {
            Ok(Ok(node)) => Ok(node),
            Ok(Err(e)) => {
                warn!(link = %link, error = %e, "Failed to resolve payload link");
                Err(e.into())
            }
            Err(_) => {
                warn!(
                    link = %link,
                    timeout = ?self.query_timeout,
                    "Payload link resolution timed out"
                );
                Err(OwnershipError::ResolveTimedOut { link: link.clone() })
            }
        }
    }

    async fn verify_owner(&self, requester: &str, resource_id: &str) -> Result<(), OwnershipError> {
        let query = self
            .association
            .exists_association(requester, &self.predicate, resource_id);

        let outcome = match tokio::time::timeout(self.query_timeout, query).await {
            Err(_) => {
                metrics::counter!("pdp_association_queries_total", "outcome" => "timeout")
                    .increment(1);
                warn!(
                    requester = %requester,
                    resource_id = %resource_id,
                    timeout = ?self.query_timeout,
                    "Association query timed out"
                );
                return Err(OwnershipError::TimedOut {
                    resource_id: resource_id.to_string(),
                });
            }
            Ok(Err(e)) => {
                metrics::counter!("pdp_association_queries_total", "outcome" => "error")
                    .increment(1);
                warn!(
                    requester = %requester,
                    resource_id = %resource_id,
                    error = %e,
                    "Association query failed"
                );
                return Err(OwnershipError::Association(e));
            }
            Ok(Ok(exists)) => exists,
        };

        if outcome {
            metrics::counter!("pdp_association_queries_total", "outcome" => "owned").increment(1);
            Ok(())
        } else {
            metrics::counter!("pdp_association_queries_total", "outcome" => "not_owned")
                .increment(1);
            Err(OwnershipError::NotOwned {
                resource_id: resource_id.to_string(),
            })
        }
    }
}
