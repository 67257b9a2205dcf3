// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0
//! Association-existence queries against the resource registry.
//!
//! The association service indexes `(subject, predicate, object)` triples.
//! The policy layer only ever asks one question of it: does a given triple
//! exist? Queries are idempotent and side-effect free.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Predicate id used for resource ownership.
pub const OWNED_BY: &str = "OWNED_BY";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssociationTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl AssociationTriple {
    pub fn new(subject: &str, predicate: &str, object: &str) -> Self {
        Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
        }
    }
}

impl fmt::Display for AssociationTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} -{}-> {})", self.subject, self.predicate, self.object)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssociationError {
    #[error("Association service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AssociationQuery: Send + Sync {
    async fn exists_association(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
    ) -> Result<bool, AssociationError>;
}
