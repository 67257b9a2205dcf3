// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0
//! # Linked Object Graph (message payloads)
//!
//! Request payloads that reference registry resources arrive as a linked,
//! content-addressed object graph: a root wrapper whose child links point at
//! further objects held in a repository. Each object carries a stable
//! [`TypeId`] and a flat set of named fields.
//!
//! The graph is modelled as a closed set of value types: the policy layer
//! only needs the type tag, the named fields, and the ordered child links.
//! Link resolution is delegated to an [`ObjectRepository`], which is an
//! external collaborator (the versioned repository that materialised the
//! message).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Stable object-type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub u32);

impl From<u32> for TypeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a child object (content key in the repository).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkRef(pub String);

impl LinkRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl fmt::Display for LinkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scalar field value carried by an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// One object in the linked graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectNode {
    pub object_type: TypeId,
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
    #[serde(default)]
    pub child_links: Vec<LinkRef>,
}

impl ObjectNode {
    pub fn new(object_type: TypeId) -> Self {
        Self {
            object_type,
            fields: HashMap::new(),
            child_links: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn with_child(mut self, link: LinkRef) -> Self {
        self.child_links.push(link);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Linked object not found: {0}")]
    LinkNotFound(LinkRef),
    #[error("Object repository unavailable: {0}")]
    Unavailable(String),
}

/// Resolves child links of a linked message payload.
#[async_trait]
pub trait ObjectRepository: Send + Sync {
    async fn resolve_link(&self, link: &LinkRef) -> Result<ObjectNode, GraphError>;
}
