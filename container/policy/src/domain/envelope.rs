// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0
//! # Message Envelope
//!
//! Header map plus payload of one inter-process message, as handed to the
//! interceptor pipeline by the transport. Header values are kept as raw JSON
//! values: the transport does not guarantee types, and the policy layer must
//! reject (rather than coerce) headers of the wrong shape.
//!
//! Recognised headers:
//!
//! | Header | Meaning |
//! |--------|---------|
//! | `performative` | message kind; only `request` is policed |
//! | `user-id` | requester identity (ooi id) or the anonymous sentinel |
//! | `expiry` | string-encoded epoch seconds, `"0"` never expires |
//! | `receiver` | dotted path, last segment is the service name |
//! | `op` | operation name |

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::graph::{ObjectNode, ObjectRepository};

pub const PERFORMATIVE: &str = "performative";
pub const USER_ID: &str = "user-id";
pub const EXPIRY: &str = "expiry";
pub const RECEIVER: &str = "receiver";
pub const OP: &str = "op";

pub const PERFORMATIVE_REQUEST: &str = "request";

/// A linked-object-graph payload: root wrapper plus the repository able to
/// resolve its child links.
#[derive(Clone)]
pub struct LinkedPayload {
    pub root: ObjectNode,
    pub repository: Arc<dyn ObjectRepository>,
}

impl LinkedPayload {
    pub fn new(root: ObjectNode, repository: Arc<dyn ObjectRepository>) -> Self {
        Self { root, repository }
    }
}

impl fmt::Debug for LinkedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedPayload")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub enum Payload {
    #[default]
    Empty,
    /// Any non-graph content (plain JSON bodies, raw bytes decoded upstream).
    Opaque(Value),
    Linked(LinkedPayload),
}

impl Payload {
    pub fn as_linked(&self) -> Option<&LinkedPayload> {
        match self {
            Payload::Linked(linked) => Some(linked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Envelope {
    headers: HashMap<String, Value>,
    pub content: Payload,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request envelope with all policed headers populated.
    pub fn request(user_id: &str, receiver: &str, op: &str, expiry: &str) -> Self {
        Self::new()
            .with_header(PERFORMATIVE, PERFORMATIVE_REQUEST)
            .with_header(USER_ID, user_id)
            .with_header(RECEIVER, receiver)
            .with_header(OP, op)
            .with_header(EXPIRY, expiry)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    pub fn with_content(mut self, content: Payload) -> Self {
        self.content = content;
        self
    }

    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.get(name)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    pub fn performative(&self) -> Option<&str> {
        self.header(PERFORMATIVE).and_then(Value::as_str)
    }

    pub fn is_request(&self) -> bool {
        self.performative() == Some(PERFORMATIVE_REQUEST)
    }
}
