// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0
//! # Invocation
//!
//! Per-message decision record that flows through the interceptor pipeline.
//!
//! ## Invariants
//!
//! - `status` starts as `Process` and transitions at most once to `Dropped`.
//! - A dropped invocation is never resurrected; later `drop` calls are ignored
//!   so the first rejection reason is the one reported to the requester.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::envelope::Envelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(pub Uuid);

impl InvocationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvocationStatus {
    Process,
    Dropped,
}

/// Reason class attached to a dropped invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DropCode {
    BadRequest,
    Unauthorized,
}

impl DropCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropCode::BadRequest => "BAD_REQUEST",
            DropCode::Unauthorized => "UNAUTHORIZED",
        }
    }
}

impl fmt::Display for DropCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub id: InvocationId,
    pub message: Envelope,
    status: InvocationStatus,
    note: Option<String>,
    code: Option<DropCode>,
}

impl Invocation {
    pub fn new(message: Envelope) -> Self {
        Self {
            id: InvocationId::new(),
            message,
            status: InvocationStatus::Process,
            note: None,
            code: None,
        }
    }

    pub fn status(&self) -> InvocationStatus {
        self.status
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn code(&self) -> Option<DropCode> {
        self.code
    }

    pub fn is_dropped(&self) -> bool {
        self.status == InvocationStatus::Dropped
    }

    /// Mark the invocation as dropped. Idempotent: only the first call records
    /// its note and code.
    pub fn drop(&mut self, note: impl Into<String>, code: DropCode) {
        if self.is_dropped() {
            return;
        }
        self.status = InvocationStatus::Dropped;
        self.note = Some(note.into());
        self.code = Some(code);
    }
}
