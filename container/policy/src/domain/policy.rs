// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0
//! # Policy Table
//!
//! Immutable `(service, operation) → PolicyRule` mapping built once at startup
//! from the ordered policy database.
//!
//! ## Construction
//!
//! ```text
//! ("OWNER", "ds.get_data", {TypeX: "uuid"})
//!   └─ role    → upward closure {OWNER, ADMIN}
//!   └─ action  → split on first '.' → ("ds", "get_data")
//!   └─ merge   → allowed_roles ∪= closure; resource_fields = {TypeX: "uuid"}
//! ```
//!
//! Roles accumulate across entries for the same key; the resource field map is
//! last-write-wins. Any malformed entry aborts the whole build so a partially
//! populated table is never published.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

use super::graph::TypeId;
use super::role::Role;

/// Fatal configuration errors raised while building the policy table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyConfigError {
    #[error("Unknown role '{0}' in policy database")]
    UnknownRole(String),
    #[error("Malformed action '{0}': expected '<service>.<operation>'")]
    MalformedAction(String),
}

/// One raw entry from the policy database: `[ROLE, "service.op", {TypeId: field}]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEntry(pub String, pub String, #[serde(default)] pub HashMap<TypeId, String>);

impl PolicyEntry {
    pub fn new(role: &str, action: &str, resources: HashMap<TypeId, String>) -> Self {
        Self(role.to_string(), action.to_string(), resources)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    pub service: String,
    pub operation: String,
    pub allowed_roles: BTreeSet<Role>,
    /// Object type → payload field holding the resource id. Only consulted when
    /// `OWNER` participates in `allowed_roles`.
    pub resource_fields: HashMap<TypeId, String>,
}

impl PolicyRule {
    pub fn allows(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }

    pub fn requires_ownership_check(&self) -> bool {
        self.allowed_roles.contains(&Role::Owner)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    services: HashMap<String, HashMap<String, PolicyRule>>,
}

impl PolicyTable {
    /// Build a table from the ordered policy database.
    pub fn build<'a, I>(entries: I) -> Result<Self, PolicyConfigError>
    where
        I: IntoIterator<Item = &'a PolicyEntry>,
    {
        let mut services: HashMap<String, HashMap<String, PolicyRule>> = HashMap::new();

        for PolicyEntry(role, action, resources) in entries {
            let role: Role = role.parse()?;
            let (service, operation) = split_action(action)?;

            let rule = services
                .entry(service.to_string())
                .or_default()
                .entry(operation.to_string())
                .or_insert_with(|| PolicyRule {
                    service: service.to_string(),
                    operation: operation.to_string(),
                    allowed_roles: BTreeSet::new(),
                    resource_fields: HashMap::new(),
                });
            rule.allowed_roles.extend(role.upward_closure());
            rule.resource_fields = resources.clone();
        }

        Ok(Self { services })
    }

    /// `None` when either the service or the operation has no entry.
    pub fn lookup(&self, service: &str, operation: &str) -> Option<&PolicyRule> {
        self.services.get(service)?.get(operation)
    }

    pub fn contains_service(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    pub fn len(&self) -> usize {
        self.services.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn split_action(action: &str) -> Result<(&str, &str), PolicyConfigError> {
    match action.split_once('.') {
        Some((service, operation)) if !service.is_empty() => Ok((service, operation)),
        _ => Err(PolicyConfigError::MalformedAction(action.to_string())),
    }
}
