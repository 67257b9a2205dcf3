// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0
//! # Role Hierarchy
//!
//! The four policy roles form a total order:
//!
//! ```text
//! ANONYMOUS < AUTHENTICATED < OWNER < ADMIN
//! ```
//!
//! A policy rule written for role `R` admits every role at or above `R`
//! (see [`Role::upward_closure`]). Declaration order of the enum variants is
//! the hierarchy order, so the derived `Ord` is the policy ordering.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::policy::PolicyConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Anonymous,
    Authenticated,
    Owner,
    Admin,
}

impl Role {
    /// All roles, lowest first.
    pub const ALL: [Role; 4] = [Role::Anonymous, Role::Authenticated, Role::Owner, Role::Admin];

    /// The canonical upper-case name used in policy and role databases.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Anonymous => "ANONYMOUS",
            Role::Authenticated => "AUTHENTICATED",
            Role::Owner => "OWNER",
            Role::Admin => "ADMIN",
        }
    }

    /// Every role at or above `self` in the hierarchy.
    ///
    /// `OWNER` expands to `{OWNER, ADMIN}`; `ANONYMOUS` expands to all four.
    pub fn upward_closure(self) -> BTreeSet<Role> {
        Self::ALL.into_iter().filter(|r| *r >= self).collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PolicyConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ANONYMOUS" => Ok(Role::Anonymous),
            "AUTHENTICATED" => Ok(Role::Authenticated),
            "OWNER" => Ok(Role::Owner),
            "ADMIN" => Ok(Role::Admin),
            other => Err(PolicyConfigError::UnknownRole(other.to_string())),
        }
    }
}
