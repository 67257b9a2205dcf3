// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0
//! # Role Directory
//!
//! Maps subject identities to role-list membership and user attributes.
//!
//! Built once at startup from the user role database. Subjects are listed by
//! their authentication subject (e.g. a certificate DN); the registry-assigned
//! **ooi id** is bound later, on first login, through
//! [`RoleDirectory::bind_identity`]. Requests carry the ooi id in `user-id`,
//! so role checks on the request path look up by ooi id.
//!
//! ## Concurrency
//!
//! Each role list, and the attribute list, sits behind its own
//! `parking_lot::RwLock`: request-path reads take a shared lock and never
//! suspend; identity binding takes the exclusive lock of the single list it
//! touches.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::role::Role;

pub const ADMIN_ROLE: &str = "ADMIN";
pub const DATA_PROVIDER_ROLE: &str = "DATA_PROVIDER";
pub const DISPATCHER_QUEUE_ATTRIBUTE: &str = "dispatcher-id";

/// Raw user role database document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSource {
    /// Role list name → subjects.
    #[serde(default)]
    pub roles: HashMap<String, Vec<String>>,
    /// Subject → attribute map.
    #[serde(default, rename = "user-attributes")]
    pub user_attributes: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleBinding {
    pub subject: String,
    pub ooi_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRecord {
    pub subject: String,
    pub ooi_id: Option<String>,
    pub attributes: HashMap<String, String>,
}

/// Which identifier a lookup is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity<'a> {
    Subject(&'a str),
    OoiId(&'a str),
}

impl Identity<'_> {
    fn matches(&self, subject: &str, ooi_id: Option<&str>) -> bool {
        match self {
            Identity::Subject(s) => *s == subject,
            Identity::OoiId(id) => ooi_id == Some(*id),
        }
    }
}

#[derive(Debug, Default)]
pub struct RoleDirectory {
    roles: HashMap<String, RwLock<Vec<RoleBinding>>>,
    attributes: RwLock<Vec<AttributeRecord>>,
}

impl RoleDirectory {
    pub fn from_source(source: &RoleSource) -> Self {
        // ADMIN and DATA_PROVIDER always exist, even when the database omits them
        let mut roles: HashMap<String, RwLock<Vec<RoleBinding>>> = [ADMIN_ROLE, DATA_PROVIDER_ROLE]
            .into_iter()
            .map(|name| (name.to_string(), RwLock::new(Vec::new())))
            .collect();

        for (role, subjects) in &source.roles {
            let mut bindings: Vec<RoleBinding> = Vec::with_capacity(subjects.len());
            for subject in subjects {
                if bindings.iter().any(|b| &b.subject == subject) {
                    debug!(role = %role, subject = %subject, "Ignoring duplicate role binding");
                    continue;
                }
                bindings.push(RoleBinding {
                    subject: subject.clone(),
                    ooi_id: None,
                });
            }
            roles.insert(role.clone(), RwLock::new(bindings));
        }

        let attributes = source
            .user_attributes
            .iter()
            .map(|(subject, attributes)| AttributeRecord {
                subject: subject.clone(),
                ooi_id: None,
                attributes: attributes.clone(),
            })
            .collect();

        info!(
            role_lists = roles.len(),
            attribute_records = source.user_attributes.len(),
            "Role directory initialised"
        );

        Self {
            roles,
            attributes: RwLock::new(attributes),
        }
    }

    /// Linear scan of the named role list. Unknown role lists hold nobody.
    pub fn has_role(&self, identity: Identity<'_>, role: &str) -> bool {
        self.roles.get(role).is_some_and(|list| {
            list.read()
                .iter()
                .any(|b| identity.matches(&b.subject, b.ooi_id.as_deref()))
        })
    }

    pub fn subject_has_role(&self, subject: &str, role: &str) -> bool {
        self.has_role(Identity::Subject(subject), role)
    }

    pub fn user_has_role(&self, ooi_id: &str, role: &str) -> bool {
        self.has_role(Identity::OoiId(ooi_id), role)
    }

    pub fn subject_has_admin_role(&self, subject: &str) -> bool {
        self.subject_has_role(subject, ADMIN_ROLE)
    }

    pub fn user_has_admin_role(&self, ooi_id: &str) -> bool {
        self.user_has_role(ooi_id, ADMIN_ROLE)
    }

    pub fn subject_has_data_provider_role(&self, subject: &str) -> bool {
        self.subject_has_role(subject, DATA_PROVIDER_ROLE)
    }

    pub fn user_has_data_provider_role(&self, ooi_id: &str) -> bool {
        self.user_has_role(ooi_id, DATA_PROVIDER_ROLE)
    }

    /// Bind a registry ooi id to `subject` in the named role list.
    ///
    /// Returns `false` when the subject is not listed; the directory is left
    /// unchanged in that case.
    pub fn bind_identity(&self, subject: &str, ooi_id: &str, role: &str) -> bool {
        let Some(list) = self.roles.get(role) else {
            warn!(
                role = %role,
                subject = %subject,
                "Identity binding for unknown role list ignored"
            );
            return false;
        };

        let mut guard = list.write();
        match guard.iter_mut().find(|b| b.subject == subject) {
            Some(binding) => {
                binding.ooi_id = Some(ooi_id.to_string());
                info!(role = %role, subject = %subject, ooi_id = %ooi_id, "Bound identity to role");
                true
            }
            None => {
                debug!(role = %role, subject = %subject, "No role binding matched subject");
                false
            }
        }
    }

    pub fn bind_admin_identity(&self, subject: &str, ooi_id: &str) -> bool {
        self.bind_identity(subject, ooi_id, ADMIN_ROLE)
    }

    pub fn bind_data_provider_identity(&self, subject: &str, ooi_id: &str) -> bool {
        self.bind_identity(subject, ooi_id, DATA_PROVIDER_ROLE)
    }

    /// Bind an ooi id to the subject's attribute record. Same no-match
    /// semantics as [`RoleDirectory::bind_identity`].
    pub fn bind_attribute_identity(&self, subject: &str, ooi_id: &str) -> bool {
        let mut guard = self.attributes.write();
        match guard.iter_mut().find(|r| r.subject == subject) {
            Some(record) => {
                record.ooi_id = Some(ooi_id.to_string());
                true
            }
            None => false,
        }
    }

    pub fn attribute_value(&self, identity: Identity<'_>, attribute: &str) -> Option<String> {
        self.attributes
            .read()
            .iter()
            .find(|r| identity.matches(&r.subject, r.ooi_id.as_deref()))
            .and_then(|r| r.attributes.get(attribute).cloned())
    }

    pub fn subject_has_attribute(&self, subject: &str, attribute: &str) -> bool {
        self.attribute_value(Identity::Subject(subject), attribute).is_some()
    }

    pub fn user_has_attribute(&self, ooi_id: &str, attribute: &str) -> bool {
        self.attribute_value(Identity::OoiId(ooi_id), attribute).is_some()
    }

    pub fn user_has_dispatcher_queue(&self, ooi_id: &str) -> bool {
        self.user_has_attribute(ooi_id, DISPATCHER_QUEUE_ATTRIBUTE)
    }

    pub fn dispatcher_queue_for_user(&self, ooi_id: &str) -> Option<String> {
        self.attribute_value(Identity::OoiId(ooi_id), DISPATCHER_QUEUE_ATTRIBUTE)
    }

    /// Base role for a request's `user-id`. Never yields [`Role::Owner`]:
    /// ownership is only established by the ownership check.
    pub fn resolve_role(&self, user_id: Option<&str>, anonymous_user_id: &str) -> Role {
        match user_id {
            None => Role::Anonymous,
            Some(id) if id == anonymous_user_id => Role::Anonymous,
            Some(id) if self.user_has_admin_role(id) => Role::Admin,
            Some(_) => Role::Authenticated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> RoleDirectory {
        let source: RoleSource = serde_yaml::from_str(
            r#"
roles:
  ADMIN: [/DC=org/CN=Alice, /DC=org/CN=Alice]
  DATA_PROVIDER: [/DC=org/CN=Bob]
user-attributes:
  /DC=org/CN=Bob:
    dispatcher-id: dispatcher.bob
    email: bob@example.org
"#,
        )
        .unwrap();
        RoleDirectory::from_source(&source)
    }

    #[test]
    fn test_subject_lookup_before_and_after_binding() {
        let dir = directory();
        assert!(dir.subject_has_admin_role("/DC=org/CN=Alice"));
        assert!(!dir.user_has_admin_role("ooi-alice"));

        assert!(dir.bind_admin_identity("/DC=org/CN=Alice", "ooi-alice"));
        assert!(dir.user_has_admin_role("ooi-alice"));
        assert!(!dir.user_has_data_provider_role("ooi-alice"));
    }

    #[test]
    fn test_data_provider_binding() {
        let dir = directory();
        assert!(dir.subject_has_data_provider_role("/DC=org/CN=Bob"));
        assert!(!dir.bind_data_provider_identity("/DC=org/CN=Alice", "ooi-alice"));

        assert!(dir.bind_data_provider_identity("/DC=org/CN=Bob", "ooi-bob"));
        assert!(dir.user_has_data_provider_role("ooi-bob"));
        assert!(!dir.user_has_admin_role("ooi-bob"));
    }

    #[test]
    fn test_duplicate_subjects_collapse_to_one_binding() {
        let dir = directory();
        assert_eq!(dir.roles[ADMIN_ROLE].read().len(), 1);
    }

    #[test]
    fn test_bind_unknown_subject_is_reported_and_harmless() {
        let dir = directory();
        assert!(!dir.bind_admin_identity("/DC=org/CN=Mallory", "ooi-mallory"));
        assert!(!dir.bind_identity("/DC=org/CN=Alice", "ooi-alice", "NO_SUCH_ROLE"));
        assert!(!dir.user_has_admin_role("ooi-mallory"));
        assert!(!dir.user_has_role("ooi-alice", "NO_SUCH_ROLE"));
    }

    #[test]
    fn test_attributes_by_subject_and_ooi_id() {
        let dir = directory();
        assert_eq!(
            dir.attribute_value(Identity::Subject("/DC=org/CN=Bob"), "email").as_deref(),
            Some("bob@example.org")
        );
        assert!(dir.subject_has_attribute("/DC=org/CN=Bob", DISPATCHER_QUEUE_ATTRIBUTE));
        assert!(!dir.subject_has_attribute("/DC=org/CN=Bob", "phone"));
        assert!(!dir.subject_has_attribute("/DC=org/CN=Alice", "email"));
        assert!(!dir.user_has_dispatcher_queue("ooi-bob"));

        assert!(dir.bind_attribute_identity("/DC=org/CN=Bob", "ooi-bob"));
        assert_eq!(dir.dispatcher_queue_for_user("ooi-bob").as_deref(), Some("dispatcher.bob"));
        assert!(!dir.user_has_attribute("ooi-bob", "phone"));
        assert!(!dir.bind_attribute_identity("/DC=org/CN=Nobody", "ooi-x"));
    }

    #[test]
    fn test_resolve_role() {
        let dir = directory();
        dir.bind_admin_identity("/DC=org/CN=Alice", "ooi-alice");

        assert_eq!(dir.resolve_role(None, "ANONYMOUS"), Role::Anonymous);
        assert_eq!(dir.resolve_role(Some("ANONYMOUS"), "ANONYMOUS"), Role::Anonymous);
        assert_eq!(dir.resolve_role(Some("ooi-alice"), "ANONYMOUS"), Role::Admin);
        assert_eq!(dir.resolve_role(Some("ooi-bob"), "ANONYMOUS"), Role::Authenticated);
    }

    #[test]
    fn test_concurrent_binding_and_reads() {
        let dir = std::sync::Arc::new(directory());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let dir = dir.clone();
                std::thread::spawn(move || {
                    dir.bind_admin_identity("/DC=org/CN=Alice", &format!("ooi-{i}"));
                    dir.subject_has_admin_role("/DC=org/CN=Alice")
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        let bound = dir.roles[ADMIN_ROLE].read()[0].ooi_id.clone();
        assert!(bound.is_some_and(|id| id.starts_with("ooi-")));
    }
}
