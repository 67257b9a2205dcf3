// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0
//! Domain events emitted by the policy decision point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::invocation::{DropCode, InvocationId};
use super::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyEvent {
    RequestAuthorized {
        invocation_id: InvocationId,
        service: String,
        operation: String,
        user_id: Option<String>,
        role: Role,
        /// `true` when access was granted through the ownership check.
        via_ownership: bool,
        /// Resources whose ownership was confirmed; zero for role grants.
        #[serde(default)]
        resources_verified: usize,
        authorized_at: DateTime<Utc>,
    },
    RequestDropped {
        invocation_id: InvocationId,
        service: Option<String>,
        operation: Option<String>,
        user_id: Option<String>,
        code: DropCode,
        note: String,
        dropped_at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_event_dropped_serialization() {
        let event = PolicyEvent::RequestDropped {
            invocation_id: InvocationId::new(),
            service: Some("ds".to_string()),
            operation: Some("get_data".to_string()),
            user_id: Some("ooi-1".to_string()),
            code: DropCode::Unauthorized,
            note: "Not authorized".to_string(),
            dropped_at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "request_dropped");
        assert_eq!(json["code"], "UNAUTHORIZED");

        let deserialized: PolicyEvent = serde_json::from_value(json).unwrap();
        if let PolicyEvent::RequestDropped { note, .. } = deserialized {
            assert_eq!(note, "Not authorized");
        } else {
            panic!("unexpected variant");
        }
    }
}
