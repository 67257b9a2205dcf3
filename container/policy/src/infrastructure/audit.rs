// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0
//! # Policy Audit Logger
//!
//! Emits a structured record for every PDP verdict.
//!
//! Every verdict increments `pdp_decisions_total{verdict, code}`. Drops are
//! written at `WARN` with the full reason; when an [`EventBus`] is attached
//! both drops and grants are also published as [`PolicyEvent`]s so audit
//! sinks can consume them off the request path.

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::events::PolicyEvent;
use crate::domain::invocation::{DropCode, InvocationId};
use crate::domain::role::Role;
use crate::infrastructure::event_bus::EventBus;

/// What the PDP knew about a request at the moment it decided.
#[derive(Debug, Clone, Default)]
pub struct DecisionContext {
    pub service: Option<String>,
    pub operation: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Clone, Default)]
pub struct PolicyAuditLogger {
    event_bus: Option<EventBus>,
}

impl PolicyAuditLogger {
    pub fn new() -> Self {
        Self { event_bus: None }
    }

    pub fn with_event_bus(event_bus: EventBus) -> Self {
        Self {
            event_bus: Some(event_bus),
        }
    }

    pub fn record_drop(
        &self,
        invocation_id: InvocationId,
        context: &DecisionContext,
        code: DropCode,
        note: &str,
    ) {
        metrics::counter!("pdp_decisions_total", "verdict" => "dropped", "code" => code.as_str())
            .increment(1);
        warn!(
            invocation_id = %invocation_id,
            service = ?context.service,
            operation = ?context.operation,
            user_id = ?context.user_id,
            code = %code,
            "Policy Interceptor: request dropped: {}",
            note
        );

        if let Some(bus) = &self.event_bus {
            bus.publish(PolicyEvent::RequestDropped {
                invocation_id,
                service: context.service.clone(),
                operation: context.operation.clone(),
                user_id: context.user_id.clone(),
                code,
                note: note.to_string(),
                dropped_at: Utc::now(),
            });
        }
    }

    /// `resources_verified` is `Some` when the grant came from the ownership
    /// check.
    pub fn record_allow(
        &self,
        invocation_id: InvocationId,
        service: &str,
        operation: &str,
        user_id: Option<&str>,
        role: Role,
        resources_verified: Option<usize>,
    ) {
        metrics::counter!("pdp_decisions_total", "verdict" => "allowed", "code" => "NONE")
            .increment(1);
        let via_ownership = resources_verified.is_some();
        info!(
            invocation_id = %invocation_id,
            service = %service,
            operation = %operation,
            role = %role,
            via_ownership,
            resources_verified = ?resources_verified,
            "Policy Interceptor: Returning Authorized."
        );

        if let Some(bus) = &self.event_bus {
            bus.publish(PolicyEvent::RequestAuthorized {
                invocation_id,
                service: service.to_string(),
                operation: operation.to_string(),
                user_id: user_id.map(str::to_string),
                role,
                via_ownership,
                resources_verified: resources_verified.unwrap_or(0),
                authorized_at: Utc::now(),
            });
        }
    }
}
