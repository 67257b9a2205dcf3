// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0
//! # Authorization Interceptor (Policy Decision Point)
//!
//! Sits in the inbound interceptor chain and decides, per message, whether a
//! request may proceed. Rejections are expressed exclusively through
//! [`Invocation::drop`]; the interceptor never returns an error for expected
//! conditions.
//!
//! ## Decision Pipeline
//!
//! ```text
//! Invocation
//!   └─ performative != "request"          → pass through untouched
//!   └─ VALIDATING       user-id, expiry, receiver, op present (in order)
//!                       expiry parses as integer            → else BAD_REQUEST
//!   └─ (role)           service = last '.' segment of receiver
//!                       role = ANONYMOUS | AUTHENTICATED | ADMIN
//!   └─ POLICY_CHECKED   no rule for (service, op)           → continue
//!                       role ∈ allowed                      → continue
//!                       OWNER ∈ allowed                     → OWNERSHIP_PENDING
//!                       otherwise                           → UNAUTHORIZED
//!   └─ OWNERSHIP_PENDING  OwnershipResolver::check           → continue / drop
//!   └─ EXPIRY_CHECKED   expiry > 0 && expiry < now          → UNAUTHORIZED
//!   └─ ALLOWED
//! ```
//!
//! Each invocation is evaluated strictly sequentially. The ownership check's
//! link resolutions and association queries are the only suspension points,
//! and each one is bounded by the resolver's timeout.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::application::ownership::{OwnershipReport, OwnershipResolver};
use crate::domain::association::AssociationQuery;
use crate::domain::envelope::{Envelope, EXPIRY, OP, RECEIVER, USER_ID};
use crate::domain::invocation::{DropCode, Invocation};
use crate::domain::policy::PolicyTable;
use crate::domain::role::Role;
use crate::domain::role_directory::RoleDirectory;
use crate::infrastructure::audit::{DecisionContext, PolicyAuditLogger};
use crate::infrastructure::config::{PdpConfig, PolicyBootstrap};

const NOT_AUTHORIZED: &str = "Not authorized";
const EXPIRED: &str = "Not authorized: authentication expired";

/// Envelope validation failures. All of them drop the request as `BAD_REQUEST`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("Error: missing {0} in message header")]
    MissingHeader(&'static str),
    #[error("Error: {0} header has an unexpected type")]
    InvalidHeader(&'static str),
    #[error("Error: expiry header is not an integer epoch: {0}")]
    InvalidExpiry(String),
    #[error("Error: request content is not a linked object graph")]
    NotLinked,
}

impl EnvelopeError {
    pub fn drop_code(&self) -> DropCode {
        DropCode::BadRequest
    }
}

/// Pipeline state in which a decision was reached. Role resolution never
/// decides on its own, so it has no stage here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Validating,
    PolicyChecked,
    OwnershipPending,
    ExpiryChecked,
    Allowed,
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Not a request; no checks were applied.
    PassThrough,
    Allowed,
    Dropped,
}

/// Outcome of one evaluation, returned alongside the invocation mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    /// For drops, the stage that rejected the request.
    pub stage: Stage,
    pub role: Option<Role>,
    /// Present when access was granted through the ownership check.
    pub ownership: Option<OwnershipReport>,
    pub code: Option<DropCode>,
    pub note: Option<String>,
}

impl Decision {
    fn pass_through() -> Self {
        Self {
            verdict: Verdict::PassThrough,
            stage: Stage::Validating,
            role: None,
            ownership: None,
            code: None,
            note: None,
        }
    }

    fn allowed(grant: Grant) -> Self {
        Self {
            verdict: Verdict::Allowed,
            stage: Stage::Allowed,
            role: Some(grant.role),
            ownership: grant.ownership,
            code: None,
            note: None,
        }
    }

    fn dropped(rejection: &Rejection) -> Self {
        Self {
            verdict: Verdict::Dropped,
            stage: rejection.stage,
            role: rejection.role,
            ownership: None,
            code: Some(rejection.code),
            note: Some(rejection.note.clone()),
        }
    }

    /// `true` for allowed and pass-through messages.
    pub fn is_allowed(&self) -> bool {
        self.verdict != Verdict::Dropped
    }

    pub fn via_ownership(&self) -> bool {
        self.ownership.is_some()
    }
}

/// Source of the current epoch time used by the expiry check.
pub trait Clock: Send + Sync {
    fn now_epoch_secs(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Clock frozen at a given epoch second.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}

/// A stage in the inbound/outbound message processing chain.
#[async_trait]
pub trait EnvelopeInterceptor: Send + Sync {
    /// Inbound hook. May drop the invocation.
    async fn before(&self, invocation: &mut Invocation);

    /// Outbound hook.
    async fn after(&self, _invocation: &mut Invocation) {}
}

struct RequestHeaders {
    user_id: Option<String>,
    expiry: i64,
    service: String,
    operation: String,
}

struct Grant {
    role: Role,
    ownership: Option<OwnershipReport>,
}

struct Rejection {
    stage: Stage,
    code: DropCode,
    note: String,
    role: Option<Role>,
}

impl Rejection {
    fn new(stage: Stage, code: DropCode, note: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            stage,
            code,
            note: note.into(),
            role,
        }
    }
}

impl From<EnvelopeError> for Rejection {
    fn from(e: EnvelopeError) -> Self {
        Rejection::new(Stage::Validating, e.drop_code(), e.to_string(), None)
    }
}

pub struct AuthorizationInterceptor {
    policy: Arc<PolicyTable>,
    roles: Arc<RoleDirectory>,
    ownership: OwnershipResolver,
    audit: PolicyAuditLogger,
    anonymous_user_id: String,
    clock: Arc<dyn Clock>,
}

impl AuthorizationInterceptor {
    pub fn new(
        policy: Arc<PolicyTable>,
        roles: Arc<RoleDirectory>,
        ownership: OwnershipResolver,
        anonymous_user_id: impl Into<String>,
    ) -> Self {
        Self {
            policy,
            roles,
            ownership,
            audit: PolicyAuditLogger::new(),
            anonymous_user_id: anonymous_user_id.into(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Wire an interceptor from loaded configuration.
    pub fn from_bootstrap(
        bootstrap: PolicyBootstrap,
        association: Arc<dyn AssociationQuery>,
        config: &PdpConfig,
    ) -> Self {
        let ownership = OwnershipResolver::new(association, config.association_timeout)
            .with_predicate(config.owned_by_predicate.clone());
        Self::new(
            Arc::new(bootstrap.policy_table),
            Arc::new(bootstrap.role_directory),
            ownership,
            config.anonymous_user_id.clone(),
        )
    }

    pub fn with_audit(mut self, audit: PolicyAuditLogger) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn roles(&self) -> &Arc<RoleDirectory> {
        &self.roles
    }

    /// Decide on `invocation`, dropping it on rejection.
    ///
    /// An invocation that is already dropped is left untouched and its
    /// existing reason is reported.
    pub async fn evaluate(&self, invocation: &mut Invocation) -> Decision {
        if invocation.is_dropped() {
            return Decision {
                verdict: Verdict::Dropped,
                stage: Stage::Dropped,
                role: None,
                ownership: None,
                code: invocation.code(),
                note: invocation.note().map(str::to_string),
            };
        }

        if !invocation.message.is_request() {
            debug!(
                invocation_id = %invocation.id,
                "Policy Interceptor: non-request message passes through"
            );
            return Decision::pass_through();
        }

        match self.decide(&invocation.message).await {
            Ok((headers, grant)) => {
                self.audit.record_allow(
                    invocation.id,
                    &headers.service,
                    &headers.operation,
                    headers.user_id.as_deref(),
                    grant.role,
                    grant.ownership.map(|report| report.resources_verified),
                );
                Decision::allowed(grant)
            }
            Err(rejection) => {
                let context = decision_context(&invocation.message);
                self.audit
                    .record_drop(invocation.id, &context, rejection.code, &rejection.note);
                invocation.drop(rejection.note.clone(), rejection.code);
                Decision::dropped(&rejection)
            }
        }
    }

    async fn decide(&self, envelope: &Envelope) -> Result<(RequestHeaders, Grant), Rejection> {
        let headers = parse_headers(envelope).map_err(|e| {
            error!(error = %e, "Policy Interceptor: malformed request");
            Rejection::from(e)
        })?;

        let role = self
            .roles
            .resolve_role(headers.user_id.as_deref(), &self.anonymous_user_id);
        debug!(
            service = %headers.service,
            operation = %headers.operation,
            role = %role,
            "Policy Interceptor: role resolved"
        );

        let mut ownership = None;
        match self.policy.lookup(&headers.service, &headers.operation) {
            None => {
                debug!(
                    service = %headers.service,
                    operation = %headers.operation,
                    "No policy rule; allowing by default"
                );
            }
            Some(rule) if rule.allows(role) => {}
            Some(rule) if rule.requires_ownership_check() => {
                // A null user-id queries as the anonymous sentinel, which owns nothing
                let requester = headers
                    .user_id
                    .as_deref()
                    .unwrap_or(&self.anonymous_user_id);

                let payload = envelope.content.as_linked().ok_or_else(|| {
                    let e = EnvelopeError::NotLinked;
                    let note = e.to_string();
                    Rejection::new(Stage::OwnershipPending, e.drop_code(), note, Some(role))
                })?;

                let started = Instant::now();
                let result = self
                    .ownership
                    .check(payload, requester, &rule.resource_fields)
                    .await;
                metrics::histogram!("pdp_ownership_check_seconds")
                    .record(started.elapsed().as_secs_f64());

                let report = result.map_err(|e| {
                    Rejection::new(
                        Stage::OwnershipPending,
                        e.drop_code(),
                        e.to_string(),
                        Some(role),
                    )
                })?;
                ownership = Some(report);
            }
            Some(_) => {
                return Err(Rejection::new(
                    Stage::PolicyChecked,
                    DropCode::Unauthorized,
                    NOT_AUTHORIZED,
                    Some(role),
                ));
            }
        }

        let now = self.clock.now_epoch_secs();
        if headers.expiry > 0 && headers.expiry < now {
            warn!(expiry = headers.expiry, now, "Policy Interceptor: message expired");
            return Err(Rejection::new(
                Stage::ExpiryChecked,
                DropCode::Unauthorized,
                EXPIRED,
                Some(role),
            ));
        }

        Ok((headers, Grant { role, ownership }))
    }
}

#[async_trait]
impl EnvelopeInterceptor for AuthorizationInterceptor {
    async fn before(&self, invocation: &mut Invocation) {
        self.evaluate(invocation).await;
    }
}

fn parse_headers(envelope: &Envelope) -> Result<RequestHeaders, EnvelopeError> {
    for name in [USER_ID, EXPIRY, RECEIVER, OP] {
        if !envelope.has_header(name) {
            return Err(EnvelopeError::MissingHeader(name));
        }
    }

    let user_id = match envelope.header(USER_ID) {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Null) | None => None,
        Some(_) => return Err(EnvelopeError::InvalidHeader(USER_ID)),
    };

    let expiry = match envelope.header(EXPIRY) {
        Some(Value::String(raw)) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| EnvelopeError::InvalidExpiry(raw.clone()))?,
        Some(other) => return Err(EnvelopeError::InvalidExpiry(other.to_string())),
        None => return Err(EnvelopeError::MissingHeader(EXPIRY)),
    };

    let service = envelope
        .header(RECEIVER)
        .and_then(Value::as_str)
        .and_then(service_of)
        .ok_or(EnvelopeError::InvalidHeader(RECEIVER))?;

    let operation = envelope
        .header(OP)
        .and_then(Value::as_str)
        .ok_or(EnvelopeError::InvalidHeader(OP))?;

    Ok(RequestHeaders {
        user_id,
        expiry,
        service: service.to_string(),
        operation: operation.to_string(),
    })
}

/// Final dot-delimited segment of a receiver path.
fn service_of(receiver: &str) -> Option<&str> {
    receiver.rsplit('.').next().filter(|s| !s.is_empty())
}

fn decision_context(envelope: &Envelope) -> DecisionContext {
    let text = |name: &str| envelope.header(name).and_then(Value::as_str).map(str::to_string);
    DecisionContext {
        service: envelope
            .header(RECEIVER)
            .and_then(Value::as_str)
            .and_then(service_of)
            .map(str::to_string),
        operation: text(OP),
        user_id: text(USER_ID),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::envelope::{Payload, PERFORMATIVE};
    use crate::domain::graph::{ObjectNode, TypeId};
    use crate::domain::policy::PolicyEntry;
    use crate::domain::role_directory::RoleSource;
    use crate::domain::{LinkedPayload, OWNED_BY};
    use crate::infrastructure::association::InMemoryAssociationStore;
    use crate::infrastructure::object_store::InMemoryObjectRepository;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000;

    fn interceptor(
        entries: &[PolicyEntry],
        store: Arc<InMemoryAssociationStore>,
    ) -> AuthorizationInterceptor {
        let source = RoleSource {
            roles: HashMap::from([("ADMIN".to_string(), vec!["/CN=admin".to_string()])]),
            user_attributes: HashMap::new(),
        };
        let roles = RoleDirectory::from_source(&source);
        roles.bind_admin_identity("/CN=admin", "ooi-admin");

        AuthorizationInterceptor::new(
            Arc::new(PolicyTable::build(entries).unwrap()),
            Arc::new(roles),
            OwnershipResolver::new(store, Duration::from_secs(1)),
            "ANONYMOUS",
        )
        .with_clock(Arc::new(FixedClock(NOW)))
    }

    fn admin_only() -> Vec<PolicyEntry> {
        vec![PolicyEntry::new("ADMIN", "admin.purge", HashMap::new())]
    }

    fn owner_get_data() -> Vec<PolicyEntry> {
        vec![PolicyEntry::new(
            "OWNER",
            "ds.get_data",
            HashMap::from([(TypeId(10), "uuid".to_string())]),
        )]
    }

    fn anonymous_get_data(content: Payload) -> Envelope {
        Envelope::request("x", "c.ds", "get_data", "0")
            .with_header(USER_ID, Value::Null)
            .with_content(content)
    }

    #[test]
    fn test_service_is_last_receiver_segment() {
        assert_eq!(service_of("container.node1.ds"), Some("ds"));
        assert_eq!(service_of("ds"), Some("ds"));
        assert_eq!(service_of("container."), None);
    }

    #[tokio::test]
    async fn test_missing_headers_are_reported_in_order() {
        let pdp = interceptor(&admin_only(), Arc::new(InMemoryAssociationStore::new()));
        let message = Envelope::new()
            .with_header(PERFORMATIVE, "request")
            .with_header(OP, "purge");

        let mut invocation = Invocation::new(message);
        let decision = pdp.evaluate(&mut invocation).await;

        assert_eq!(decision.stage, Stage::Validating);
        assert!(!decision.is_allowed());
        assert_eq!(invocation.code(), Some(DropCode::BadRequest));
        assert!(invocation.note().unwrap().contains("missing user-id"));
    }

    #[tokio::test]
    async fn test_non_numeric_expiry_is_bad_request() {
        let pdp = interceptor(&admin_only(), Arc::new(InMemoryAssociationStore::new()));
        for expiry in [json!("soon"), json!(12), Value::Null] {
            let message = Envelope::request("ooi-admin", "c.admin", "purge", "0")
                .with_header(EXPIRY, expiry);
            let mut invocation = Invocation::new(message);
            pdp.evaluate(&mut invocation).await;
            assert_eq!(invocation.code(), Some(DropCode::BadRequest));
        }
    }

    #[tokio::test]
    async fn test_non_request_passes_through_as_allowed() {
        let pdp = interceptor(&admin_only(), Arc::new(InMemoryAssociationStore::new()));
        let message = Envelope::new().with_header(PERFORMATIVE, "inform_result");

        let mut invocation = Invocation::new(message);
        let decision = pdp.evaluate(&mut invocation).await;

        assert_eq!(decision.verdict, Verdict::PassThrough);
        assert!(decision.is_allowed());
        assert!(!decision.via_ownership());
        assert!(!invocation.is_dropped());
    }

    #[tokio::test]
    async fn test_null_user_id_is_anonymous() {
        let entries = vec![PolicyEntry::new("AUTHENTICATED", "ds.list", HashMap::new())];
        let pdp = interceptor(&entries, Arc::new(InMemoryAssociationStore::new()));
        let message = Envelope::request("x", "c.ds", "list", "0").with_header(USER_ID, Value::Null);

        let mut invocation = Invocation::new(message);
        let decision = pdp.evaluate(&mut invocation).await;

        assert_eq!(decision.role, Some(Role::Anonymous));
        assert_eq!(invocation.code(), Some(DropCode::Unauthorized));
    }

    #[tokio::test]
    async fn test_owner_rule_without_linked_content_is_bad_request() {
        let pdp = interceptor(&owner_get_data(), Arc::new(InMemoryAssociationStore::new()));
        let message = Envelope::request("ooi-1", "c.ds", "get_data", "0")
            .with_content(Payload::Opaque(json!({})));

        let mut invocation = Invocation::new(message);
        pdp.evaluate(&mut invocation).await;

        assert_eq!(invocation.code(), Some(DropCode::BadRequest));
    }

    #[tokio::test]
    async fn test_anonymous_payload_without_resources_is_allowed() {
        let store = Arc::new(InMemoryAssociationStore::new());
        let pdp = interceptor(&owner_get_data(), store.clone());
        let payload = LinkedPayload::new(
            ObjectNode::new(TypeId(1)),
            Arc::new(InMemoryObjectRepository::new()),
        );

        let mut invocation = Invocation::new(anonymous_get_data(Payload::Linked(payload)));
        let decision = pdp.evaluate(&mut invocation).await;

        assert!(decision.is_allowed());
        assert_eq!(decision.role, Some(Role::Anonymous));
        assert_eq!(decision.ownership, Some(OwnershipReport::default()));
        assert!(!invocation.is_dropped());
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn test_anonymous_opaque_payload_is_bad_request() {
        let pdp = interceptor(&owner_get_data(), Arc::new(InMemoryAssociationStore::new()));

        let mut invocation = Invocation::new(anonymous_get_data(Payload::Opaque(json!({}))));
        let decision = pdp.evaluate(&mut invocation).await;

        assert_eq!(decision.stage, Stage::OwnershipPending);
        assert_eq!(invocation.code(), Some(DropCode::BadRequest));
    }

    #[tokio::test]
    async fn test_anonymous_is_checked_as_sentinel() {
        let store = Arc::new(InMemoryAssociationStore::new());
        store.insert("ooi-1", OWNED_BY, "R1");
        let repo = InMemoryObjectRepository::new();
        let link = repo.insert(ObjectNode::new(TypeId(10)).with_field("uuid", "R1"));
        let root = ObjectNode::new(TypeId(1)).with_child(link);
        let payload = LinkedPayload::new(root, Arc::new(repo));

        let pdp = interceptor(&owner_get_data(), store.clone());
        let mut invocation = Invocation::new(anonymous_get_data(Payload::Linked(payload)));
        let decision = pdp.evaluate(&mut invocation).await;

        assert_eq!(decision.stage, Stage::OwnershipPending);
        assert_eq!(invocation.code(), Some(DropCode::Unauthorized));
        assert!(invocation.note().unwrap().contains("R1"));
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn test_expiry_applies_after_policy_grant() {
        let pdp = interceptor(&admin_only(), Arc::new(InMemoryAssociationStore::new()));
        let stale = (NOW - 1).to_string();
        let message = Envelope::request("ooi-admin", "c.admin", "purge", &stale);
        let mut invocation = Invocation::new(message);

        let decision = pdp.evaluate(&mut invocation).await;

        assert_eq!(decision.stage, Stage::ExpiryChecked);
        assert_eq!(decision.role, Some(Role::Admin));
        assert!(invocation.note().unwrap().contains("expired"));
    }

    #[tokio::test]
    async fn test_already_dropped_invocation_is_untouched() {
        let pdp = interceptor(&admin_only(), Arc::new(InMemoryAssociationStore::new()));
        let message = Envelope::request("ooi-admin", "c.admin", "purge", "0");
        let mut invocation = Invocation::new(message);
        invocation.drop("upstream rejection", DropCode::BadRequest);

        let decision = pdp.evaluate(&mut invocation).await;

        assert_eq!(decision.verdict, Verdict::Dropped);
        assert_eq!(invocation.note(), Some("upstream rejection"));
    }

    #[tokio::test]
    async fn test_before_hook_drops_and_after_is_noop() {
        let pdp = interceptor(&admin_only(), Arc::new(InMemoryAssociationStore::new()));
        let chain: Vec<Box<dyn EnvelopeInterceptor>> = vec![Box::new(pdp)];
        let message = Envelope::request("ooi-user", "c.admin", "purge", "0");
        let mut invocation = Invocation::new(message);

        for stage in &chain {
            stage.before(&mut invocation).await;
        }
        for stage in &chain {
            stage.after(&mut invocation).await;
        }

        assert_eq!(invocation.code(), Some(DropCode::Unauthorized));
        assert_eq!(invocation.note(), Some(NOT_AUTHORIZED));
    }
}
