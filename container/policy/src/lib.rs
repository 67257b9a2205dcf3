// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0
//! # `capcontainer-policy`: Policy Decision Point
//!
//! Authorization interceptor for capability-container messaging. Every
//! inbound `request` passes through [`application::AuthorizationInterceptor`],
//! which validates the envelope, resolves the requester's role, consults the
//! [`domain::PolicyTable`], optionally verifies resource ownership by walking
//! the payload's linked object graph, and enforces message expiry.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | policy table, role directory, envelope, invocation, graph seams |
//! | [`application`] | Application | `AuthorizationInterceptor`, `OwnershipResolver` |
//! | [`infrastructure`] | Infrastructure | config, in-memory collaborators, audit, telemetry |

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
