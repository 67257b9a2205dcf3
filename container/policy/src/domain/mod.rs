// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Layer
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`role`] | `Role` hierarchy |
//! | [`policy`] | `PolicyTable`, `PolicyRule`, `PolicyEntry`, `PolicyConfigError` |
//! | [`role_directory`] | `RoleDirectory`, role bindings and user attributes |
//! | [`envelope`] | `Envelope` headers and `Payload` |
//! | [`invocation`] | `Invocation` decision record, `DropCode` |
//! | [`graph`] | linked object graph and the `ObjectRepository` seam |
//! | [`association`] | `AssociationQuery` seam, `OWNED_BY` |
//! | [`events`] | `PolicyEvent` |

pub mod association;
pub mod envelope;
pub mod events;
pub mod graph;
pub mod invocation;
pub mod policy;
pub mod role;
pub mod role_directory;

pub use association::{AssociationError, AssociationQuery, AssociationTriple, OWNED_BY};
pub use envelope::{Envelope, LinkedPayload, Payload};
pub use events::PolicyEvent;
pub use graph::{FieldValue, GraphError, LinkRef, ObjectNode, ObjectRepository, TypeId};
pub use invocation::{DropCode, Invocation, InvocationId, InvocationStatus};
pub use policy::{PolicyConfigError, PolicyEntry, PolicyRule, PolicyTable};
pub use role::Role;
pub use role_directory::{Identity, RoleDirectory, RoleSource};
