// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0

pub mod association;
pub mod audit;
pub mod config;
pub mod event_bus;
pub mod object_store;
pub mod telemetry;

pub use association::InMemoryAssociationStore;
pub use audit::{DecisionContext, PolicyAuditLogger};
pub use config::{PdpConfig, PolicyBootstrap};
pub use event_bus::{EventBus, EventBusError, EventReceiver};
pub use object_store::InMemoryObjectRepository;
