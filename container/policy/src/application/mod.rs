// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0

pub mod interceptor;
pub mod ownership;

pub use interceptor::{
    AuthorizationInterceptor, Clock, Decision, EnvelopeError, EnvelopeInterceptor, FixedClock,
    Stage, SystemClock, Verdict,
};
pub use ownership::{OwnershipError, OwnershipReport, OwnershipResolver};
