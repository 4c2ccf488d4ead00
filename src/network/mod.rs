// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External RPC network access.
//!
//! Routing and the HTTP handlers depend on [`NetworkQuery`] rather than the
//! concrete [`PoktClient`], so tests can substitute a scripted network.

pub mod client;
pub mod types;

use async_trait::async_trait;

pub use client::{NetworkError, PoktClient};
pub use types::{format_balance, NodeStatus};

/// Consensus-backed reads against the external network.
///
/// Implementations never fail: an unreachable or inconsistent network
/// yields the documented default.
#[async_trait]
pub trait NetworkQuery: Send + Sync {
    /// Balance in whole units with six-decimal precision; `"0"` without consensus.
    async fn balance(&self, address: &str) -> String;

    /// Node status, or `None` without consensus or if the node is unknown.
    async fn node(&self, address: &str) -> Option<NodeStatus>;
}
