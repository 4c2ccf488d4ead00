// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response records shared by several handler modules. All types
//! derive `Serialize`/`Deserialize` and `ToSchema` for JSON handling and the
//! OpenAPI document. Records private to one endpoint group live next to its
//! handlers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{IssuedSession, Role};
use crate::routing::RoutingTable;
use crate::storage::{AccountResponse, ChainHostBinding, StoredNode};

// =============================================================================
// Sessions
// =============================================================================

/// Issued bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub role: Role,
    /// Present for account sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountResponse>,
}

impl SessionResponse {
    pub fn new(session: IssuedSession, role: Role) -> Self {
        Self {
            token: session.token,
            expires_at: session.expires_at,
            role,
            account: None,
        }
    }

    pub fn with_account(mut self, account: AccountResponse) -> Self {
        self.account = Some(account);
        self
    }
}

/// Exchange an operator-issued key for a session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KeyUnlockRequest {
    pub key: String,
}

/// Re-authentication for destructive or sensitive account operations.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PasswordConfirmation {
    pub password: String,
}

// =============================================================================
// Routing
// =============================================================================

/// A single chain id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChainIdRequest {
    pub id: String,
}

/// Full replacement binding list.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateChainsRequest {
    pub chains: Vec<String>,
}

/// Current bindings of an account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChainBindingsResponse {
    pub chains: Vec<ChainHostBinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DomainRequest {
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DomainsResponse {
    pub domains: Vec<String>,
}

/// Routing table: chain id → sorted hosts.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct HostsResponse {
    pub chains: BTreeMap<String, Vec<String>>,
}

impl From<RoutingTable> for HostsResponse {
    fn from(table: RoutingTable) -> Self {
        Self {
            chains: table
                .into_iter()
                .map(|(chain, hosts)| (chain, hosts.into_iter().collect()))
                .collect(),
        }
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// A registered node as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct NodeResponse {
    pub id: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

impl From<StoredNode> for NodeResponse {
    fn from(node: StoredNode) -> Self {
        Self {
            id: node.id,
            address: node.address,
            created_at: node.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NodeListResponse {
    pub nodes: Vec<NodeResponse>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NodeAddressRequest {
    pub address: String,
}

// =============================================================================
// Generic
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn hosts_response_sorts_hosts() {
        let mut table = RoutingTable::new();
        table.insert(
            "0001".into(),
            BTreeSet::from(["b.0001.example.net".to_string(), "a.0001.example.net".to_string()]),
        );
        table.insert("0021".into(), BTreeSet::new());

        let response = HostsResponse::from(table);
        assert_eq!(
            response.chains["0001"],
            vec!["a.0001.example.net", "b.0001.example.net"]
        );
        assert!(response.chains["0021"].is_empty());
    }

    #[test]
    fn session_response_omits_missing_account() {
        let response = SessionResponse::new(
            IssuedSession {
                token: "t".into(),
                expires_at: Utc::now(),
            },
            Role::Provider,
        );
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("account").is_none());
        assert_eq!(json["role"], "provider");
    }
}
