// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Routing Engine
//!
//! Assigns every (account, chain) pair a stable hostname, keeps hostnames
//! globally unique, and builds the per-gateway routing tables providers
//! download.
//!
//! ## Write ordering
//!
//! Binding reserves the host in the index database *before* the account
//! record is updated; unbinding updates the account *before* releasing the
//! reservation. A crash in between leaves at worst an orphaned reservation,
//! which [`RoutingEngine::reconcile_reservations`] later removes. The
//! reservation write itself is a conditional put, so two concurrent binds of
//! the same host converge on one record.
//!
//! ## Modules
//!
//! - `host` - pure hostname derivation
//! - `engine` - bind / unbind / bulk replace / reconcile
//! - `table` - routing table aggregation over a paged account scan
//! - `admission` - registration guard (cooldowns, stake checks, domains, nodes)

pub mod admission;
pub mod engine;
pub mod host;
pub mod table;

use chrono::{DateTime, Utc};

pub use engine::{ReconcileReport, RoutingEngine};
pub use host::derive_host;
pub use table::{AccountScan, HostScope, RoutingTable};

use crate::registry::{IdentifierClass, RegistryError};
use crate::storage::{IndexDbError, StorageError};

/// Per-class cooldowns in hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldowns {
    pub account_hours: u32,
    pub node_hours: u32,
    pub domain_hours: u32,
}

impl Default for Cooldowns {
    fn default() -> Self {
        Self {
            account_hours: 24,
            node_hours: 24,
            domain_hours: 24,
        }
    }
}

impl Cooldowns {
    pub fn hours_for(&self, class: IdentifierClass) -> u32 {
        match class {
            IdentifierClass::Account => self.account_hours,
            IdentifierClass::Node => self.node_hours,
            IdentifierClass::Domain => self.domain_hours,
        }
    }
}

/// Tunables for the routing engine.
#[derive(Debug, Clone)]
pub struct RoutingSettings {
    /// DNS suffix appended to every derived host.
    pub base_domain: String,
    pub cooldowns: Cooldowns,
    /// Require an active stake on the external network before a node is registered.
    pub verify_node_stake: bool,
    /// Accounts per page when scanning.
    pub scan_page_size: usize,
}

impl RoutingSettings {
    pub fn new(base_domain: impl Into<String>) -> Self {
        Self {
            base_domain: base_domain.into(),
            cooldowns: Cooldowns::default(),
            verify_node_stake: true,
            scan_page_size: 100,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("Account {0} not found")]
    AccountNotFound(String),

    #[error("Chain {0} not found")]
    ChainNotFound(String),

    #[error("Chain {0} is disabled")]
    ChainDisabled(String),

    #[error("Chain {0} is restricted to partner accounts")]
    PartnerOnly(String),

    #[error("Gateway {0} not found")]
    GatewayNotFound(String),

    #[error("Provider {0} not found")]
    ProviderNotFound(String),

    #[error("Partner accounts cannot manage nodes")]
    PartnerForbidden,

    /// The derived host is held by a different (account, chain) pair.
    #[error("Host {host} is already reserved by another account")]
    Conflict { host: String },

    #[error("{class} identifier was deleted recently; available again at {available_at}")]
    Cooldown {
        class: IdentifierClass,
        available_at: DateTime<Utc>,
    },

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Node {0} is already registered")]
    NodeExists(String),

    #[error("Node {0} not found")]
    NodeNotFound(String),

    #[error("Node {0} is not actively staked on the network")]
    NodeNotStaked(String),

    #[error("Domain {0} is already bound")]
    DomainTaken(String),

    #[error("Domain {0} is not bound to this account")]
    DomainNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Index error: {0}")]
    Index(#[from] IndexDbError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

pub type RoutingResult<T> = Result<T, RoutingError>;
