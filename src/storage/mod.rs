// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Records live as JSON files under `DATA_DIR`; everything that must be
//! unique or range-scanned lives in an embedded redb database beside them.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   index.redb            # host reservations, unique claims, tombstones
//!   accounts/{id}.json
//!   nodes/{id}.json
//!   chains/{id}.json
//!   providers/{id}.json
//!   gateways/{id}.json
//!   rpc_endpoints/{id}.json
//!   custodial/{address}.json
//!   invitations/{id}.json
//!   gateway_logs/{stream}/{gateway_id}/{date}.jsonl
//!   audit/{date}.jsonl    # Daily audit logs
//! ```

pub mod audit;
pub mod fs_store;
pub mod gateway_logs;
pub mod index_db;
pub mod paths;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use fs_store::{FileStorage, StorageError, StorageResult};
pub use gateway_logs::{GatewayLogRepository, GatewayLogStream};
pub use index_db::{
    ClaimKind, ClaimOutcome, HostReservation, IndexDb, IndexDbError, IndexDbResult,
    ReserveOutcome,
};
pub use paths::StoragePaths;
pub use repository::{
    AccountRepository, AccountResponse, ChainHostBinding, ChainRepository, CustodialRepository,
    GatewayRepository, InvitationRepository, NodeRepository, ProviderRepository, ProviderResponse,
    RpcEndpointRepository, StoredAccount, StoredChain, StoredCustodialKey, StoredGateway,
    StoredInvitation, StoredNode, StoredProvider, StoredRpcEndpoint,
};
