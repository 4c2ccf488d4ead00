// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gateway and RPC endpoint repositories.
//!
//! A gateway belongs to one provider; the RPC endpoints declared on a
//! gateway determine which chains it serves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::paths::is_valid_record_id;
use super::super::{FileStorage, StorageError, StorageResult};

/// A provider-operated proxy instance.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredGateway {
    pub id: String,
    pub provider_id: String,
    pub region: String,
    /// Public address relays are sent to.
    pub address: String,
    #[serde(default)]
    pub private_address: String,
    pub relay_port: u16,
    pub created_at: DateTime<Utc>,
}

/// A chain endpoint declared on a gateway.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredRpcEndpoint {
    pub id: String,
    pub gateway_id: String,
    pub chain_id: String,
    /// `http` or `https`.
    pub protocol: String,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub disabled: bool,
}

pub struct GatewayRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> GatewayRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self, gateway_id: &str) -> bool {
        is_valid_record_id(gateway_id) && self.storage.exists(self.storage.paths().gateway(gateway_id))
    }

    pub fn get(&self, gateway_id: &str) -> StorageResult<StoredGateway> {
        if !self.exists(gateway_id) {
            return Err(StorageError::NotFound(format!("Gateway {gateway_id}")));
        }
        self.storage.read_json(self.storage.paths().gateway(gateway_id))
    }

    pub fn create(&self, gateway: &StoredGateway) -> StorageResult<()> {
        if self.exists(&gateway.id) {
            return Err(StorageError::AlreadyExists(format!("Gateway {}", gateway.id)));
        }
        self.storage
            .write_json(self.storage.paths().gateway(&gateway.id), gateway)
    }

    pub fn list_by_provider(&self, provider_id: &str) -> StorageResult<Vec<StoredGateway>> {
        let ids = self.storage.list_files(self.storage.paths().gateways_dir(), "json")?;
        Ok(ids
            .iter()
            .filter_map(|id| self.get(id).ok())
            .filter(|g| g.provider_id == provider_id)
            .collect())
    }
}

pub struct RpcEndpointRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> RpcEndpointRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self, endpoint_id: &str) -> bool {
        is_valid_record_id(endpoint_id)
            && self.storage.exists(self.storage.paths().rpc_endpoint(endpoint_id))
    }

    pub fn get(&self, endpoint_id: &str) -> StorageResult<StoredRpcEndpoint> {
        if !self.exists(endpoint_id) {
            return Err(StorageError::NotFound(format!("RPC endpoint {endpoint_id}")));
        }
        self.storage.read_json(self.storage.paths().rpc_endpoint(endpoint_id))
    }

    pub fn create(&self, endpoint: &StoredRpcEndpoint) -> StorageResult<()> {
        if self.exists(&endpoint.id) {
            return Err(StorageError::AlreadyExists(format!("RPC endpoint {}", endpoint.id)));
        }
        self.storage
            .write_json(self.storage.paths().rpc_endpoint(&endpoint.id), endpoint)
    }

    pub fn list_by_gateway(&self, gateway_id: &str) -> StorageResult<Vec<StoredRpcEndpoint>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().rpc_endpoints_dir(), "json")?;
        Ok(ids
            .iter()
            .filter_map(|id| self.get(id).ok())
            .filter(|e| e.gateway_id == gateway_id)
            .collect())
    }
}
