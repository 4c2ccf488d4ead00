// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the on-disk record layout.

use std::path::{Path, PathBuf};

/// Default base directory for persistent storage.
pub const DATA_ROOT: &str = "/data";

/// File name of the redb index database under the data root.
pub const INDEX_DB_FILE: &str = "index.redb";

/// Whether `id` is safe to use as a record file stem.
///
/// Record ids arrive from URL paths; anything that could escape the entity
/// directory is rejected.
pub fn is_valid_record_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !id.starts_with('.')
}

/// Storage path utilities for the record store.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the redb index database.
    pub fn index_db(&self) -> PathBuf {
        self.root.join(INDEX_DB_FILE)
    }

    // ========== Account Paths ==========

    pub fn accounts_dir(&self) -> PathBuf {
        self.root.join("accounts")
    }

    pub fn account(&self, account_id: &str) -> PathBuf {
        self.accounts_dir().join(format!("{account_id}.json"))
    }

    // ========== Node Paths ==========

    pub fn nodes_dir(&self) -> PathBuf {
        self.root.join("nodes")
    }

    pub fn node(&self, node_id: &str) -> PathBuf {
        self.nodes_dir().join(format!("{node_id}.json"))
    }

    // ========== Chain Paths ==========

    pub fn chains_dir(&self) -> PathBuf {
        self.root.join("chains")
    }

    pub fn chain(&self, chain_id: &str) -> PathBuf {
        self.chains_dir().join(format!("{chain_id}.json"))
    }

    // ========== Provider / Gateway Paths ==========

    pub fn providers_dir(&self) -> PathBuf {
        self.root.join("providers")
    }

    pub fn provider(&self, provider_id: &str) -> PathBuf {
        self.providers_dir().join(format!("{provider_id}.json"))
    }

    pub fn gateways_dir(&self) -> PathBuf {
        self.root.join("gateways")
    }

    pub fn gateway(&self, gateway_id: &str) -> PathBuf {
        self.gateways_dir().join(format!("{gateway_id}.json"))
    }

    pub fn rpc_endpoints_dir(&self) -> PathBuf {
        self.root.join("rpc_endpoints")
    }

    pub fn rpc_endpoint(&self, endpoint_id: &str) -> PathBuf {
        self.rpc_endpoints_dir().join(format!("{endpoint_id}.json"))
    }

    // ========== Custodial Key Paths ==========

    /// Directory holding encrypted custodial keys, one file per address.
    pub fn custodial_dir(&self) -> PathBuf {
        self.root.join("custodial")
    }

    pub fn custodial(&self, address: &str) -> PathBuf {
        self.custodial_dir().join(format!("{address}.json"))
    }

    // ========== Invitation Paths ==========

    pub fn invitations_dir(&self) -> PathBuf {
        self.root.join("invitations")
    }

    pub fn invitation(&self, invitation_id: &str) -> PathBuf {
        self.invitations_dir().join(format!("{invitation_id}.json"))
    }

    // ========== Gateway Log Paths ==========

    /// Directory holding log lines shipped by gateways.
    pub fn gateway_logs_dir(&self) -> PathBuf {
        self.root.join("gateway_logs")
    }

    /// Daily log file for one gateway and stream (`error`, `info`, ...).
    pub fn gateway_log_file(&self, stream: &str, gateway_id: &str, date: &str) -> PathBuf {
        self.gateway_logs_dir()
            .join(stream)
            .join(gateway_id)
            .join(format!("{date}.jsonl"))
    }

    // ========== Audit Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Path to the audit log for a specific date (`YYYY-MM-DD`).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_dir().join(format!("{date}.jsonl"))
    }

    /// Every record directory created on initialisation.
    pub fn record_dirs(&self) -> [PathBuf; 10] {
        [
            self.accounts_dir(),
            self.nodes_dir(),
            self.chains_dir(),
            self.providers_dir(),
            self.gateways_dir(),
            self.rpc_endpoints_dir(),
            self.custodial_dir(),
            self.invitations_dir(),
            self.gateway_logs_dir(),
            self.audit_dir(),
        ]
    }
}
