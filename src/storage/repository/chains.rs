// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain catalogue repository.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::paths::is_valid_record_id;
use super::super::{FileStorage, StorageError, StorageResult};

/// An external blockchain network relay traffic can be routed to.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredChain {
    /// Short network identifier, e.g. `0001`. Appears in derived hosts.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub portal_prefix: String,
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub blockchain: String,
    /// Relay allowance per account.
    #[serde(default)]
    pub allowance: u64,
    pub enabled: bool,
    /// Only partner accounts may bind this chain.
    #[serde(default)]
    pub is_partner_chain: bool,
}

pub struct ChainRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> ChainRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self, chain_id: &str) -> bool {
        is_valid_record_id(chain_id) && self.storage.exists(self.storage.paths().chain(chain_id))
    }

    pub fn get(&self, chain_id: &str) -> StorageResult<StoredChain> {
        if !self.exists(chain_id) {
            return Err(StorageError::NotFound(format!("Chain {chain_id}")));
        }
        self.storage.read_json(self.storage.paths().chain(chain_id))
    }

    /// Insert or replace a chain definition.
    pub fn save(&self, chain: &StoredChain) -> StorageResult<()> {
        if !is_valid_record_id(&chain.id) {
            return Err(StorageError::NotFound(format!("Chain {}", chain.id)));
        }
        self.storage.write_json(self.storage.paths().chain(&chain.id), chain)
    }

    pub fn list_all(&self) -> StorageResult<Vec<StoredChain>> {
        let ids = self.storage.list_files(self.storage.paths().chains_dir(), "json")?;
        Ok(ids.iter().filter_map(|id| self.get(id).ok()).collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::fs_store::tests::temp_storage;
    use std::fs;

    pub(crate) fn chain(id: &str, enabled: bool, partner: bool) -> StoredChain {
        StoredChain {
            id: id.into(),
            name: format!("Chain {id}"),
            portal_prefix: String::new(),
            ticker: "TKN".into(),
            description: String::new(),
            blockchain: "test".into(),
            allowance: 0,
            enabled,
            is_partner_chain: partner,
        }
    }

    #[test]
    fn save_replaces_and_lists_sorted() {
        let storage = temp_storage();
        let repo = ChainRepository::new(&storage);

        repo.save(&chain("0021", true, false)).unwrap();
        repo.save(&chain("0001", false, false)).unwrap();
        repo.save(&chain("0001", true, true)).unwrap();

        let all = repo.list_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "0001");
        assert!(all[0].enabled && all[0].is_partner_chain);
        fs::remove_dir_all(storage.paths().root()).ok();
    }

    #[test]
    fn minimal_json_uses_defaults() {
        let parsed: StoredChain =
            serde_json::from_str(r#"{"id":"0003","name":"Three","enabled":true}"#).unwrap();
        assert!(!parsed.is_partner_chain);
        assert_eq!(parsed.allowance, 0);
    }
}
