// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Node repository. One JSON file per registered node under `nodes/`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::paths::is_valid_record_id;
use super::super::{FileStorage, StorageError, StorageResult};

/// A user-registered external-network address.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredNode {
    pub id: String,
    /// 40 lowercase hex characters.
    pub address: String,
    pub account_id: String,
    pub created_at: DateTime<Utc>,
}

pub struct NodeRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> NodeRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self, node_id: &str) -> bool {
        is_valid_record_id(node_id) && self.storage.exists(self.storage.paths().node(node_id))
    }

    pub fn get(&self, node_id: &str) -> StorageResult<StoredNode> {
        if !self.exists(node_id) {
            return Err(StorageError::NotFound(format!("Node {node_id}")));
        }
        self.storage.read_json(self.storage.paths().node(node_id))
    }

    pub fn create(&self, node: &StoredNode) -> StorageResult<()> {
        if self.exists(&node.id) {
            return Err(StorageError::AlreadyExists(format!("Node {}", node.id)));
        }
        self.storage.write_json(self.storage.paths().node(&node.id), node)
    }

    pub fn delete(&self, node_id: &str) -> StorageResult<()> {
        if !self.exists(node_id) {
            return Err(StorageError::NotFound(format!("Node {node_id}")));
        }
        self.storage.delete(self.storage.paths().node(node_id))
    }

    /// All nodes registered by one account.
    pub fn list_by_account(&self, account_id: &str) -> StorageResult<Vec<StoredNode>> {
        let ids = self.storage.list_files(self.storage.paths().nodes_dir(), "json")?;

        let mut nodes = Vec::new();
        for id in ids {
            if let Ok(node) = self.get(&id) {
                if node.account_id == account_id {
                    nodes.push(node);
                }
            }
        }
        Ok(nodes)
    }

    /// The account's node with this (already lowercased) address.
    pub fn find_by_address(
        &self,
        account_id: &str,
        address: &str,
    ) -> StorageResult<Option<StoredNode>> {
        Ok(self
            .list_by_account(account_id)?
            .into_iter()
            .find(|n| n.address == address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fs_store::tests::temp_storage;
    use std::fs;

    fn node(id: &str, account_id: &str, address: &str) -> StoredNode {
        StoredNode {
            id: id.into(),
            address: address.into(),
            account_id: account_id.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn list_and_find_are_scoped_to_account() {
        let storage = temp_storage();
        let repo = NodeRepository::new(&storage);
        let addr = "ab".repeat(20);

        repo.create(&node("n1", "acc-1", &addr)).unwrap();
        repo.create(&node("n2", "acc-2", &addr)).unwrap();
        repo.create(&node("n3", "acc-1", &"cd".repeat(20))).unwrap();

        assert_eq!(repo.list_by_account("acc-1").unwrap().len(), 2);
        let found = repo.find_by_address("acc-2", &addr).unwrap().unwrap();
        assert_eq!(found.id, "n2");
        assert!(repo
            .find_by_address("acc-3", &addr)
            .unwrap()
            .is_none());

        repo.delete("n1").unwrap();
        assert!(repo.find_by_address("acc-1", &addr).unwrap().is_none());
        fs::remove_dir_all(storage.paths().root()).ok();
    }
}
