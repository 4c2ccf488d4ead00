// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custodial key repository.
//!
//! Stores the encrypted private key blob for every server-generated keypair.
//! The blob is opaque here; only the vault can open it.

use serde::{Deserialize, Serialize};

use super::super::paths::is_valid_record_id;
use super::super::{FileStorage, StorageError, StorageResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredCustodialKey {
    pub address: String,
    /// Hex-encoded ed25519 public key.
    pub public_key: String,
    /// Vault blob wrapping the hex-encoded secret key.
    pub private_key_encrypted: String,
}

pub struct CustodialRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> CustodialRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self, address: &str) -> bool {
        is_valid_record_id(address) && self.storage.exists(self.storage.paths().custodial(address))
    }

    pub fn get(&self, address: &str) -> StorageResult<StoredCustodialKey> {
        if !self.exists(address) {
            return Err(StorageError::NotFound(format!("Custodial key {address}")));
        }
        self.storage.read_json(self.storage.paths().custodial(address))
    }

    pub fn create(&self, key: &StoredCustodialKey) -> StorageResult<()> {
        if self.exists(&key.address) {
            return Err(StorageError::AlreadyExists(format!(
                "Custodial key {}",
                key.address
            )));
        }
        self.storage
            .write_json(self.storage.paths().custodial(&key.address), key)
    }

    pub fn delete(&self, address: &str) -> StorageResult<()> {
        if !self.exists(address) {
            return Err(StorageError::NotFound(format!("Custodial key {address}")));
        }
        self.storage.delete(self.storage.paths().custodial(address))
    }
}
