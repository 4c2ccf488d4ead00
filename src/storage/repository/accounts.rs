// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account repository.
//!
//! Each account is one JSON file under `accounts/`, holding the routing
//! bindings and domains it owns. Email uniqueness lives in the index
//! database, not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::paths::is_valid_record_id;
use super::super::{FileStorage, StorageError, StorageResult};

/// A routable hostname assigned to one account for one chain.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
pub struct ChainHostBinding {
    pub chain_id: String,
    pub host: String,
}

/// Account stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredAccount {
    pub id: String,
    /// Normalised email address.
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Address of the custodial key generated at registration.
    pub custodial_address: String,
    /// Per-account random value mixed into every derived host. Never rotated.
    pub chain_secret: String,
    #[serde(default)]
    pub is_partner: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub agree_tos: bool,
    #[serde(default)]
    pub agree_privacy: bool,
    #[serde(default)]
    pub agree_cookies: bool,
    #[serde(default)]
    pub chains: Vec<ChainHostBinding>,
    #[serde(default)]
    pub domains: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredAccount {
    /// The binding for `chain_id`, if any.
    pub fn binding(&self, chain_id: &str) -> Option<&ChainHostBinding> {
        self.chains.iter().find(|b| b.chain_id == chain_id)
    }
}

/// Account view returned by the API (no secrets).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AccountResponse {
    pub id: String,
    pub email: String,
    pub custodial_address: String,
    pub is_partner: bool,
    pub chains: Vec<ChainHostBinding>,
    pub domains: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&StoredAccount> for AccountResponse {
    fn from(account: &StoredAccount) -> Self {
        Self {
            id: account.id.clone(),
            email: account.email.clone(),
            custodial_address: account.custodial_address.clone(),
            is_partner: account.is_partner,
            chains: account.chains.clone(),
            domains: account.domains.clone(),
            created_at: account.created_at,
        }
    }
}

/// Repository for account records.
pub struct AccountRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> AccountRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self, account_id: &str) -> bool {
        is_valid_record_id(account_id) && self.storage.exists(self.storage.paths().account(account_id))
    }

    pub fn get(&self, account_id: &str) -> StorageResult<StoredAccount> {
        if !self.exists(account_id) {
            return Err(StorageError::NotFound(format!("Account {account_id}")));
        }
        self.storage.read_json(self.storage.paths().account(account_id))
    }

    pub fn create(&self, account: &StoredAccount) -> StorageResult<()> {
        if self.exists(&account.id) {
            return Err(StorageError::AlreadyExists(format!("Account {}", account.id)));
        }
        self.storage
            .write_json(self.storage.paths().account(&account.id), account)
    }

    pub fn update(&self, account: &StoredAccount) -> StorageResult<()> {
        if !self.exists(&account.id) {
            return Err(StorageError::NotFound(format!("Account {}", account.id)));
        }
        self.storage
            .write_json(self.storage.paths().account(&account.id), account)
    }

    pub fn delete(&self, account_id: &str) -> StorageResult<()> {
        if !self.exists(account_id) {
            return Err(StorageError::NotFound(format!("Account {account_id}")));
        }
        self.storage.delete(self.storage.paths().account(account_id))
    }

    /// One page of accounts ordered by id, starting after `cursor`.
    ///
    /// Returns `(accounts, next_cursor)`. Records that vanish or fail to
    /// parse between listing and reading are skipped.
    pub fn list_page(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> StorageResult<(Vec<StoredAccount>, Option<String>)> {
        let ids = self
            .storage
            .list_files(self.storage.paths().accounts_dir(), "json")?;

        let start = match cursor {
            Some(after) => ids.partition_point(|id| id.as_str() <= after),
            None => 0,
        };

        let mut accounts = Vec::with_capacity(limit);
        let mut last_id = None;
        for id in ids.iter().skip(start) {
            last_id = Some(id.clone());
            match self.get(id) {
                Ok(account) => accounts.push(account),
                Err(e) => tracing::warn!(account_id = %id, error = %e, "Skipping unreadable account"),
            }
            if accounts.len() >= limit {
                break;
            }
        }

        let exhausted = last_id.as_ref().is_none_or(|last| ids.last() == Some(last));
        let next_cursor = if exhausted { None } else { last_id };
        Ok((accounts, next_cursor))
    }
}
