// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Provider repository. Providers operate gateway fleets and authenticate
//! with an operator-issued key whose Argon2 hash is stored here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::paths::is_valid_record_id;
use super::super::{FileStorage, StorageError, StorageResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredProvider {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string of the provider key.
    pub key_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Provider view returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ProviderResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<&StoredProvider> for ProviderResponse {
    fn from(p: &StoredProvider) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            email: p.email.clone(),
            created_at: p.created_at,
        }
    }
}

pub struct ProviderRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> ProviderRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self, provider_id: &str) -> bool {
        is_valid_record_id(provider_id)
            && self.storage.exists(self.storage.paths().provider(provider_id))
    }

    pub fn get(&self, provider_id: &str) -> StorageResult<StoredProvider> {
        if !self.exists(provider_id) {
            return Err(StorageError::NotFound(format!("Provider {provider_id}")));
        }
        self.storage.read_json(self.storage.paths().provider(provider_id))
    }

    pub fn create(&self, provider: &StoredProvider) -> StorageResult<()> {
        if self.exists(&provider.id) {
            return Err(StorageError::AlreadyExists(format!("Provider {}", provider.id)));
        }
        self.storage
            .write_json(self.storage.paths().provider(&provider.id), provider)
    }
}
