// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded index database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `host_reservations`: host → serialized [`HostReservation`]
//! - `claims`: `kind|value` → owning id (unique emails, domains)
//! - `tombstones`: composite key (class|sha256|deleted_at_be|uuid) → deleted_at millis
//!
//! redb admits one write transaction at a time, so every "check, then
//! insert if absent" below runs inside a single write transaction and is a
//! conditional put rather than a racy read followed by a write.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

// =============================================================================
// Table Definitions
// =============================================================================

/// Uniqueness index: derived host → owning (account, chain).
const HOST_RESERVATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("host_reservations");

/// Unique claims: `kind|value` → owner id.
const CLAIMS: TableDefinition<&str, &str> = TableDefinition::new("claims");

/// Deletion tombstones. Key format: `class|hash|deleted_at_be|uuid`.
const TOMBSTONES: TableDefinition<&[u8], i64> = TableDefinition::new("tombstones");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum IndexDbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IndexDbResult<T> = Result<T, IndexDbError>;

// =============================================================================
// Records
// =============================================================================

/// The single source of truth for host uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostReservation {
    pub host: String,
    pub account_id: String,
    pub chain_id: String,
    pub reserved_at: DateTime<Utc>,
}

/// Outcome of a conditional reservation write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// No reservation existed; one was written.
    Created,
    /// The same account already holds this host for this chain.
    AlreadyOwned,
    /// Another (account, chain) pair holds the host.
    Conflict { account_id: String, chain_id: String },
}

/// Namespaces for unique claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    Email,
    Domain,
}

impl ClaimKind {
    fn prefix(self) -> &'static str {
        match self {
            ClaimKind::Email => "email",
            ClaimKind::Domain => "domain",
        }
    }

    fn key(self, value: &str) -> String {
        format!("{}|{value}", self.prefix())
    }
}

/// Outcome of a conditional claim write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    AlreadyOwned,
    Taken { owner: String },
}

// =============================================================================
// Tombstone Key Helpers
// =============================================================================

/// Prefix shared by every tombstone of one `(class, hash)` pair.
fn tombstone_prefix(class: &str, hash: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(class.len() + hash.len() + 2);
    prefix.extend_from_slice(class.as_bytes());
    prefix.push(b'|');
    prefix.extend_from_slice(hash.as_bytes());
    prefix.push(b'|');
    prefix
}

fn class_prefix(class: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(class.len() + 1);
    prefix.extend_from_slice(class.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Upper bound for a prefix range scan.
fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    end.extend_from_slice(&[0xFF; 40]);
    end
}

fn tombstone_key(class: &str, hash: &str, deleted_at_ms: i64) -> Vec<u8> {
    let mut key = tombstone_prefix(class, hash);
    key.extend_from_slice(&(deleted_at_ms.max(0) as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(uuid::Uuid::new_v4().simple().to_string().as_bytes());
    key
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

// =============================================================================
// IndexDb
// =============================================================================

/// Embedded ACID index database.
pub struct IndexDb {
    db: Database,
}

impl IndexDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> IndexDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(HOST_RESERVATIONS)?;
            let _ = write_txn.open_table(CLAIMS)?;
            let _ = write_txn.open_table(TOMBSTONES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Read-only check used by the readiness endpoint.
    pub fn health_check(&self) -> IndexDbResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(HOST_RESERVATIONS)?;
        Ok(())
    }

    // =========================================================================
    // Host Reservations
    // =========================================================================

    /// Reserve `host` for `(account_id, chain_id)` unless someone holds it.
    pub fn reserve_host(
        &self,
        host: &str,
        account_id: &str,
        chain_id: &str,
    ) -> IndexDbResult<ReserveOutcome> {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(HOST_RESERVATIONS)?;
            let existing: Option<HostReservation> = match table.get(host)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };

            match existing {
                Some(r) if r.account_id == account_id && r.chain_id == chain_id => {
                    ReserveOutcome::AlreadyOwned
                }
                Some(r) => ReserveOutcome::Conflict {
                    account_id: r.account_id,
                    chain_id: r.chain_id,
                },
                None => {
                    let reservation = HostReservation {
                        host: host.to_string(),
                        account_id: account_id.to_string(),
                        chain_id: chain_id.to_string(),
                        reserved_at: Utc::now(),
                    };
                    let json = serde_json::to_vec(&reservation)?;
                    table.insert(host, json.as_slice())?;
                    ReserveOutcome::Created
                }
            }
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    /// Remove the reservation for `host` if `account_id` holds it.
    ///
    /// Returns whether a reservation was removed.
    pub fn release_host(&self, host: &str, account_id: &str) -> IndexDbResult<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(HOST_RESERVATIONS)?;
            let owner = match table.get(host)? {
                Some(value) => Some(serde_json::from_slice::<HostReservation>(value.value())?),
                None => None,
            };
            match owner {
                Some(r) if r.account_id == account_id => {
                    table.remove(host)?;
                    true
                }
                _ => false,
            }
        };
        write_txn.commit()?;
        Ok(removed)
    }

    pub fn get_reservation(&self, host: &str) -> IndexDbResult<Option<HostReservation>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(HOST_RESERVATIONS)?;
        match table.get(host)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Paginated listing of reservations ordered by host.
    ///
    /// Returns `(reservations, next_cursor)`; the cursor is the last host seen.
    pub fn list_reservations(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> IndexDbResult<(Vec<HostReservation>, Option<String>)> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(HOST_RESERVATIONS)?;

        let range = match cursor {
            Some(after) => table.range(after..)?,
            None => table.iter()?,
        };

        let mut results = Vec::with_capacity(limit);
        for entry in range {
            let (key, value) = entry?;
            if cursor == Some(key.value()) {
                continue;
            }
            results.push(serde_json::from_slice::<HostReservation>(value.value())?);
            if results.len() >= limit {
                break;
            }
        }

        let next_cursor = if results.len() >= limit {
            results.last().map(|r| r.host.clone())
        } else {
            None
        };
        Ok((results, next_cursor))
    }

    // =========================================================================
    // Unique Claims
    // =========================================================================

    /// Claim `value` in `kind`'s namespace for `owner` unless already taken.
    pub fn claim(&self, kind: ClaimKind, value: &str, owner: &str) -> IndexDbResult<ClaimOutcome> {
        let key = kind.key(value);
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(CLAIMS)?;
            let existing = table.get(key.as_str())?.map(|v| v.value().to_string());
            match existing {
                Some(current) if current == owner => ClaimOutcome::AlreadyOwned,
                Some(current) => ClaimOutcome::Taken { owner: current },
                None => {
                    table.insert(key.as_str(), owner)?;
                    ClaimOutcome::Claimed
                }
            }
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    /// Release a claim held by `owner`. Returns whether it was removed.
    pub fn release_claim(&self, kind: ClaimKind, value: &str, owner: &str) -> IndexDbResult<bool> {
        let key = kind.key(value);
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(CLAIMS)?;
            let held = table.get(key.as_str())?.map(|v| v.value() == owner);
            if held == Some(true) {
                table.remove(key.as_str())?;
                true
            } else {
                false
            }
        };
        write_txn.commit()?;
        Ok(removed)
    }

    pub fn claim_owner(&self, kind: ClaimKind, value: &str) -> IndexDbResult<Option<String>> {
        let key = kind.key(value);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CLAIMS)?;
        Ok(table.get(key.as_str())?.map(|v| v.value().to_string()))
    }

    // =========================================================================
    // Tombstones
    // =========================================================================

    /// Append a tombstone. Tombstones are never updated.
    pub fn insert_tombstone(
        &self,
        class: &str,
        hash: &str,
        deleted_at: DateTime<Utc>,
    ) -> IndexDbResult<()> {
        let deleted_at_ms = deleted_at.timestamp_millis();
        let key = tombstone_key(class, hash, deleted_at_ms);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TOMBSTONES)?;
            table.insert(key.as_slice(), deleted_at_ms)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Deletion times of every tombstone matching `(class, hash)`, oldest first.
    pub fn tombstones_for(&self, class: &str, hash: &str) -> IndexDbResult<Vec<DateTime<Utc>>> {
        let prefix = tombstone_prefix(class, hash);
        let end = prefix_end(&prefix);

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TOMBSTONES)?;

        let mut deleted = Vec::new();
        for entry in table.range(prefix.as_slice()..end.as_slice())? {
            let (_, value) = entry?;
            deleted.push(millis_to_datetime(value.value()));
        }
        Ok(deleted)
    }

    /// Remove tombstones of `class` deleted strictly before `cutoff`.
    ///
    /// Returns the number of tombstones removed.
    pub fn prune_tombstones(&self, class: &str, cutoff: DateTime<Utc>) -> IndexDbResult<usize> {
        let prefix = class_prefix(class);
        let end = prefix_end(&prefix);
        let cutoff_ms = cutoff.timestamp_millis();

        let write_txn = self.db.begin_write()?;
        let pruned = {
            let mut table = write_txn.open_table(TOMBSTONES)?;

            let mut expired: Vec<Vec<u8>> = Vec::new();
            for entry in table.range(prefix.as_slice()..end.as_slice())? {
                let (key, value) = entry?;
                if value.value() < cutoff_ms {
                    expired.push(key.value().to_vec());
                }
            }

            for key in &expired {
                table.remove(key.as_slice())?;
            }
            expired.len()
        };
        write_txn.commit()?;
        Ok(pruned)
    }
}

// =============================================================================
// Tests
// =============================================================================
