// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Anti-abuse cooldown registry.
//!
//! Deleting an account, node, or domain leaves a tombstone holding only the
//! SHA-256 of the identifier. Registering the same identifier again is
//! blocked until the class cooldown has elapsed since the latest deletion.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::storage::{IndexDb, IndexDbError};

/// Identifier classes. Each is checked against its own tombstones only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierClass {
    /// Account email.
    Account,
    /// Node address.
    Node,
    /// Domain binding.
    Domain,
}

impl IdentifierClass {
    pub const ALL: [IdentifierClass; 3] = [Self::Account, Self::Node, Self::Domain];

    pub fn as_str(self) -> &'static str {
        match self {
            IdentifierClass::Account => "account",
            IdentifierClass::Node => "node",
            IdentifierClass::Domain => "domain",
        }
    }
}

impl std::fmt::Display for IdentifierClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CooldownStatus {
    pub blocked: bool,
    /// Latest moment a matching tombstone stops blocking, when blocked.
    pub available_at: Option<DateTime<Utc>>,
}

impl CooldownStatus {
    pub const CLEAR: CooldownStatus = CooldownStatus {
        blocked: false,
        available_at: None,
    };
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tombstone index error: {0}")]
    Index(#[from] IndexDbError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// SHA-256 of the UTF-8 identifier, lowercase hex.
pub fn hash_identifier(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

#[derive(Clone)]
pub struct HashRegistry {
    index: Arc<IndexDb>,
}

impl HashRegistry {
    pub fn new(index: Arc<IndexDb>) -> Self {
        Self { index }
    }

    pub fn check_cooldown(
        &self,
        class: IdentifierClass,
        plaintext: &str,
        cooldown_hours: u32,
    ) -> RegistryResult<CooldownStatus> {
        self.check_cooldown_at(class, plaintext, cooldown_hours, Utc::now())
    }

    /// Cooldown check against an explicit clock.
    pub fn check_cooldown_at(
        &self,
        class: IdentifierClass,
        plaintext: &str,
        cooldown_hours: u32,
        now: DateTime<Utc>,
    ) -> RegistryResult<CooldownStatus> {
        let hash = hash_identifier(plaintext);
        let window = Duration::hours(i64::from(cooldown_hours));

        let available_at = self
            .index
            .tombstones_for(class.as_str(), &hash)?
            .into_iter()
            .map(|deleted_at| deleted_at + window)
            .filter(|threshold| *threshold > now)
            .max();

        Ok(match available_at {
            Some(at) => CooldownStatus {
                blocked: true,
                available_at: Some(at),
            },
            None => CooldownStatus::CLEAR,
        })
    }

    pub fn record_deletion(&self, class: IdentifierClass, plaintext: &str) -> RegistryResult<()> {
        self.record_deletion_at(class, plaintext, Utc::now())
    }

    pub fn record_deletion_at(
        &self,
        class: IdentifierClass,
        plaintext: &str,
        deleted_at: DateTime<Utc>,
    ) -> RegistryResult<()> {
        let hash = hash_identifier(plaintext);
        self.index.insert_tombstone(class.as_str(), &hash, deleted_at)?;
        tracing::debug!(class = %class, "Recorded deletion tombstone");
        Ok(())
    }

    /// Drop tombstones whose cooldown window has fully elapsed.
    ///
    /// Safe because the gate is a pure window check: an expired tombstone
    /// can never block anything again.
    pub fn prune_expired(
        &self,
        class: IdentifierClass,
        cooldown_hours: u32,
        now: DateTime<Utc>,
    ) -> RegistryResult<usize> {
        let cutoff = now - Duration::hours(i64::from(cooldown_hours));
        Ok(self.index.prune_tombstones(class.as_str(), cutoff)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (HashRegistry, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let index = IndexDb::open(&dir.path().join("index.redb")).unwrap();
        (HashRegistry::new(Arc::new(index)), dir)
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_identifier("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn deleted_23h_ago_is_blocked_until_24h() {
        let (registry, _dir) = registry();
        let now = Utc::now();
        let deleted_at = now - Duration::hours(23);
        registry
            .record_deletion_at(IdentifierClass::Account, "user@example.com", deleted_at)
            .unwrap();

        let status = registry
            .check_cooldown_at(IdentifierClass::Account, "user@example.com", 24, now)
            .unwrap();
        assert!(status.blocked);
        assert_eq!(
            status.available_at.unwrap().timestamp_millis(),
            (deleted_at + Duration::hours(24)).timestamp_millis()
        );
    }

    #[test]
    fn deleted_25h_ago_is_clear() {
        let (registry, _dir) = registry();
        let now = Utc::now();
        registry
            .record_deletion_at(IdentifierClass::Node, "ab".repeat(20).as_str(), now - Duration::hours(25))
            .unwrap();

        let status = registry
            .check_cooldown_at(IdentifierClass::Node, &"ab".repeat(20), 24, now)
            .unwrap();
        assert_eq!(status, CooldownStatus::CLEAR);
    }

    #[test]
    fn latest_threshold_wins() {
        let (registry, _dir) = registry();
        let now = Utc::now();
        let older = now - Duration::hours(20);
        let newer = now - Duration::hours(2);
        registry.record_deletion_at(IdentifierClass::Domain, "x.io", newer).unwrap();
        registry.record_deletion_at(IdentifierClass::Domain, "x.io", older).unwrap();

        let status = registry
            .check_cooldown_at(IdentifierClass::Domain, "x.io", 24, now)
            .unwrap();
        assert_eq!(
            status.available_at.unwrap().timestamp_millis(),
            (newer + Duration::hours(24)).timestamp_millis()
        );
    }

    #[test]
    fn classes_are_independent() {
        let (registry, _dir) = registry();
        registry.record_deletion(IdentifierClass::Domain, "shared").unwrap();

        assert!(registry
            .check_cooldown(IdentifierClass::Domain, "shared", 24)
            .unwrap()
            .blocked);
        assert!(!registry
            .check_cooldown(IdentifierClass::Account, "shared", 24)
            .unwrap()
            .blocked);
        assert!(!registry
            .check_cooldown(IdentifierClass::Domain, "other", 24)
            .unwrap()
            .blocked);
    }

    #[test]
    fn zero_cooldown_never_blocks() {
        let (registry, _dir) = registry();
        registry.record_deletion(IdentifierClass::Account, "a@b.io").unwrap();
        assert!(!registry
            .check_cooldown(IdentifierClass::Account, "a@b.io", 0)
            .unwrap()
            .blocked);
    }

    #[test]
    fn prune_keeps_tombstones_inside_window() {
        let (registry, _dir) = registry();
        let now = Utc::now();
        registry
            .record_deletion_at(IdentifierClass::Account, "old", now - Duration::hours(48))
            .unwrap();
        registry
            .record_deletion_at(IdentifierClass::Account, "fresh", now - Duration::hours(1))
            .unwrap();

        assert_eq!(registry.prune_expired(IdentifierClass::Account, 24, now).unwrap(), 1);
        assert!(registry
            .check_cooldown_at(IdentifierClass::Account, "fresh", 24, now)
            .unwrap()
            .blocked);
    }
}
