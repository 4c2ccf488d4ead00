// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Invitation repository. One JSON file per issued invitation under
//! `invitations/`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::paths::is_valid_record_id;
use super::super::{FileStorage, StorageError, StorageResult};

/// A registration invitation for one (normalised) email.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredInvitation {
    pub id: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl StoredInvitation {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

pub struct InvitationRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> InvitationRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self, invitation_id: &str) -> bool {
        is_valid_record_id(invitation_id)
            && self
                .storage
                .exists(self.storage.paths().invitation(invitation_id))
    }

    pub fn get(&self, invitation_id: &str) -> StorageResult<StoredInvitation> {
        if !self.exists(invitation_id) {
            return Err(StorageError::NotFound(format!("Invitation {invitation_id}")));
        }
        self.storage
            .read_json(self.storage.paths().invitation(invitation_id))
    }

    pub fn create(&self, invitation: &StoredInvitation) -> StorageResult<()> {
        if self.exists(&invitation.id) {
            return Err(StorageError::AlreadyExists(format!(
                "Invitation {}",
                invitation.id
            )));
        }
        self.storage
            .write_json(self.storage.paths().invitation(&invitation.id), invitation)
    }

    pub fn delete(&self, invitation_id: &str) -> StorageResult<()> {
        if !self.exists(invitation_id) {
            return Err(StorageError::NotFound(format!("Invitation {invitation_id}")));
        }
        self.storage
            .delete(self.storage.paths().invitation(invitation_id))
    }

    /// An unexpired invitation already issued to `email`, if any.
    pub fn find_live(&self, email: &str, now: DateTime<Utc>) -> StorageResult<Option<StoredInvitation>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().invitations_dir(), "json")?;
        for id in ids {
            if let Ok(invitation) = self.get(&id) {
                if invitation.email == email && invitation.is_live(now) {
                    return Ok(Some(invitation));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::fs_store::tests::temp_storage;
    use chrono::Duration;
    use std::fs;

    pub(crate) fn invitation(id: &str, email: &str, expires_at: DateTime<Utc>) -> StoredInvitation {
        StoredInvitation {
            id: id.into(),
            email: email.into(),
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn find_live_skips_expired_and_foreign() {
        let storage = temp_storage();
        let repo = InvitationRepository::new(&storage);
        let now = Utc::now();

        repo.create(&invitation("old", "a@example.com", now - Duration::hours(1)))
            .unwrap();
        repo.create(&invitation("other", "b@example.com", now + Duration::hours(1)))
            .unwrap();
        assert!(repo.find_live("a@example.com", now).unwrap().is_none());

        repo.create(&invitation("new", "a@example.com", now + Duration::hours(1)))
            .unwrap();
        assert_eq!(
            repo.find_live("a@example.com", now).unwrap().map(|i| i.id),
            Some("new".to_string())
        );
        assert!(matches!(
            repo.create(&invitation("new", "c@example.com", now)),
            Err(StorageError::AlreadyExists(_))
        ));

        repo.delete("new").unwrap();
        assert!(repo.find_live("a@example.com", now).unwrap().is_none());
        fs::remove_dir_all(storage.paths().root()).ok();
    }
}
