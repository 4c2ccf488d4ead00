// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registration guard.
//!
//! Every identifier that can be registered (email, node address, domain) is
//! checked against its own cooldown class before it is accepted, and leaves
//! a tombstone when it is removed. Node registration is additionally gated on
//! the node being actively staked on the external network.

use chrono::Utc;
use tracing::{info, warn};
use unicode_normalization::UnicodeNormalization;

use super::{RoutingEngine, RoutingError, RoutingResult};
use crate::registry::IdentifierClass;
use crate::storage::{
    AccountRepository, ClaimKind, ClaimOutcome, NodeRepository, StorageError, StoredAccount,
    StoredNode,
};

/// Length of a node address in hex characters.
pub const NODE_ADDRESS_LEN: usize = 40;

/// NFKC, trimmed, lowercase.
pub fn normalize_email(email: &str) -> String {
    email.trim().nfkc().collect::<String>().to_lowercase()
}

/// Lowercase a node address, or `None` unless it is exactly 40 hex characters.
pub fn normalize_node_address(address: &str) -> Option<String> {
    let address = address.trim();
    (address.len() == NODE_ADDRESS_LEN && address.chars().all(|c| c.is_ascii_hexdigit()))
        .then(|| address.to_ascii_lowercase())
}

/// Dot-separated labels of `[a-z0-9]` runs joined by single hyphens,
/// ending in an alphabetic TLD of at least two letters:
/// `^([a-z0-9]+(-[a-z0-9]+)*\.)+[a-z]{2,}$`.
pub fn is_valid_domain(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    let Some((tld, rest)) = labels.split_last() else {
        return false;
    };
    if rest.is_empty() || tld.len() < 2 || !tld.bytes().all(|b| b.is_ascii_lowercase()) {
        return false;
    }
    rest.iter().all(|label| {
        !label.is_empty()
            && label
                .split('-')
                .all(|run| !run.is_empty() && run.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()))
    })
}

impl RoutingEngine {
    fn gate(&self, class: IdentifierClass, plaintext: &str) -> RoutingResult<()> {
        let hours = self.settings.cooldowns.hours_for(class);
        let status = self.registry.check_cooldown(class, plaintext, hours)?;
        match status.available_at {
            Some(available_at) if status.blocked => {
                info!(class = %class, %available_at, "Registration blocked by cooldown");
                Err(RoutingError::Cooldown {
                    class,
                    available_at,
                })
            }
            _ => Ok(()),
        }
    }

    /// Cooldown check for a (normalised) email before registration.
    pub fn admit_email(&self, email: &str) -> RoutingResult<()> {
        self.gate(IdentifierClass::Account, email)
    }

    /// Admit and claim an email for `account_id`.
    pub fn claim_email(&self, email: &str, account_id: &str) -> RoutingResult<()> {
        self.admit_email(email)?;
        match self.index.claim(ClaimKind::Email, email, account_id)? {
            ClaimOutcome::Claimed | ClaimOutcome::AlreadyOwned => Ok(()),
            ClaimOutcome::Taken { .. } => Err(RoutingError::EmailTaken),
        }
    }

    /// Undo [`claim_email`](Self::claim_email) after a failed registration.
    pub fn release_email(&self, email: &str, account_id: &str) -> RoutingResult<()> {
        self.index.release_claim(ClaimKind::Email, email, account_id)?;
        Ok(())
    }

    /// Account id holding this (normalised) email.
    pub fn account_for_email(&self, email: &str) -> RoutingResult<Option<String>> {
        Ok(self.index.claim_owner(ClaimKind::Email, email)?)
    }

    /// Move an account to a new (normalised) email.
    ///
    /// The new address passes the same cooldown gate and uniqueness claim as
    /// at registration. Only after the account record points at it is the
    /// old address released and tombstoned, as if its account were deleted.
    pub async fn update_email(&self, account_id: &str, email: &str) -> RoutingResult<StoredAccount> {
        let _guard = self.lock_writes().await;
        let mut account = self.load_account(account_id)?;
        if account.email == email {
            return Ok(account);
        }

        self.claim_email(email, account_id)?;
        let old = std::mem::replace(&mut account.email, email.to_string());
        if let Err(e) = AccountRepository::new(&self.storage).update(&account) {
            self.index.release_claim(ClaimKind::Email, email, account_id)?;
            return Err(e.into());
        }

        self.index.release_claim(ClaimKind::Email, &old, account_id)?;
        self.registry.record_deletion(IdentifierClass::Account, &old)?;

        info!(account_id, "Updated account email");
        Ok(account)
    }

    /// Store a new password hash on the account record.
    pub async fn set_password_hash(&self, account_id: &str, password_hash: String) -> RoutingResult<()> {
        let _guard = self.lock_writes().await;
        let mut account = self.load_account(account_id)?;
        account.password_hash = password_hash;
        AccountRepository::new(&self.storage).update(&account)?;
        Ok(())
    }

    /// Register a node address for an account.
    pub async fn register_node(&self, account_id: &str, address: &str) -> RoutingResult<StoredNode> {
        let account = self.load_account(account_id)?;
        if account.is_partner {
            return Err(RoutingError::PartnerForbidden);
        }
        let address = normalize_node_address(address)
            .ok_or_else(|| RoutingError::InvalidAddress(address.to_string()))?;

        self.gate(IdentifierClass::Node, &address)?;

        if self.settings.verify_node_stake {
            let staked = self
                .network
                .node(&address)
                .await
                .is_some_and(|node| node.is_active_stake());
            if !staked {
                warn!(account_id, address = %address, "Node failed stake verification");
                return Err(RoutingError::NodeNotStaked(address));
            }
        }

        let _guard = self.lock_writes().await;
        let nodes = NodeRepository::new(&self.storage);
        if nodes.find_by_address(account_id, &address)?.is_some() {
            return Err(RoutingError::NodeExists(address));
        }

        let node = StoredNode {
            id: uuid::Uuid::new_v4().to_string(),
            address,
            account_id: account.id,
            created_at: Utc::now(),
        };
        nodes.create(&node)?;

        info!(account_id = %node.account_id, node_id = %node.id, address = %node.address, "Registered node");
        Ok(node)
    }

    /// Delete one of the account's nodes and start its address cooldown.
    pub async fn delete_node(&self, account_id: &str, address: &str) -> RoutingResult<StoredNode> {
        let account = self.load_account(account_id)?;
        if account.is_partner {
            return Err(RoutingError::PartnerForbidden);
        }
        let address = normalize_node_address(address)
            .ok_or_else(|| RoutingError::InvalidAddress(address.to_string()))?;

        let _guard = self.lock_writes().await;
        let nodes = NodeRepository::new(&self.storage);
        let node = nodes
            .find_by_address(account_id, &address)?
            .ok_or_else(|| RoutingError::NodeNotFound(address.clone()))?;

        nodes.delete(&node.id)?;
        self.registry.record_deletion(IdentifierClass::Node, &node.address)?;

        info!(account_id, node_id = %node.id, "Deleted node");
        Ok(node)
    }

    /// Bind a custom domain to the account. Returns the stored (normalised) domain.
    pub async fn add_domain(&self, account_id: &str, domain: &str) -> RoutingResult<String> {
        let domain = domain.trim().to_lowercase();
        if !is_valid_domain(&domain) {
            return Err(RoutingError::InvalidDomain(domain));
        }

        let _guard = self.lock_writes().await;
        let mut account = self.load_account(account_id)?;
        if account.domains.contains(&domain) {
            return Ok(domain);
        }

        self.gate(IdentifierClass::Domain, &domain)?;
        if let ClaimOutcome::Taken { .. } = self.index.claim(ClaimKind::Domain, &domain, account_id)? {
            return Err(RoutingError::DomainTaken(domain));
        }

        account.domains.push(domain.clone());
        if let Err(e) = AccountRepository::new(&self.storage).update(&account) {
            self.index.release_claim(ClaimKind::Domain, &domain, account_id)?;
            return Err(e.into());
        }

        info!(account_id, domain = %domain, "Added domain");
        Ok(domain)
    }

    /// Unbind a domain and start its cooldown.
    pub async fn remove_domain(&self, account_id: &str, domain: &str) -> RoutingResult<()> {
        let domain = domain.trim().to_lowercase();

        let _guard = self.lock_writes().await;
        let mut account = self.load_account(account_id)?;
        let Some(position) = account.domains.iter().position(|d| *d == domain) else {
            return Err(RoutingError::DomainNotFound(domain));
        };

        account.domains.remove(position);
        AccountRepository::new(&self.storage).update(&account)?;
        self.index.release_claim(ClaimKind::Domain, &domain, account_id)?;
        self.registry.record_deletion(IdentifierClass::Domain, &domain)?;

        info!(account_id, domain = %domain, "Removed domain");
        Ok(())
    }

    /// Remove an account and everything it registered.
    ///
    /// Host reservations are released, nodes deleted, and tombstones written
    /// for every node address, every domain and the email. The custodial key
    /// record is left in place.
    pub async fn delete_account(&self, account_id: &str) -> RoutingResult<StoredAccount> {
        let _guard = self.lock_writes().await;
        let account = self.load_account(account_id)?;

        let released = self.release_hosts(&account)?;

        let nodes = NodeRepository::new(&self.storage);
        let owned = nodes.list_by_account(&account.id)?;
        for node in &owned {
            match nodes.delete(&node.id) {
                Ok(()) | Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
            self.registry.record_deletion(IdentifierClass::Node, &node.address)?;
        }

        for domain in &account.domains {
            self.index.release_claim(ClaimKind::Domain, domain, &account.id)?;
            self.registry.record_deletion(IdentifierClass::Domain, domain)?;
        }

        self.index.release_claim(ClaimKind::Email, &account.email, &account.id)?;
        self.registry.record_deletion(IdentifierClass::Account, &account.email)?;

        AccountRepository::new(&self.storage).delete(&account.id)?;

        info!(
            account_id = %account.id,
            released,
            nodes = owned.len(),
            domains = account.domains.len(),
            "Deleted account"
        );
        Ok(account)
    }
}
