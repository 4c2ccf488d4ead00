// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain binding and reservation reconciliation.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};
use utoipa::ToSchema;

use super::host::derive_host;
use super::{RoutingError, RoutingResult, RoutingSettings};
use crate::network::NetworkQuery;
use crate::registry::HashRegistry;
use crate::storage::{
    AccountRepository, ChainHostBinding, ChainRepository, FileStorage, IndexDb, ReserveOutcome,
    StorageError, StoredAccount, StoredChain,
};

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReconcileReport {
    /// Reservations with no matching account binding, released.
    pub orphans_released: usize,
    /// Account bindings whose reservation was missing, re-reserved.
    pub reservations_restored: usize,
    /// Account bindings whose host is held by someone else.
    pub conflicts: usize,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        self.orphans_released > 0 || self.reservations_restored > 0
    }
}

pub struct RoutingEngine {
    pub(super) storage: Arc<FileStorage>,
    pub(super) index: Arc<IndexDb>,
    pub(super) registry: HashRegistry,
    pub(super) network: Arc<dyn NetworkQuery>,
    pub(super) settings: RoutingSettings,
    /// Serialises read-modify-write cycles on account records.
    writes: Mutex<()>,
}

impl RoutingEngine {
    pub fn new(
        storage: Arc<FileStorage>,
        index: Arc<IndexDb>,
        registry: HashRegistry,
        network: Arc<dyn NetworkQuery>,
        settings: RoutingSettings,
    ) -> Self {
        Self {
            storage,
            index,
            registry,
            network,
            settings,
            writes: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &RoutingSettings {
        &self.settings
    }

    pub fn registry(&self) -> &HashRegistry {
        &self.registry
    }

    pub(super) async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().await
    }

    pub(super) fn load_account(&self, account_id: &str) -> RoutingResult<StoredAccount> {
        AccountRepository::new(&self.storage)
            .get(account_id)
            .map_err(|e| match e {
                StorageError::NotFound(_) => RoutingError::AccountNotFound(account_id.to_string()),
                other => other.into(),
            })
    }

    /// Host this account would receive for `chain_id`.
    pub fn host_for(&self, account: &StoredAccount, chain_id: &str) -> String {
        derive_host(
            &account.id,
            &account.chain_secret,
            chain_id,
            &self.settings.base_domain,
        )
    }

    /// Load a chain and check the account may bind it.
    /// Chain ids are stored lowercase, so lookups fold case first.
    fn bindable_chain(&self, account: &StoredAccount, chain_id: &str) -> RoutingResult<StoredChain> {
        let chain_id = chain_id.to_ascii_lowercase();
        let chain = ChainRepository::new(&self.storage)
            .get(&chain_id)
            .map_err(|e| match e {
                StorageError::NotFound(_) => RoutingError::ChainNotFound(chain_id.clone()),
                other => other.into(),
            })?;

        if !chain.enabled {
            return Err(RoutingError::ChainDisabled(chain.id));
        }
        if chain.is_partner_chain && !account.is_partner {
            return Err(RoutingError::PartnerOnly(chain.id));
        }
        Ok(chain)
    }

    /// Conditional reservation; only a foreign holder is an error.
    fn reserve(&self, account_id: &str, chain_id: &str, host: &str) -> RoutingResult<()> {
        match self.index.reserve_host(host, account_id, chain_id)? {
            ReserveOutcome::Created | ReserveOutcome::AlreadyOwned => Ok(()),
            ReserveOutcome::Conflict {
                account_id: holder, ..
            } => {
                warn!(host, account_id, holder = %holder, "Derived host already reserved");
                Err(RoutingError::Conflict {
                    host: host.to_string(),
                })
            }
        }
    }

    /// Release every reservation held through the account's bindings.
    pub(super) fn release_hosts(&self, account: &StoredAccount) -> RoutingResult<usize> {
        let mut released = 0;
        for binding in &account.chains {
            if self.index.release_host(&binding.host, &account.id)? {
                released += 1;
            }
        }
        Ok(released)
    }

    /// Bind one chain to the account, returning the (possibly existing) binding.
    pub async fn bind_chain(&self, account_id: &str, chain_id: &str) -> RoutingResult<ChainHostBinding> {
        let _guard = self.lock_writes().await;
        let mut account = self.load_account(account_id)?;
        let chain = self.bindable_chain(&account, chain_id)?;

        if let Some(existing) = account.binding(&chain.id) {
            return Ok(existing.clone());
        }

        let host = self.host_for(&account, &chain.id);
        self.reserve(&account.id, &chain.id, &host)?;

        let binding = ChainHostBinding {
            chain_id: chain.id.clone(),
            host,
        };
        account.chains.push(binding.clone());
        AccountRepository::new(&self.storage).update(&account)?;

        info!(account_id = %account.id, chain_id = %chain.id, host = %binding.host, "Bound chain");
        Ok(binding)
    }

    /// Remove the binding for `chain_id`. Returns whether one existed.
    pub async fn unbind_chain(&self, account_id: &str, chain_id: &str) -> RoutingResult<bool> {
        let _guard = self.lock_writes().await;
        let mut account = self.load_account(account_id)?;

        let Some(position) = account.chains.iter().position(|b| b.chain_id.eq_ignore_ascii_case(chain_id)) else {
            return Ok(false);
        };
        let removed = account.chains.remove(position);
        AccountRepository::new(&self.storage).update(&account)?;
        self.index.release_host(&removed.host, &account.id)?;

        info!(account_id = %account.id, chain_id, host = %removed.host, "Unbound chain");
        Ok(true)
    }

    /// Replace the account's whole binding list.
    ///
    /// Duplicate ids are collapsed. Every host is reserved before the single
    /// account write; hosts dropped from the list are released afterwards.
    pub async fn set_chains(
        &self,
        account_id: &str,
        chain_ids: &[String],
    ) -> RoutingResult<Vec<ChainHostBinding>> {
        let _guard = self.lock_writes().await;
        let mut account = self.load_account(account_id)?;

        let mut seen = HashSet::new();
        let mut bindings = Vec::new();
        for chain_id in chain_ids {
            if !seen.insert(chain_id.to_ascii_lowercase()) {
                continue;
            }
            let chain = self.bindable_chain(&account, chain_id)?;
            let binding = match account.binding(&chain.id) {
                Some(existing) => existing.clone(),
                None => ChainHostBinding {
                    host: self.host_for(&account, &chain.id),
                    chain_id: chain.id,
                },
            };
            bindings.push(binding);
        }

        for binding in &bindings {
            self.reserve(&account.id, &binding.chain_id, &binding.host)?;
        }

        let dropped: Vec<ChainHostBinding> = account
            .chains
            .iter()
            .filter(|old| !bindings.iter().any(|b| b.host == old.host))
            .cloned()
            .collect();

        account.chains = bindings.clone();
        AccountRepository::new(&self.storage).update(&account)?;

        for binding in &dropped {
            self.index.release_host(&binding.host, &account.id)?;
        }

        info!(
            account_id = %account.id,
            bound = bindings.len(),
            released = dropped.len(),
            "Replaced chain bindings"
        );
        Ok(bindings)
    }

    /// Release every reservation the account holds without touching its record.
    pub async fn release_account(&self, account_id: &str) -> RoutingResult<usize> {
        let _guard = self.lock_writes().await;
        let account = self.load_account(account_id)?;
        let released = self.release_hosts(&account)?;
        info!(account_id, released, "Released account reservations");
        Ok(released)
    }

    /// Bring the reservation index and account bindings back into agreement.
    ///
    /// Reservations whose account is gone or no longer lists the host are
    /// released. Bindings without a reservation are re-reserved.
    pub async fn reconcile_reservations(&self) -> RoutingResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let page_size = self.settings.scan_page_size.max(1);
        let accounts = AccountRepository::new(&self.storage);

        let mut cursor: Option<String> = None;
        loop {
            let _guard = self.lock_writes().await;
            let (page, next) = self.index.list_reservations(cursor.as_deref(), page_size)?;

            for reservation in &page {
                let still_bound = match accounts.get(&reservation.account_id) {
                    Ok(account) => account
                        .chains
                        .iter()
                        .any(|b| b.host == reservation.host && b.chain_id == reservation.chain_id),
                    Err(StorageError::NotFound(_)) => false,
                    Err(e) => return Err(e.into()),
                };
                if !still_bound
                    && self
                        .index
                        .release_host(&reservation.host, &reservation.account_id)?
                {
                    info!(
                        host = %reservation.host,
                        account_id = %reservation.account_id,
                        "Released orphaned reservation"
                    );
                    report.orphans_released += 1;
                }
            }

            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }

        let mut cursor: Option<String> = None;
        loop {
            let _guard = self.lock_writes().await;
            let (page, next) = accounts.list_page(cursor.as_deref(), page_size)?;

            for account in &page {
                for binding in &account.chains {
                    match self
                        .index
                        .reserve_host(&binding.host, &account.id, &binding.chain_id)?
                    {
                        ReserveOutcome::Created => report.reservations_restored += 1,
                        ReserveOutcome::AlreadyOwned => {}
                        ReserveOutcome::Conflict { account_id, .. } => {
                            warn!(
                                host = %binding.host,
                                account_id = %account.id,
                                holder = %account_id,
                                "Binding host held by another account"
                            );
                            report.conflicts += 1;
                        }
                    }
                }
            }

            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }

        Ok(report)
    }
}
