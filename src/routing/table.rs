// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Routing table aggregation.
//!
//! Providers download, per chain, every host that may send them relays. The
//! table is rebuilt from a full scan of the account space on each call so it
//! is complete at the moment of generation. The scan walks accounts in id
//! order one page at a time and can be resumed from its cursor.

use std::collections::{BTreeMap, BTreeSet};

use super::{RoutingEngine, RoutingError, RoutingResult};
use crate::storage::{
    AccountRepository, ChainRepository, GatewayRepository, ProviderRepository,
    RpcEndpointRepository, StorageError, StorageResult, StoredAccount,
};

/// chain id → hosts bound to that chain.
pub type RoutingTable = BTreeMap<String, BTreeSet<String>>;

/// Which chains a routing table covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostScope {
    /// A single chain.
    Chain(String),
    /// Chains with an enabled RPC endpoint on this gateway.
    Gateway(String),
    /// Union of the gateway scopes of every gateway the provider runs.
    Provider(String),
}

/// Lazy, restartable walk over all accounts in id order.
pub struct AccountScan<'a> {
    repo: AccountRepository<'a>,
    cursor: Option<String>,
    page_size: usize,
    done: bool,
}

impl<'a> AccountScan<'a> {
    pub fn new(repo: AccountRepository<'a>, page_size: usize) -> Self {
        Self::resume(repo, page_size, None)
    }

    /// Continue a previous scan after `cursor`.
    pub fn resume(repo: AccountRepository<'a>, page_size: usize, cursor: Option<String>) -> Self {
        Self {
            repo,
            cursor,
            page_size: page_size.max(1),
            done: false,
        }
    }

    /// Id of the last account yielded so far.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }
}

impl Iterator for AccountScan<'_> {
    type Item = StorageResult<Vec<StoredAccount>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.repo.list_page(self.cursor.as_deref(), self.page_size) {
            Ok((page, next)) => {
                match next {
                    Some(c) => self.cursor = Some(c),
                    None => {
                        self.done = true;
                        if let Some(last) = page.last() {
                            self.cursor = Some(last.id.clone());
                        }
                    }
                }
                if page.is_empty() && self.done {
                    None
                } else {
                    Some(Ok(page))
                }
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn not_found_as(err: StorageError, mapped: RoutingError) -> RoutingError {
    match err {
        StorageError::NotFound(_) => mapped,
        other => other.into(),
    }
}

impl RoutingEngine {
    pub fn scan_accounts(&self) -> AccountScan<'_> {
        AccountScan::new(
            AccountRepository::new(&self.storage),
            self.settings.scan_page_size,
        )
    }

    /// Chain ids covered by `scope`.
    pub fn scope_chains(&self, scope: &HostScope) -> RoutingResult<BTreeSet<String>> {
        match scope {
            HostScope::Chain(chain_id) => {
                if !ChainRepository::new(&self.storage).exists(chain_id) {
                    return Err(RoutingError::ChainNotFound(chain_id.clone()));
                }
                Ok(BTreeSet::from([chain_id.clone()]))
            }
            HostScope::Gateway(gateway_id) => {
                GatewayRepository::new(&self.storage)
                    .get(gateway_id)
                    .map_err(|e| not_found_as(e, RoutingError::GatewayNotFound(gateway_id.clone())))?;
                self.gateway_chains(gateway_id)
            }
            HostScope::Provider(provider_id) => {
                ProviderRepository::new(&self.storage)
                    .get(provider_id)
                    .map_err(|e| not_found_as(e, RoutingError::ProviderNotFound(provider_id.clone())))?;

                let mut chains = BTreeSet::new();
                for gateway in GatewayRepository::new(&self.storage).list_by_provider(provider_id)? {
                    chains.extend(self.gateway_chains(&gateway.id)?);
                }
                Ok(chains)
            }
        }
    }

    fn gateway_chains(&self, gateway_id: &str) -> RoutingResult<BTreeSet<String>> {
        Ok(RpcEndpointRepository::new(&self.storage)
            .list_by_gateway(gateway_id)?
            .into_iter()
            .filter(|endpoint| !endpoint.disabled)
            .map(|endpoint| endpoint.chain_id)
            .collect())
    }

    /// Hosts of every non-disabled account, grouped by chain and limited to `scope`.
    ///
    /// Every chain in scope appears in the result, with an empty set when no
    /// account is bound to it.
    pub fn hosts_by_chain(&self, scope: &HostScope) -> RoutingResult<RoutingTable> {
        let chains = self.scope_chains(scope)?;
        let mut table: RoutingTable = chains
            .iter()
            .map(|chain_id| (chain_id.clone(), BTreeSet::new()))
            .collect();
        if table.is_empty() {
            return Ok(table);
        }

        let mut accounts = 0usize;
        for page in self.scan_accounts() {
            for account in page? {
                if account.disabled {
                    continue;
                }
                accounts += 1;
                for binding in account.chains {
                    if let Some(hosts) = table.get_mut(&binding.chain_id) {
                        hosts.insert(binding.host);
                    }
                }
            }
        }

        tracing::debug!(
            ?scope,
            chains = table.len(),
            accounts,
            "Built routing table"
        );
        Ok(table)
    }
}
