// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared application state.

use std::sync::Arc;

use crate::auth::SessionIssuer;
use crate::config::Config;
use crate::consensus::ConsensusClient;
use crate::invite::{InviteError, InviteService};
use crate::network::{NetworkError, NetworkQuery, PoktClient};
use crate::registry::HashRegistry;
use crate::routing::RoutingEngine;
use crate::storage::{FileStorage, IndexDb, IndexDbError, StorageError, StoragePaths};
use crate::vault::KeyVault;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("index database: {0}")]
    Index(#[from] IndexDbError),

    #[error("network client: {0}")]
    Network(#[from] NetworkError),

    #[error("invite client: {0}")]
    Invite(#[from] InviteError),
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<FileStorage>,
    pub index: Arc<IndexDb>,
    pub routing: Arc<RoutingEngine>,
    pub network: Arc<dyn NetworkQuery>,
    pub vault: Arc<KeyVault>,
    pub sessions: Arc<SessionIssuer>,
    pub invites: Arc<InviteService>,
}

impl AppState {
    /// Open storage under `DATA_DIR` and wire every service.
    pub fn build(config: Config) -> Result<Self, StartupError> {
        let consensus = ConsensusClient::new(config.consensus_redundancy, config.consensus_timeout);
        let network: Arc<dyn NetworkQuery> = Arc::new(PoktClient::new(
            &config.pokt_endpoint,
            consensus,
            config.consensus_timeout,
        )?);
        let vault = KeyVault::new(config.account_passphrase.clone());
        Self::assemble(config, network, vault)
    }

    /// Wire services around an existing network and vault.
    pub fn assemble(
        config: Config,
        network: Arc<dyn NetworkQuery>,
        vault: KeyVault,
    ) -> Result<Self, StartupError> {
        let paths = StoragePaths::new(&config.data_dir);
        let mut storage = FileStorage::new(paths);
        storage.initialize()?;
        let storage = Arc::new(storage);

        let index = Arc::new(IndexDb::open(&storage.paths().index_db())?);
        let routing = Arc::new(RoutingEngine::new(
            Arc::clone(&storage),
            Arc::clone(&index),
            HashRegistry::new(Arc::clone(&index)),
            Arc::clone(&network),
            config.routing_settings(),
        ));
        let sessions = SessionIssuer::new(config.session_secret.as_bytes(), config.session_ttl);
        let invites = InviteService::new(config.invites.clone(), config.consensus_timeout)?;

        Ok(Self {
            config: Arc::new(config),
            storage,
            index,
            routing,
            network,
            vault: Arc::new(vault),
            sessions: Arc::new(sessions),
            invites: Arc::new(invites),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::network::testing::FakeNetwork;
    use crate::vault::KdfParams;

    pub(crate) const ADMIN_KEY: &str = "operator-admin-key";
    pub(crate) const PASSPHRASE: &str = "operator-passphrase";

    pub(crate) struct TestState {
        pub state: AppState,
        pub network: Arc<FakeNetwork>,
        _dir: tempfile::TempDir,
    }

    pub(crate) fn test_state() -> TestState {
        test_state_with(&[])
    }

    /// Test state with extra environment overrides.
    pub(crate) fn test_state_with(overrides: &[(&str, &str)]) -> TestState {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_string_lossy().into_owned();
        let config = Config::from_lookup(|name| {
            if let Some((_, value)) = overrides.iter().find(|(key, _)| *key == name) {
                return Some(value.to_string());
            }
            match name {
                "DATA_DIR" => Some(data_dir.clone()),
                "CHAINS_DOMAIN" => Some("example.net".into()),
                "POKT_ENDPOINT" => Some("http://127.0.0.1:9".into()),
                "POKT_ACCOUNT_PASS" => Some(PASSPHRASE.into()),
                "SESSION_SECRET" => Some("test-session-secret-test-session-secret".into()),
                "ADMIN_KEY" => Some(ADMIN_KEY.into()),
                _ => None,
            }
        })
        .unwrap();

        let network = Arc::new(FakeNetwork::default());
        let vault = KeyVault::with_params(PASSPHRASE, KdfParams { log_n: 10, r: 8, p: 1 });
        let state = AppState::assemble(config, network.clone(), vault).unwrap();
        TestState {
            state,
            network,
            _dir: dir,
        }
    }

    #[test]
    fn assemble_initializes_storage() {
        let t = test_state();
        assert!(t.state.storage.health_check().is_ok());
        assert!(t.state.index.health_check().is_ok());
        assert_eq!(t.state.routing.settings().base_domain, "example.net");
    }
}
