// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the record store.
//!
//! Each repository provides CRUD operations for a specific entity type,
//! using [`FileStorage`](super::FileStorage) for all file operations.

pub mod accounts;
pub mod chains;
pub mod custodial;
pub mod gateways;
pub mod invitations;
pub mod nodes;
pub mod providers;

pub use accounts::{AccountRepository, AccountResponse, ChainHostBinding, StoredAccount};
pub use chains::{ChainRepository, StoredChain};
pub use custodial::{CustodialRepository, StoredCustodialKey};
pub use gateways::{GatewayRepository, RpcEndpointRepository, StoredGateway, StoredRpcEndpoint};
pub use invitations::{InvitationRepository, StoredInvitation};
pub use nodes::{NodeRepository, StoredNode};
pub use providers::{ProviderRepository, ProviderResponse, StoredProvider};
