// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain catalogue endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::{AdminOnly, Auth},
    error::ApiError,
    models::HostsResponse,
    routing::HostScope,
    state::AppState,
    storage::{ChainRepository, StoredChain},
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChainListResponse {
    pub chains: Vec<StoredChain>,
    pub total: usize,
}

#[utoipa::path(
    get,
    path = "/v1/chains",
    tag = "Chains",
    responses((status = 200, description = "All chains", body = ChainListResponse)),
    security(("bearer_auth" = []))
)]
pub async fn list_chains(
    State(state): State<AppState>,
    Auth(_user): Auth,
) -> Result<Json<ChainListResponse>, ApiError> {
    let mut chains = ChainRepository::new(&state.storage).list_all()?;
    chains.sort_by(|a, b| a.id.cmp(&b.id));
    let total = chains.len();
    Ok(Json(ChainListResponse { chains, total }))
}

#[utoipa::path(
    get,
    path = "/v1/chains/{id}",
    tag = "Chains",
    params(("id" = String, Path, description = "Chain ID")),
    responses(
        (status = 200, description = "Chain", body = StoredChain),
        (status = 404, description = "Chain not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_chain(
    State(state): State<AppState>,
    Auth(_user): Auth,
    Path(id): Path<String>,
) -> Result<Json<StoredChain>, ApiError> {
    Ok(Json(ChainRepository::new(&state.storage).get(&id)?))
}

/// Every host bound to one chain.
#[utoipa::path(
    get,
    path = "/v1/chains/{id}/hosts",
    tag = "Chains",
    params(("id" = String, Path, description = "Chain ID")),
    responses(
        (status = 200, description = "Routing table", body = HostsResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Chain not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn chain_hosts(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(id): Path<String>,
) -> Result<Json<HostsResponse>, ApiError> {
    let routing = state.routing.clone();
    let table =
        tokio::task::spawn_blocking(move || routing.hosts_by_chain(&HostScope::Chain(id))).await??;
    Ok(Json(table.into()))
}
