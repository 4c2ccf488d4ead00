// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Provider endpoints: gateway inventory, the routing tables gateways
//! download, and the log lines gateways ship back.
//!
//! Routing tables are rebuilt from a full account scan per request, which
//! reads the record store synchronously, so the scan runs on the blocking
//! pool.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    audit_log,
    auth::{Auth, AuthenticatedUser},
    error::ApiError,
    models::HostsResponse,
    routing::HostScope,
    state::AppState,
    storage::{
        AuditEventType, GatewayLogRepository, GatewayLogStream, GatewayRepository,
        ProviderRepository, ProviderResponse, RpcEndpointRepository, StorageError, StoredGateway,
        StoredRpcEndpoint,
    },
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GatewayListResponse {
    pub gateways: Vec<StoredGateway>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RpcEndpointListResponse {
    pub endpoints: Vec<StoredRpcEndpoint>,
    pub total: usize,
}

/// A batch of log lines from one gateway.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GatewayLogsRequest {
    pub logs: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GatewayLogsResponse {
    pub accepted: usize,
}

/// Load a gateway, hiding gateways that belong to another provider.
fn owned_gateway(
    state: &AppState,
    provider_id: &str,
    gateway_id: &str,
) -> Result<StoredGateway, ApiError> {
    let not_found = || ApiError::not_found(format!("Gateway {gateway_id} not found"));
    let gateway = match GatewayRepository::new(&state.storage).get(gateway_id) {
        Ok(gateway) => gateway,
        Err(StorageError::NotFound(_)) => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };
    if gateway.provider_id != provider_id {
        return Err(not_found());
    }
    Ok(gateway)
}

async fn hosts_for(state: &AppState, scope: HostScope) -> Result<HostsResponse, ApiError> {
    let routing = state.routing.clone();
    let table = tokio::task::spawn_blocking(move || routing.hosts_by_chain(&scope)).await??;
    Ok(table.into())
}

#[utoipa::path(
    get,
    path = "/v1/providers/{provider_id}",
    tag = "Providers",
    params(("provider_id" = String, Path, description = "Provider ID")),
    responses(
        (status = 200, description = "Provider", body = ProviderResponse),
        (status = 404, description = "Provider not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_provider(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(provider_id): Path<String>,
) -> Result<Json<ProviderResponse>, ApiError> {
    user.require_provider(&provider_id)?;
    let provider = ProviderRepository::new(&state.storage).get(&provider_id)?;
    Ok(Json(ProviderResponse::from(&provider)))
}

#[utoipa::path(
    get,
    path = "/v1/providers/{provider_id}/gateways",
    tag = "Providers",
    params(("provider_id" = String, Path, description = "Provider ID")),
    responses((status = 200, description = "Gateways", body = GatewayListResponse)),
    security(("bearer_auth" = []))
)]
pub async fn list_gateways(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(provider_id): Path<String>,
) -> Result<Json<GatewayListResponse>, ApiError> {
    user.require_provider(&provider_id)?;
    let gateways = GatewayRepository::new(&state.storage).list_by_provider(&provider_id)?;
    let total = gateways.len();
    Ok(Json(GatewayListResponse { gateways, total }))
}

#[utoipa::path(
    get,
    path = "/v1/providers/{provider_id}/gateways/{gateway_id}",
    tag = "Providers",
    params(
        ("provider_id" = String, Path, description = "Provider ID"),
        ("gateway_id" = String, Path, description = "Gateway ID")
    ),
    responses(
        (status = 200, description = "Gateway", body = StoredGateway),
        (status = 404, description = "Gateway not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_gateway(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path((provider_id, gateway_id)): Path<(String, String)>,
) -> Result<Json<StoredGateway>, ApiError> {
    user.require_provider(&provider_id)?;
    Ok(Json(owned_gateway(&state, &provider_id, &gateway_id)?))
}

#[utoipa::path(
    get,
    path = "/v1/providers/{provider_id}/gateways/{gateway_id}/rpc-endpoints",
    tag = "Providers",
    params(
        ("provider_id" = String, Path, description = "Provider ID"),
        ("gateway_id" = String, Path, description = "Gateway ID")
    ),
    responses((status = 200, description = "RPC endpoints", body = RpcEndpointListResponse)),
    security(("bearer_auth" = []))
)]
pub async fn list_rpc_endpoints(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path((provider_id, gateway_id)): Path<(String, String)>,
) -> Result<Json<RpcEndpointListResponse>, ApiError> {
    user.require_provider(&provider_id)?;
    let gateway = owned_gateway(&state, &provider_id, &gateway_id)?;
    let endpoints = RpcEndpointRepository::new(&state.storage).list_by_gateway(&gateway.id)?;
    let total = endpoints.len();
    Ok(Json(RpcEndpointListResponse { endpoints, total }))
}

/// Hosts for every chain the gateway serves.
#[utoipa::path(
    get,
    path = "/v1/providers/{provider_id}/gateways/{gateway_id}/hosts",
    tag = "Providers",
    params(
        ("provider_id" = String, Path, description = "Provider ID"),
        ("gateway_id" = String, Path, description = "Gateway ID")
    ),
    responses(
        (status = 200, description = "Routing table", body = HostsResponse),
        (status = 404, description = "Gateway not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn gateway_hosts(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path((provider_id, gateway_id)): Path<(String, String)>,
) -> Result<Json<HostsResponse>, ApiError> {
    user.require_provider(&provider_id)?;
    let gateway = owned_gateway(&state, &provider_id, &gateway_id)?;
    Ok(Json(hosts_for(&state, HostScope::Gateway(gateway.id)).await?))
}

/// Hosts for every chain served by any of the provider's gateways.
#[utoipa::path(
    get,
    path = "/v1/providers/{provider_id}/hosts",
    tag = "Providers",
    params(("provider_id" = String, Path, description = "Provider ID")),
    responses(
        (status = 200, description = "Routing table", body = HostsResponse),
        (status = 404, description = "Provider not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn provider_hosts(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(provider_id): Path<String>,
) -> Result<Json<HostsResponse>, ApiError> {
    user.require_provider(&provider_id)?;
    Ok(Json(hosts_for(&state, HostScope::Provider(provider_id)).await?))
}

/// Validate and store one batch. Every line must be non-blank; lines are
/// stored trimmed.
fn ingest(
    state: &AppState,
    user: &AuthenticatedUser,
    provider_id: &str,
    gateway_id: &str,
    stream: GatewayLogStream,
    request: GatewayLogsRequest,
) -> Result<GatewayLogsResponse, ApiError> {
    user.require_provider(provider_id)?;
    let gateway = owned_gateway(state, provider_id, gateway_id)?;

    let mut lines = Vec::with_capacity(request.logs.len());
    for line in &request.logs {
        let line = line.trim();
        if line.is_empty() {
            return Err(ApiError::bad_request("each log must be a non-empty string"));
        }
        lines.push(line.to_string());
    }

    let accepted = GatewayLogRepository::new(&state.storage).append(stream, provider_id, &gateway.id, &lines)?;
    if stream == GatewayLogStream::Error && accepted > 0 {
        tracing::warn!(provider_id, gateway_id = %gateway.id, accepted, "Gateway reported errors");
    } else {
        tracing::debug!(provider_id, gateway_id = %gateway.id, %stream, accepted, "Stored gateway logs");
    }
    audit_log!(&state.storage, AuditEventType::GatewayLogsReceived, user, "gateway", &gateway.id);
    Ok(GatewayLogsResponse { accepted })
}

#[utoipa::path(
    post,
    path = "/v1/providers/{provider_id}/gateways/{gateway_id}/error-log",
    tag = "Providers",
    params(
        ("provider_id" = String, Path, description = "Provider ID"),
        ("gateway_id" = String, Path, description = "Gateway ID")
    ),
    request_body = GatewayLogsRequest,
    responses(
        (status = 200, description = "Lines stored", body = GatewayLogsResponse),
        (status = 400, description = "Blank log line"),
        (status = 404, description = "Gateway not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn gateway_error_log(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path((provider_id, gateway_id)): Path<(String, String)>,
    Json(request): Json<GatewayLogsRequest>,
) -> Result<Json<GatewayLogsResponse>, ApiError> {
    ingest(&state, &user, &provider_id, &gateway_id, GatewayLogStream::Error, request).map(Json)
}

#[utoipa::path(
    post,
    path = "/v1/providers/{provider_id}/gateways/{gateway_id}/info-log",
    tag = "Providers",
    params(
        ("provider_id" = String, Path, description = "Provider ID"),
        ("gateway_id" = String, Path, description = "Gateway ID")
    ),
    request_body = GatewayLogsRequest,
    responses(
        (status = 200, description = "Lines stored", body = GatewayLogsResponse),
        (status = 400, description = "Blank log line"),
        (status = 404, description = "Gateway not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn gateway_info_log(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path((provider_id, gateway_id)): Path<(String, String)>,
    Json(request): Json<GatewayLogsRequest>,
) -> Result<Json<GatewayLogsResponse>, ApiError> {
    ingest(&state, &user, &provider_id, &gateway_id, GatewayLogStream::Info, request).map(Json)
}

#[utoipa::path(
    post,
    path = "/v1/providers/{provider_id}/gateways/{gateway_id}/server-notice-log",
    tag = "Providers",
    params(
        ("provider_id" = String, Path, description = "Provider ID"),
        ("gateway_id" = String, Path, description = "Gateway ID")
    ),
    request_body = GatewayLogsRequest,
    responses(
        (status = 200, description = "Lines stored", body = GatewayLogsResponse),
        (status = 400, description = "Blank log line"),
        (status = 404, description = "Gateway not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn gateway_server_notice_log(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path((provider_id, gateway_id)): Path<(String, String)>,
    Json(request): Json<GatewayLogsRequest>,
) -> Result<Json<GatewayLogsResponse>, ApiError> {
    ingest(&state, &user, &provider_id, &gateway_id, GatewayLogStream::ServerNotice, request).map(Json)
}
