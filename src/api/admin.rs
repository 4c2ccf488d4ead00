// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints for catalogue management.
//!
//! These endpoints require an admin session and provide:
//! - Chain definitions
//! - Provider onboarding (issues the provider key)
//! - Gateway and RPC endpoint registration
//! - An on-demand reconciler pass

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    audit_log,
    auth::{hash_password, AdminOnly},
    error::ApiError,
    reconciler::{PassReport, Reconciler},
    state::AppState,
    storage::{
        AuditEventType, ChainRepository, GatewayRepository, ProviderRepository, ProviderResponse,
        RpcEndpointRepository, StorageError, StoredChain, StoredGateway, StoredProvider,
        StoredRpcEndpoint,
    },
    vault::random_hex,
};

/// Bytes of randomness in an issued provider key.
const PROVIDER_KEY_BYTES: usize = 32;

/// Longest accepted chain id. Chain ids are embedded in hostnames.
const MAX_CHAIN_ID_LEN: usize = 32;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateProviderRequest {
    pub name: String,
    pub email: String,
}

/// The provider key is only ever returned here.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateProviderResponse {
    pub provider: ProviderResponse,
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateGatewayRequest {
    pub region: String,
    pub address: String,
    #[serde(default)]
    pub private_address: String,
    pub relay_port: u16,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateRpcEndpointRequest {
    pub chain_id: String,
    pub protocol: String,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub disabled: bool,
}

fn is_valid_chain_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_CHAIN_ID_LEN && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn require_existing<T>(result: Result<T, StorageError>, what: &str) -> Result<T, ApiError> {
    match result {
        Ok(value) => Ok(value),
        Err(StorageError::NotFound(_)) => Err(ApiError::not_found(format!("{what} not found"))),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create or replace a chain definition.
#[utoipa::path(
    post,
    path = "/v1/admin/chains",
    tag = "Admin",
    request_body = StoredChain,
    responses(
        (status = 201, description = "Chain saved", body = StoredChain),
        (status = 400, description = "Invalid chain id"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_chain(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Json(mut chain): Json<StoredChain>,
) -> Result<(StatusCode, Json<StoredChain>), ApiError> {
    chain.id = chain.id.to_ascii_lowercase();
    if !is_valid_chain_id(&chain.id) {
        return Err(ApiError::bad_request(format!("Invalid chain id: {}", chain.id)));
    }
    ChainRepository::new(&state.storage).save(&chain)?;
    audit_log!(&state.storage, AuditEventType::AdminAccess, &admin, "chain", &chain.id);
    tracing::info!(chain_id = %chain.id, enabled = chain.enabled, "Saved chain");
    Ok((StatusCode::CREATED, Json(chain)))
}

/// Onboard a provider and issue its key.
#[utoipa::path(
    post,
    path = "/v1/admin/providers",
    tag = "Admin",
    request_body = CreateProviderRequest,
    responses(
        (status = 201, description = "Provider created", body = CreateProviderResponse),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_provider(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Json(request): Json<CreateProviderRequest>,
) -> Result<(StatusCode, Json<CreateProviderResponse>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("Provider name is required"));
    }

    let key = random_hex::<PROVIDER_KEY_BYTES>();
    let plain = key.clone();
    let key_hash = tokio::task::spawn_blocking(move || hash_password(&plain)).await??;

    let provider = StoredProvider {
        id: uuid::Uuid::new_v4().to_string(),
        name: request.name.trim().to_string(),
        email: request.email.trim().to_lowercase(),
        key_hash,
        created_at: Utc::now(),
    };
    ProviderRepository::new(&state.storage).create(&provider)?;
    audit_log!(&state.storage, AuditEventType::AdminAccess, &admin, "provider", &provider.id);

    Ok((
        StatusCode::CREATED,
        Json(CreateProviderResponse {
            provider: ProviderResponse::from(&provider),
            key,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/admin/providers/{provider_id}/gateways",
    tag = "Admin",
    params(("provider_id" = String, Path, description = "Provider ID")),
    request_body = CreateGatewayRequest,
    responses(
        (status = 201, description = "Gateway created", body = StoredGateway),
        (status = 404, description = "Provider not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_gateway(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Path(provider_id): Path<String>,
    Json(request): Json<CreateGatewayRequest>,
) -> Result<(StatusCode, Json<StoredGateway>), ApiError> {
    let provider = require_existing(
        ProviderRepository::new(&state.storage).get(&provider_id),
        "Provider",
    )?;

    let gateway = StoredGateway {
        id: uuid::Uuid::new_v4().to_string(),
        provider_id: provider.id,
        region: request.region,
        address: request.address,
        private_address: request.private_address,
        relay_port: request.relay_port,
        created_at: Utc::now(),
    };
    GatewayRepository::new(&state.storage).create(&gateway)?;
    audit_log!(&state.storage, AuditEventType::AdminAccess, &admin, "gateway", &gateway.id);
    Ok((StatusCode::CREATED, Json(gateway)))
}

#[utoipa::path(
    post,
    path = "/v1/admin/gateways/{gateway_id}/rpc-endpoints",
    tag = "Admin",
    params(("gateway_id" = String, Path, description = "Gateway ID")),
    request_body = CreateRpcEndpointRequest,
    responses(
        (status = 201, description = "Endpoint created", body = StoredRpcEndpoint),
        (status = 400, description = "Invalid protocol"),
        (status = 404, description = "Gateway or chain not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_rpc_endpoint(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Path(gateway_id): Path<String>,
    Json(request): Json<CreateRpcEndpointRequest>,
) -> Result<(StatusCode, Json<StoredRpcEndpoint>), ApiError> {
    let protocol = request.protocol.to_lowercase();
    if protocol != "http" && protocol != "https" {
        return Err(ApiError::bad_request("Protocol must be http or https"));
    }
    let gateway = require_existing(
        GatewayRepository::new(&state.storage).get(&gateway_id),
        "Gateway",
    )?;
    let chain = require_existing(
        ChainRepository::new(&state.storage).get(&request.chain_id),
        "Chain",
    )?;

    let endpoint = StoredRpcEndpoint {
        id: uuid::Uuid::new_v4().to_string(),
        gateway_id: gateway.id,
        chain_id: chain.id,
        protocol,
        address: request.address,
        port: request.port,
        disabled: request.disabled,
    };
    RpcEndpointRepository::new(&state.storage).create(&endpoint)?;
    audit_log!(&state.storage, AuditEventType::AdminAccess, &admin, "rpc_endpoint", &endpoint.id);
    Ok((StatusCode::CREATED, Json(endpoint)))
}

/// Run one reconciler pass now.
#[utoipa::path(
    post,
    path = "/v1/admin/reconcile",
    tag = "Admin",
    responses(
        (status = 200, description = "Pass report", body = PassReport),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = []))
)]
pub async fn reconcile(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
) -> Result<Json<PassReport>, ApiError> {
    let report = Reconciler::new(state.routing.clone(), state.storage.clone())
        .pass()
        .await?;
    audit_log!(&state.storage, AuditEventType::AdminAccess, &admin, "reconciler", "pass");
    Ok(Json(report))
}
