// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Node registration endpoints and consensus-backed node status lookups.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    audit_log,
    auth::{Auth, AuthError, AuthenticatedUser, Role},
    error::ApiError,
    models::{MessageResponse, NodeAddressRequest, NodeListResponse, NodeResponse},
    network::NodeStatus,
    routing::admission::normalize_node_address,
    state::AppState,
    storage::{AuditEventType, NodeRepository},
};

/// Upper bound on addresses per `query-nodes` call.
pub const MAX_QUERY_ADDRESSES: usize = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NodeDetailResponse {
    pub node: NodeResponse,
    /// Status agreed by the network, absent without consensus.
    pub status: Option<NodeStatus>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueryNodesRequest {
    pub addresses: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NodeQueryResult {
    pub address: String,
    pub status: Option<NodeStatus>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueryNodesResponse {
    pub nodes: Vec<NodeQueryResult>,
}

/// Node routes act on the caller's own account.
fn account_id(user: &AuthenticatedUser) -> Result<&str, AuthError> {
    if user.role == Role::Account {
        Ok(&user.subject_id)
    } else {
        Err(AuthError::InsufficientPermissions)
    }
}

fn parse_address(address: &str) -> Result<String, ApiError> {
    normalize_node_address(address)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid node address: {address}")))
}

// ============================================================================
// Handlers
// ============================================================================

#[utoipa::path(
    get,
    path = "/v1/nodes",
    tag = "Nodes",
    responses((status = 200, description = "Registered nodes", body = NodeListResponse)),
    security(("bearer_auth" = []))
)]
pub async fn list_nodes(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> Result<Json<NodeListResponse>, ApiError> {
    let account_id = account_id(&user)?;
    let nodes: Vec<NodeResponse> = NodeRepository::new(&state.storage)
        .list_by_account(account_id)?
        .into_iter()
        .map(NodeResponse::from)
        .collect();
    let total = nodes.len();
    Ok(Json(NodeListResponse { nodes, total }))
}

/// Register a node address. When stake verification is on, the network must
/// report the node as staked and not jailed.
#[utoipa::path(
    post,
    path = "/v1/nodes",
    tag = "Nodes",
    request_body = NodeAddressRequest,
    responses(
        (status = 201, description = "Node registered", body = NodeResponse),
        (status = 400, description = "Invalid address"),
        (status = 403, description = "Partner accounts cannot register nodes"),
        (status = 409, description = "Node already registered"),
        (status = 422, description = "Node not staked"),
        (status = 429, description = "Address was deleted recently")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_node(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(request): Json<NodeAddressRequest>,
) -> Result<(StatusCode, Json<NodeResponse>), ApiError> {
    let account_id = account_id(&user)?;
    let node = state.routing.register_node(account_id, &request.address).await?;
    audit_log!(&state.storage, AuditEventType::NodeRegistered, &user, "node", &node.id);
    Ok((StatusCode::CREATED, Json(NodeResponse::from(node))))
}

#[utoipa::path(
    get,
    path = "/v1/nodes/{address}",
    tag = "Nodes",
    params(("address" = String, Path, description = "Node address")),
    responses(
        (status = 200, description = "Node with network status", body = NodeDetailResponse),
        (status = 404, description = "Node not registered")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_node(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(address): Path<String>,
) -> Result<Json<NodeDetailResponse>, ApiError> {
    let account_id = account_id(&user)?;
    let address = parse_address(&address)?;
    let node = NodeRepository::new(&state.storage)
        .find_by_address(account_id, &address)?
        .ok_or_else(|| ApiError::not_found(format!("Node {address} not found")))?;

    let status = state.network.node(&node.address).await;
    Ok(Json(NodeDetailResponse {
        node: NodeResponse::from(node),
        status,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/nodes/{address}/delete",
    tag = "Nodes",
    params(("address" = String, Path, description = "Node address")),
    responses(
        (status = 200, description = "Node deleted", body = MessageResponse),
        (status = 403, description = "Partner accounts cannot delete nodes"),
        (status = 404, description = "Node not registered")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_node(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(address): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let account_id = account_id(&user)?;
    let node = state.routing.delete_node(account_id, &address).await?;
    audit_log!(&state.storage, AuditEventType::NodeDeleted, &user, "node", &node.id);
    Ok(Json(MessageResponse::new("Node deleted")))
}

/// Look up network status for several addresses at once.
#[utoipa::path(
    post,
    path = "/v1/query-nodes",
    tag = "Nodes",
    request_body = QueryNodesRequest,
    responses(
        (status = 200, description = "Status per address", body = QueryNodesResponse),
        (status = 400, description = "Invalid address or too many addresses")
    ),
    security(("bearer_auth" = []))
)]
pub async fn query_nodes(
    State(state): State<AppState>,
    Auth(_user): Auth,
    Json(request): Json<QueryNodesRequest>,
) -> Result<Json<QueryNodesResponse>, ApiError> {
    if request.addresses.len() > MAX_QUERY_ADDRESSES {
        return Err(ApiError::bad_request(format!(
            "At most {MAX_QUERY_ADDRESSES} addresses per query"
        )));
    }
    let addresses = request
        .addresses
        .iter()
        .map(|a| parse_address(a))
        .collect::<Result<Vec<_>, _>>()?;

    let network = &state.network;
    let nodes = join_all(addresses.into_iter().map(|address| async move {
        let status = network.node(&address).await;
        NodeQueryResult { address, status }
    }))
    .await;

    Ok(Json(QueryNodesResponse { nodes }))
}
