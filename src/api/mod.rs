// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::Role,
    models::{
        ChainBindingsResponse, ChainIdRequest, DomainRequest, DomainsResponse, HostsResponse,
        KeyUnlockRequest, MessageResponse, NodeAddressRequest, NodeListResponse, NodeResponse,
        PasswordConfirmation, SessionResponse, UpdateChainsRequest,
    },
    network::NodeStatus,
    reconciler::PassReport,
    routing::ReconcileReport,
    state::AppState,
    storage::{
        AccountResponse, ChainHostBinding, ProviderResponse, StoredChain, StoredGateway,
        StoredRpcEndpoint,
    },
};

pub mod accounts;
pub mod admin;
pub mod chains;
pub mod health;
pub mod nodes;
pub mod providers;
pub mod session;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/version", get(health::version))
        // Sessions
        .route("/invite", post(session::invite))
        .route("/register", post(session::register))
        .route("/unlock", post(session::unlock))
        .route("/providers/{provider_id}/unlock", post(session::provider_unlock))
        .route("/admin/unlock", post(session::admin_unlock))
        // Accounts
        .route("/accounts/{id}", get(accounts::get_account))
        .route("/accounts/{id}/update-email", post(accounts::update_email))
        .route("/accounts/{id}/update-password", post(accounts::update_password))
        .route("/accounts/{id}/balance", get(accounts::get_balance))
        .route("/accounts/{id}/private-key", post(accounts::reveal_private_key))
        .route("/accounts/{id}/add-chain", post(accounts::add_chain))
        .route("/accounts/{id}/remove-chain", post(accounts::remove_chain))
        .route("/accounts/{id}/update-chains", post(accounts::update_chains))
        .route("/accounts/{id}/add-domain", post(accounts::add_domain))
        .route("/accounts/{id}/remove-domain", post(accounts::remove_domain))
        .route("/accounts/{id}/delete", post(accounts::delete_account))
        // Nodes
        .route("/query-nodes", post(nodes::query_nodes))
        .route("/nodes", get(nodes::list_nodes).post(nodes::create_node))
        .route("/nodes/{address}", get(nodes::get_node))
        .route("/nodes/{address}/delete", post(nodes::delete_node))
        // Chains
        .route("/chains", get(chains::list_chains))
        .route("/chains/{id}", get(chains::get_chain))
        .route("/chains/{id}/hosts", get(chains::chain_hosts))
        // Providers
        .route("/providers/{provider_id}", get(providers::get_provider))
        .route("/providers/{provider_id}/gateways", get(providers::list_gateways))
        .route(
            "/providers/{provider_id}/gateways/{gateway_id}",
            get(providers::get_gateway),
        )
        .route(
            "/providers/{provider_id}/gateways/{gateway_id}/rpc-endpoints",
            get(providers::list_rpc_endpoints),
        )
        .route(
            "/providers/{provider_id}/gateways/{gateway_id}/hosts",
            get(providers::gateway_hosts),
        )
        .route(
            "/providers/{provider_id}/gateways/{gateway_id}/error-log",
            post(providers::gateway_error_log),
        )
        .route(
            "/providers/{provider_id}/gateways/{gateway_id}/info-log",
            post(providers::gateway_info_log),
        )
        .route(
            "/providers/{provider_id}/gateways/{gateway_id}/server-notice-log",
            post(providers::gateway_server_notice_log),
        )
        .route("/providers/{provider_id}/hosts", get(providers::provider_hosts))
        // Admin
        .route("/admin/chains", post(admin::create_chain))
        .route("/admin/providers", post(admin::create_provider))
        .route(
            "/admin/providers/{provider_id}/gateways",
            post(admin::create_gateway),
        )
        .route(
            "/admin/gateways/{gateway_id}/rpc-endpoints",
            post(admin::create_rpc_endpoint),
        )
        .route("/admin/reconcile", post(admin::reconcile));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        health::version,
        session::invite,
        session::register,
        session::unlock,
        session::provider_unlock,
        session::admin_unlock,
        accounts::get_account,
        accounts::update_email,
        accounts::update_password,
        accounts::get_balance,
        accounts::reveal_private_key,
        accounts::add_chain,
        accounts::remove_chain,
        accounts::update_chains,
        accounts::add_domain,
        accounts::remove_domain,
        accounts::delete_account,
        nodes::query_nodes,
        nodes::list_nodes,
        nodes::create_node,
        nodes::get_node,
        nodes::delete_node,
        chains::list_chains,
        chains::get_chain,
        chains::chain_hosts,
        providers::get_provider,
        providers::list_gateways,
        providers::get_gateway,
        providers::list_rpc_endpoints,
        providers::gateway_hosts,
        providers::provider_hosts,
        providers::gateway_error_log,
        providers::gateway_info_log,
        providers::gateway_server_notice_log,
        admin::create_chain,
        admin::create_provider,
        admin::create_gateway,
        admin::create_rpc_endpoint,
        admin::reconcile
    ),
    components(
        schemas(
            Role,
            SessionResponse,
            KeyUnlockRequest,
            PasswordConfirmation,
            health::VersionResponse,
            session::InviteRequest,
            session::InviteResponse,
            session::RegisterRequest,
            session::UnlockRequest,
            AccountResponse,
            ChainHostBinding,
            ChainIdRequest,
            UpdateChainsRequest,
            ChainBindingsResponse,
            DomainRequest,
            DomainsResponse,
            HostsResponse,
            accounts::UpdateEmailRequest,
            accounts::UpdatePasswordRequest,
            accounts::BalanceResponse,
            accounts::PrivateKeyResponse,
            NodeResponse,
            NodeListResponse,
            NodeAddressRequest,
            NodeStatus,
            nodes::NodeDetailResponse,
            nodes::QueryNodesRequest,
            nodes::QueryNodesResponse,
            nodes::NodeQueryResult,
            StoredChain,
            chains::ChainListResponse,
            ProviderResponse,
            StoredGateway,
            StoredRpcEndpoint,
            providers::GatewayListResponse,
            providers::RpcEndpointListResponse,
            providers::GatewayLogsRequest,
            providers::GatewayLogsResponse,
            admin::CreateProviderRequest,
            admin::CreateProviderResponse,
            admin::CreateGatewayRequest,
            admin::CreateRpcEndpointRequest,
            PassReport,
            ReconcileReport,
            MessageResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness, readiness and version"),
        (name = "Session", description = "Invitations, registration and session issuance"),
        (name = "Accounts", description = "Account profile, credentials, keys, chain bindings and domains"),
        (name = "Nodes", description = "Node registration and network status"),
        (name = "Chains", description = "Chain catalogue"),
        (name = "Providers", description = "Gateway inventory, routing tables and gateway logs"),
        (name = "Admin", description = "Operator tooling")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::types::STATUS_STAKED;
    use crate::state::tests::{test_state, test_state_with, TestState, ADMIN_KEY};
    use crate::storage::{GatewayLogRepository, GatewayLogStream, InvitationRepository};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const PASSWORD: &str = "correct horse battery";

    async fn send(t: &TestState, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        router(t.state.clone())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn admin_token(t: &TestState) -> String {
        let response = send(t, "POST", "/v1/admin/unlock", None, Some(json!({"key": ADMIN_KEY}))).await;
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await["token"].as_str().unwrap().to_string()
    }

    async fn create_chain(t: &TestState, admin: &str, id: &str) {
        let response = send(
            t,
            "POST",
            "/v1/admin/chains",
            Some(admin),
            Some(json!({"id": id, "name": format!("Chain {id}"), "enabled": true})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    /// Register and unlock an account; returns (account id, token).
    async fn account_session(t: &TestState, email: &str) -> (String, String) {
        let response = send(
            t,
            "POST",
            "/v1/register",
            None,
            Some(json!({"email": email, "password": PASSWORD, "agree_tos": true})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(
            t,
            "POST",
            "/v1/unlock",
            None,
            Some(json!({"email": email, "password": PASSWORD})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        (
            body["account"]["id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    /// Onboard a provider with one gateway; returns (provider id, provider token, gateway id).
    async fn provider_with_gateway(t: &TestState, admin: &str) -> (String, String, String) {
        let response = send(
            t,
            "POST",
            "/v1/admin/providers",
            Some(admin),
            Some(json!({"name": "Relays Inc", "email": "ops@relays.example"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        let provider_id = created["provider"]["id"].as_str().unwrap().to_string();
        let provider_key = created["key"].as_str().unwrap().to_string();

        let response = send(
            t,
            "POST",
            &format!("/v1/admin/providers/{provider_id}/gateways"),
            Some(admin),
            Some(json!({"region": "eu-west", "address": "gw.relays.example", "relay_port": 443})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let gateway_id = json_body(response).await["id"].as_str().unwrap().to_string();

        let response = send(
            t,
            "POST",
            &format!("/v1/providers/{provider_id}/unlock"),
            None,
            Some(json!({"key": provider_key})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let provider_token = json_body(response).await["token"].as_str().unwrap().to_string();

        (provider_id, provider_token, gateway_id)
    }

    #[tokio::test]
    async fn health_and_docs_are_public() {
        let t = test_state();
        assert_eq!(send(&t, "GET", "/health/live", None, None).await.status(), StatusCode::OK);

        let response = send(&t, "GET", "/health/ready", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let response = send(&t, "GET", "/api-doc/openapi.json", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let doc = json_body(response).await;
        assert!(doc["paths"]["/v1/accounts/{id}/add-chain"].is_object());
        assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
    }

    #[tokio::test]
    async fn register_validates_input() {
        let t = test_state();
        let short = send(
            &t,
            "POST",
            "/v1/register",
            None,
            Some(json!({"email": "a@example.com", "password": "short"})),
        )
        .await;
        assert_eq!(short.status(), StatusCode::BAD_REQUEST);

        let bad_email = send(
            &t,
            "POST",
            "/v1/register",
            None,
            Some(json!({"email": "not-an-email", "password": PASSWORD})),
        )
        .await;
        assert_eq!(bad_email.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_after_normalization() {
        let t = test_state();
        account_session(&t, "user@example.com").await;

        let response = send(
            &t,
            "POST",
            "/v1/register",
            None,
            Some(json!({"email": "  USER@Example.com ", "password": PASSWORD})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unlock_rejects_wrong_password() {
        let t = test_state();
        account_session(&t, "user@example.com").await;

        let response = send(
            &t,
            "POST",
            "/v1/unlock",
            None,
            Some(json!({"email": "user@example.com", "password": "wrong password!"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error_code"], "invalid_credentials");
    }

    #[tokio::test]
    async fn account_routes_require_matching_session() {
        let t = test_state();
        let (alice, _) = account_session(&t, "alice@example.com").await;
        let (_, bob_token) = account_session(&t, "bob@example.com").await;

        let uri = format!("/v1/accounts/{alice}");
        assert_eq!(send(&t, "GET", &uri, None, None).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            send(&t, "GET", &uri, Some(&bob_token), None).await.status(),
            StatusCode::FORBIDDEN
        );

        let admin = admin_token(&t).await;
        assert_eq!(send(&t, "GET", &uri, Some(&admin), None).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_unlock_rejects_wrong_key() {
        let t = test_state();
        let response = send(&t, "POST", "/v1/admin/unlock", None, Some(json!({"key": "nope"}))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bound_chain_appears_in_gateway_routing_table() {
        let t = test_state();
        let admin = admin_token(&t).await;
        create_chain(&t, &admin, "0001").await;
        let (provider_id, provider_token, gateway_id) = provider_with_gateway(&t, &admin).await;

        let response = send(
            &t,
            "POST",
            &format!("/v1/admin/gateways/{gateway_id}/rpc-endpoints"),
            Some(&admin),
            Some(json!({"chain_id": "0001", "protocol": "https", "address": "rpc.relays.example", "port": 443})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let (account_id, token) = account_session(&t, "user@example.com").await;
        let response = send(
            &t,
            "POST",
            &format!("/v1/accounts/{account_id}/add-chain"),
            Some(&token),
            Some(json!({"id": "0001"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let host = json_body(response).await["host"].as_str().unwrap().to_string();
        assert!(host.ends_with(".0001.example.net"));

        let response = send(
            &t,
            "GET",
            &format!("/v1/providers/{provider_id}/gateways/{gateway_id}/hosts"),
            Some(&provider_token),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["chains"]["0001"], json!([host]));

        // Accounts may not read provider routing tables.
        let response = send(
            &t,
            "GET",
            &format!("/v1/providers/{provider_id}/hosts"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_chain_is_not_found() {
        let t = test_state();
        let (account_id, token) = account_session(&t, "user@example.com").await;
        let response = send(
            &t,
            "POST",
            &format!("/v1/accounts/{account_id}/add-chain"),
            Some(&token),
            Some(json!({"id": "7777"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn node_registration_requires_stake() {
        let t = test_state();
        let (_, token) = account_session(&t, "user@example.com").await;
        let address = "A".repeat(40);

        let response = send(&t, "POST", "/v1/nodes", Some(&token), Some(json!({"address": address}))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        t.network.set_node(&address.to_lowercase(), STATUS_STAKED, false);
        let response = send(&t, "POST", "/v1/nodes", Some(&token), Some(json!({"address": address}))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json_body(response).await["address"], "a".repeat(40));

        let response = send(&t, "GET", "/v1/nodes", Some(&token), None).await;
        assert_eq!(json_body(response).await["total"], 1);
    }

    #[tokio::test]
    async fn private_key_requires_password_and_decrypts() {
        let t = test_state();
        let (account_id, token) = account_session(&t, "user@example.com").await;
        let uri = format!("/v1/accounts/{account_id}/private-key");

        let response = send(&t, "POST", &uri, Some(&token), Some(json!({"password": "wrong password!"}))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&t, "POST", &uri, Some(&token), Some(json!({"password": PASSWORD}))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["private_key"].as_str().unwrap().len(), 128);
    }

    #[tokio::test]
    async fn deleted_email_is_in_cooldown() {
        let t = test_state();
        let (account_id, token) = account_session(&t, "user@example.com").await;

        let response = send(
            &t,
            "POST",
            &format!("/v1/accounts/{account_id}/delete"),
            Some(&token),
            Some(json!({"password": PASSWORD})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            &t,
            "POST",
            "/v1/register",
            None,
            Some(json!({"email": "user@example.com", "password": PASSWORD})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn balance_defaults_to_zero_without_consensus() {
        let t = test_state();
        let (account_id, token) = account_session(&t, "user@example.com").await;
        let response = send(&t, "GET", &format!("/v1/accounts/{account_id}/balance"), Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["balance"], "0");
    }

    #[tokio::test]
    async fn version_is_public() {
        let t = test_state();
        let response = send(&t, "GET", "/v1/version", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn chain_ids_are_case_insensitive() {
        let t = test_state();
        let admin = admin_token(&t).await;
        create_chain(&t, &admin, "00A1").await;

        let response = send(&t, "GET", "/v1/chains/00a1", Some(&admin), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let (account_id, token) = account_session(&t, "user@example.com").await;
        let response = send(
            &t,
            "POST",
            &format!("/v1/accounts/{account_id}/add-chain"),
            Some(&token),
            Some(json!({"id": "00A1"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let binding = json_body(response).await;
        assert_eq!(binding["chain_id"], "00a1");
        assert!(binding["host"].as_str().unwrap().ends_with(".00a1.example.net"));
    }

    #[tokio::test]
    async fn update_email_moves_login_and_tombstones_old() {
        let t = test_state();
        let (alice, token) = account_session(&t, "alice@example.com").await;
        account_session(&t, "bob@example.com").await;
        let uri = format!("/v1/accounts/{alice}/update-email");

        let response = send(
            &t,
            "POST",
            &uri,
            Some(&token),
            Some(json!({"email": "new@example.com", "password": "wrong password!"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            &t,
            "POST",
            &uri,
            Some(&token),
            Some(json!({"email": "nope", "password": PASSWORD})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &t,
            "POST",
            &uri,
            Some(&token),
            Some(json!({"email": "BOB@example.com", "password": PASSWORD})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = send(
            &t,
            "POST",
            &uri,
            Some(&token),
            Some(json!({"email": " New@Example.com", "password": PASSWORD})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["email"], "new@example.com");

        let response = send(
            &t,
            "POST",
            "/v1/unlock",
            None,
            Some(json!({"email": "new@example.com", "password": PASSWORD})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = send(
            &t,
            "POST",
            "/v1/unlock",
            None,
            Some(json!({"email": "alice@example.com", "password": PASSWORD})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            &t,
            "POST",
            "/v1/register",
            None,
            Some(json!({"email": "alice@example.com", "password": PASSWORD})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn update_password_requires_current_password() {
        let t = test_state();
        let (account_id, token) = account_session(&t, "user@example.com").await;
        let uri = format!("/v1/accounts/{account_id}/update-password");
        let new_password = "a brand new passphrase";

        let response = send(
            &t,
            "POST",
            &uri,
            Some(&token),
            Some(json!({"current_password": "wrong password!", "new_password": new_password})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            &t,
            "POST",
            &uri,
            Some(&token),
            Some(json!({"current_password": PASSWORD, "new_password": "short"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &t,
            "POST",
            &uri,
            Some(&token),
            Some(json!({"current_password": PASSWORD, "new_password": new_password})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let unlock = |password: &'static str| {
            send(
                &t,
                "POST",
                "/v1/unlock",
                None,
                Some(json!({"email": "user@example.com", "password": password})),
            )
        };
        assert_eq!(unlock(PASSWORD).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unlock(new_password).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn gateway_logs_are_stored_per_stream() {
        let t = test_state();
        let admin = admin_token(&t).await;
        let (provider_id, provider_token, gateway_id) = provider_with_gateway(&t, &admin).await;
        let base = format!("/v1/providers/{provider_id}/gateways/{gateway_id}");

        let response = send(
            &t,
            "POST",
            &format!("{base}/error-log"),
            Some(&provider_token),
            Some(json!({"logs": ["  upstream timeout ", "bad gateway"]})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["accepted"], 2);

        for stream in ["info-log", "server-notice-log"] {
            let response = send(
                &t,
                "POST",
                &format!("{base}/{stream}"),
                Some(&provider_token),
                Some(json!({"logs": ["started"]})),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = send(
            &t,
            "POST",
            &format!("{base}/info-log"),
            Some(&provider_token),
            Some(json!({"logs": ["fine", "   "]})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &t,
            "POST",
            &format!("/v1/providers/{provider_id}/gateways/missing/error-log"),
            Some(&provider_token),
            Some(json!({"logs": ["x"]})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let (_, account_token) = account_session(&t, "user@example.com").await;
        let response = send(
            &t,
            "POST",
            &format!("{base}/error-log"),
            Some(&account_token),
            Some(json!({"logs": ["x"]})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let logs = GatewayLogRepository::new(&t.state.storage);
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let errors = logs.read(GatewayLogStream::Error, &gateway_id, &today).unwrap();
        assert_eq!(
            errors.iter().map(|e| e.message.as_str()).collect::<Vec<_>>(),
            ["upstream timeout", "bad gateway"]
        );
        assert_eq!(logs.read(GatewayLogStream::Info, &gateway_id, &today).unwrap().len(), 1);
        assert_eq!(logs.read(GatewayLogStream::ServerNotice, &gateway_id, &today).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invite_is_issued_once_per_email() {
        let t = test_state();
        let invite = |email: &'static str, token: &'static str| {
            send(
                &t,
                "POST",
                "/v1/invite",
                None,
                Some(json!({"email": email, "recaptcha_token": token})),
            )
        };

        assert_eq!(invite("new@example.com", " ").await.status(), StatusCode::FORBIDDEN);
        assert_eq!(invite("not-an-email", "token").await.status(), StatusCode::BAD_REQUEST);

        let response = invite(" New@Example.com ", "token").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(json_body(response).await["expires_at"].is_string());
        assert_eq!(invite("new@example.com", "token").await.status(), StatusCode::BAD_REQUEST);

        account_session(&t, "member@example.com").await;
        assert_eq!(invite("member@example.com", "token").await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn registration_requires_invitation_when_configured() {
        let t = test_state_with(&[("REQUIRE_INVITATION", "true")]);
        let register = |email: &'static str, invitation: Option<String>| {
            send(
                &t,
                "POST",
                "/v1/register",
                None,
                Some(json!({"email": email, "password": PASSWORD, "invitation": invitation})),
            )
        };

        assert_eq!(register("new@example.com", None).await.status(), StatusCode::FORBIDDEN);

        let response = send(
            &t,
            "POST",
            "/v1/invite",
            None,
            Some(json!({"email": "new@example.com", "recaptcha_token": "token"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let invitation = InvitationRepository::new(&t.state.storage)
            .find_live("new@example.com", chrono::Utc::now())
            .unwrap()
            .unwrap();

        assert_eq!(
            register("other@example.com", Some(invitation.id.clone())).await.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            register("new@example.com", Some("bogus".into())).await.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            register("new@example.com", Some(invitation.id)).await.status(),
            StatusCode::CREATED
        );
    }
}
