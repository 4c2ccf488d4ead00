// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account endpoints: profile, credentials, balance, key export, chain
//! bindings, domains and deletion. Every route requires a session for the account in the path
//! (or an admin session).

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    audit_log,
    api::session::is_valid_email,
    auth::{hash_password, verify_password, Auth, AuthError, AuthenticatedUser, MIN_PASSWORD_LEN},
    error::ApiError,
    models::{
        ChainBindingsResponse, ChainIdRequest, DomainRequest, DomainsResponse, MessageResponse,
        PasswordConfirmation, UpdateChainsRequest,
    },
    routing::admission::normalize_email,
    state::AppState,
    storage::{
        AccountRepository, AccountResponse, AuditEventType, ChainHostBinding, CustodialRepository,
        StoredAccount,
    },
};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub address: String,
    /// Whole units with six decimals; `"0"` when the network gave no answer.
    pub balance: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PrivateKeyResponse {
    pub address: String,
    /// 64-byte ed25519 keypair, hex.
    pub private_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateEmailRequest {
    pub email: String,
    /// Current account password.
    pub password: String,
    /// Checked when the server has a reCAPTCHA secret.
    #[serde(default)]
    pub recaptcha_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// ============================================================================
// Helpers
// ============================================================================

fn load_for(state: &AppState, user: &AuthenticatedUser, account_id: &str) -> Result<StoredAccount, ApiError> {
    user.require_account(account_id)?;
    Ok(AccountRepository::new(&state.storage).get(account_id)?)
}

/// Re-check the account password before a sensitive operation.
async fn confirm_password(account: &StoredAccount, password: String) -> Result<(), ApiError> {
    let hash = account.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await??;
    if matches {
        Ok(())
    } else {
        Err(AuthError::InvalidCredentials.into())
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[utoipa::path(
    get,
    path = "/v1/accounts/{id}",
    tag = "Accounts",
    params(("id" = String, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account", body = AccountResponse),
        (status = 403, description = "Not your account"),
        (status = 404, description = "Account not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_account(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = load_for(&state, &user, &id)?;
    Ok(Json(AccountResponse::from(&account)))
}

/// Balance of the account's custodial address, agreed by the consensus client.
#[utoipa::path(
    get,
    path = "/v1/accounts/{id}/balance",
    tag = "Accounts",
    params(("id" = String, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Balance", body = BalanceResponse),
        (status = 404, description = "Account not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_balance(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account = load_for(&state, &user, &id)?;
    let balance = state.network.balance(&account.custodial_address).await;
    Ok(Json(BalanceResponse {
        address: account.custodial_address,
        balance,
    }))
}

/// Change the account email.
///
/// The new address is gated and claimed like a registration; the old one is
/// released and enters the account-email cooldown.
#[utoipa::path(
    post,
    path = "/v1/accounts/{id}/update-email",
    tag = "Accounts",
    params(("id" = String, Path, description = "Account ID")),
    request_body = UpdateEmailRequest,
    responses(
        (status = 200, description = "Updated account", body = AccountResponse),
        (status = 400, description = "Invalid email"),
        (status = 401, description = "Wrong password"),
        (status = 403, description = "Human verification failed"),
        (status = 409, description = "Email already registered"),
        (status = 429, description = "Email was deleted recently")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_email(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(request): Json<UpdateEmailRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = load_for(&state, &user, &id)?;
    let email = normalize_email(&request.email);
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    if !state.invites.verify_human(request.recaptcha_token.trim()).await {
        return Err(ApiError::forbidden("Invalid recaptcha response"));
    }
    confirm_password(&account, request.password).await?;

    let account = state.routing.update_email(&id, &email).await?;
    audit_log!(&state.storage, AuditEventType::EmailUpdated, &user, "account", &id);
    Ok(Json(AccountResponse::from(&account)))
}

/// Change the account password.
#[utoipa::path(
    post,
    path = "/v1/accounts/{id}/update-password",
    tag = "Accounts",
    params(("id" = String, Path, description = "Account ID")),
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "New password too short"),
        (status = 401, description = "Wrong current password")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_password(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(request): Json<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let account = load_for(&state, &user, &id)?;
    confirm_password(&account, request.current_password).await?;
    if request.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let new_password = request.new_password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&new_password)).await??;
    state.routing.set_password_hash(&id, password_hash).await?;

    audit_log!(&state.storage, AuditEventType::PasswordUpdated, &user, "account", &id);
    tracing::info!(account_id = %id, "Updated account password");
    Ok(Json(MessageResponse::new("Password updated")))
}

/// Decrypt and return the custodial private key after a password check.
#[utoipa::path(
    post,
    path = "/v1/accounts/{id}/private-key",
    tag = "Accounts",
    params(("id" = String, Path, description = "Account ID")),
    request_body = PasswordConfirmation,
    responses(
        (status = 200, description = "Private key", body = PrivateKeyResponse),
        (status = 401, description = "Wrong password")
    ),
    security(("bearer_auth" = []))
)]
pub async fn reveal_private_key(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(request): Json<PasswordConfirmation>,
) -> Result<Json<PrivateKeyResponse>, ApiError> {
    let account = load_for(&state, &user, &id)?;
    confirm_password(&account, request.password).await?;

    let record = CustodialRepository::new(&state.storage).get(&account.custodial_address)?;
    let vault = state.vault.clone();
    let private_key =
        tokio::task::spawn_blocking(move || vault.decrypt(&record.private_key_encrypted)).await??;

    audit_log!(&state.storage, AuditEventType::PrivateKeyRevealed, &user, "account", &account.id);
    Ok(Json(PrivateKeyResponse {
        address: account.custodial_address,
        private_key,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/accounts/{id}/add-chain",
    tag = "Accounts",
    params(("id" = String, Path, description = "Account ID")),
    request_body = ChainIdRequest,
    responses(
        (status = 200, description = "Chain bound", body = ChainHostBinding),
        (status = 403, description = "Chain disabled or partner-only"),
        (status = 404, description = "Chain not found"),
        (status = 409, description = "Host conflict")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_chain(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(request): Json<ChainIdRequest>,
) -> Result<Json<ChainHostBinding>, ApiError> {
    user.require_account(&id)?;
    let binding = state.routing.bind_chain(&id, &request.id).await?;
    audit_log!(&state.storage, AuditEventType::ChainBound, &user, "chain", &binding.chain_id);
    Ok(Json(binding))
}

#[utoipa::path(
    post,
    path = "/v1/accounts/{id}/remove-chain",
    tag = "Accounts",
    params(("id" = String, Path, description = "Account ID")),
    request_body = ChainIdRequest,
    responses((status = 200, description = "Remaining bindings", body = ChainBindingsResponse)),
    security(("bearer_auth" = []))
)]
pub async fn remove_chain(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(request): Json<ChainIdRequest>,
) -> Result<Json<ChainBindingsResponse>, ApiError> {
    user.require_account(&id)?;
    if state.routing.unbind_chain(&id, &request.id).await? {
        audit_log!(&state.storage, AuditEventType::ChainUnbound, &user, "chain", &request.id);
    }
    let account = AccountRepository::new(&state.storage).get(&id)?;
    Ok(Json(ChainBindingsResponse {
        chains: account.chains,
    }))
}

/// Replace the account's chain list in one step.
#[utoipa::path(
    post,
    path = "/v1/accounts/{id}/update-chains",
    tag = "Accounts",
    params(("id" = String, Path, description = "Account ID")),
    request_body = UpdateChainsRequest,
    responses(
        (status = 200, description = "New bindings", body = ChainBindingsResponse),
        (status = 409, description = "Host conflict; bindings unchanged")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_chains(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(request): Json<UpdateChainsRequest>,
) -> Result<Json<ChainBindingsResponse>, ApiError> {
    user.require_account(&id)?;
    let chains = state.routing.set_chains(&id, &request.chains).await?;
    audit_log!(&state.storage, AuditEventType::ChainsReplaced, &user, "account", &id);
    Ok(Json(ChainBindingsResponse { chains }))
}

#[utoipa::path(
    post,
    path = "/v1/accounts/{id}/add-domain",
    tag = "Accounts",
    params(("id" = String, Path, description = "Account ID")),
    request_body = DomainRequest,
    responses(
        (status = 200, description = "Domains", body = DomainsResponse),
        (status = 400, description = "Invalid domain"),
        (status = 409, description = "Domain bound elsewhere"),
        (status = 429, description = "Domain was deleted recently")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_domain(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(request): Json<DomainRequest>,
) -> Result<Json<DomainsResponse>, ApiError> {
    user.require_account(&id)?;
    let domain = state.routing.add_domain(&id, &request.domain).await?;
    audit_log!(&state.storage, AuditEventType::DomainAdded, &user, "domain", &domain);
    let account = AccountRepository::new(&state.storage).get(&id)?;
    Ok(Json(DomainsResponse {
        domains: account.domains,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/accounts/{id}/remove-domain",
    tag = "Accounts",
    params(("id" = String, Path, description = "Account ID")),
    request_body = DomainRequest,
    responses(
        (status = 200, description = "Domains", body = DomainsResponse),
        (status = 404, description = "Domain not bound")
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_domain(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(request): Json<DomainRequest>,
) -> Result<Json<DomainsResponse>, ApiError> {
    user.require_account(&id)?;
    state.routing.remove_domain(&id, &request.domain).await?;
    audit_log!(&state.storage, AuditEventType::DomainRemoved, &user, "domain", request.domain.trim());
    let account = AccountRepository::new(&state.storage).get(&id)?;
    Ok(Json(DomainsResponse {
        domains: account.domains,
    }))
}

/// Delete the account after a password check.
#[utoipa::path(
    post,
    path = "/v1/accounts/{id}/delete",
    tag = "Accounts",
    params(("id" = String, Path, description = "Account ID")),
    request_body = PasswordConfirmation,
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 401, description = "Wrong password")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_account(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(request): Json<PasswordConfirmation>,
) -> Result<Json<MessageResponse>, ApiError> {
    let account = load_for(&state, &user, &id)?;
    confirm_password(&account, request.password).await?;

    state.routing.delete_account(&id).await?;
    audit_log!(&state.storage, AuditEventType::AccountDeleted, &user, "account", &id);
    Ok(Json(MessageResponse::new("Account deleted")))
}
