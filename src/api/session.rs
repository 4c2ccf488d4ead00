// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Invitation, registration and unlock endpoints.
//!
//! These are the only `/v1` routes reachable without a session, apart from
//! `GET /v1/version`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::{
    auth::{hash_password, keys_match, verify_password, AuthError, Role, ADMIN_SUBJECT, MIN_PASSWORD_LEN},
    error::ApiError,
    models::{KeyUnlockRequest, SessionResponse},
    routing::admission::normalize_email,
    state::AppState,
    storage::{
        AccountRepository, AccountResponse, AuditEvent, AuditEventType, AuditRepository,
        CustodialRepository, InvitationRepository, ProviderRepository, StorageError, StoredAccount,
        StoredCustodialKey, StoredInvitation,
    },
    vault::{generate_custodial_keypair, random_hex},
};

/// Bytes of randomness in a per-account chain secret.
const CHAIN_SECRET_BYTES: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub agree_tos: bool,
    #[serde(default)]
    pub agree_privacy: bool,
    #[serde(default)]
    pub agree_cookies: bool,
    /// Required when the server runs with `REQUIRE_INVITATION`.
    #[serde(default)]
    pub invitation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InviteRequest {
    pub email: String,
    pub recaptcha_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InviteResponse {
    pub expires_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnlockRequest {
    pub email: String,
    pub password: String,
}

/// Accepts exactly what `^.+@.+\..+$` accepts, where `.` excludes line
/// terminators.
pub fn is_valid_email(email: &str) -> bool {
    if email.contains(['\n', '\r', '\u{2028}', '\u{2029}']) {
        return false;
    }
    // Earliest `@` with at least one character in front of it.
    let Some(at) = email.char_indices().skip(1).find(|&(_, c)| c == '@').map(|(i, _)| i) else {
        return false;
    };
    let Some((last, _)) = email.char_indices().last() else {
        return false;
    };
    // A `.` with something between it and the `@` and something after it.
    email
        .char_indices()
        .any(|(i, c)| c == '.' && i > at + 1 && i < last)
}

/// Request a registration invitation for an email address.
///
/// At most one live invitation exists per email. The invitation id itself is
/// only handed to the delivery webhook, never returned here.
#[utoipa::path(
    post,
    path = "/v1/invite",
    tag = "Session",
    request_body = InviteRequest,
    responses(
        (status = 200, description = "Invitation issued", body = InviteResponse),
        (status = 400, description = "Invalid email or previous invitation still live"),
        (status = 403, description = "Human verification failed"),
        (status = 502, description = "Invitation could not be delivered")
    )
)]
pub async fn invite(
    State(state): State<AppState>,
    Json(request): Json<InviteRequest>,
) -> Result<Json<InviteResponse>, ApiError> {
    let token = request.recaptcha_token.trim();
    if token.is_empty() {
        return Err(ApiError::forbidden("recaptcha_token required"));
    }
    if !state.invites.verify_human(token).await {
        return Err(ApiError::forbidden("Invalid recaptcha response"));
    }

    let email = normalize_email(&request.email);
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    let now = Utc::now();
    let invitations = InvitationRepository::new(&state.storage);
    if invitations.find_live(&email, now)?.is_some() {
        return Err(ApiError::bad_request(format!(
            "Previous invitation found for {email}; use it or wait until it expires"
        )));
    }
    if state.routing.account_for_email(&email)?.is_some() {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    let invitation = StoredInvitation {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        expires_at: now + state.invites.settings().ttl,
        created_at: now,
    };
    invitations.create(&invitation)?;

    if let Err(e) = state.invites.deliver(&invitation).await {
        // An undelivered invitation would otherwise block a retry until expiry.
        if let Err(cleanup) = invitations.delete(&invitation.id) {
            tracing::warn!(error = %cleanup, "Failed to remove undelivered invitation");
        }
        return Err(e.into());
    }

    AuditRepository::new(&state.storage).record(
        AuditEvent::new(AuditEventType::InvitationIssued).with_resource("invitation", &invitation.id),
    );
    Ok(Json(InviteResponse {
        expires_at: invitation.expires_at,
    }))
}

/// Check the invitation presented at registration.
fn check_invitation(state: &AppState, email: &str, invitation: Option<&str>) -> Result<(), ApiError> {
    let id = invitation.map(str::trim).unwrap_or_default();
    if id.is_empty() {
        return Err(ApiError::forbidden("Invitation required"));
    }
    let invitation = match InvitationRepository::new(&state.storage).get(id) {
        Ok(invitation) => invitation,
        Err(StorageError::NotFound(_)) => return Err(ApiError::forbidden("Invalid invitation")),
        Err(e) => return Err(e.into()),
    };
    if !invitation.is_live(Utc::now()) {
        return Err(ApiError::forbidden("Invalid invitation"));
    }
    if invitation.email != email {
        return Err(ApiError::forbidden("Invalid email for invitation"));
    }
    Ok(())
}

/// Register a new account.
///
/// Generates the custodial keypair, encrypts its secret under the operator
/// passphrase, and assigns the account its permanent chain secret.
#[utoipa::path(
    post,
    path = "/v1/register",
    tag = "Session",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 400, description = "Invalid email or password"),
        (status = 403, description = "Missing or invalid invitation"),
        (status = 409, description = "Email already registered"),
        (status = 429, description = "Email was deleted recently")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let email = normalize_email(&request.email);
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if state.invites.settings().require_invitation {
        check_invitation(&state, &email, request.invitation.as_deref())?;
    }

    let account_id = uuid::Uuid::new_v4().to_string();
    state.routing.claim_email(&email, &account_id)?;

    let created = create_account(&state, &account_id, &email, request).await;
    if created.is_err() {
        if let Err(e) = state.routing.release_email(&email, &account_id) {
            tracing::warn!(error = %e, "Failed to release email claim after registration failure");
        }
    }
    let account = created?;

    AuditRepository::new(&state.storage).record(
        AuditEvent::new(AuditEventType::AccountRegistered)
            .with_actor(&account.id)
            .with_resource("account", &account.id),
    );
    info!(account_id = %account.id, "Registered account");

    Ok((StatusCode::CREATED, Json(AccountResponse::from(&account))))
}

async fn create_account(
    state: &AppState,
    account_id: &str,
    email: &str,
    request: RegisterRequest,
) -> Result<StoredAccount, ApiError> {
    let vault = state.vault.clone();
    let password = request.password;
    let (keypair, encrypted, password_hash) = tokio::task::spawn_blocking(move || {
        let keypair = generate_custodial_keypair();
        let encrypted = vault.encrypt(&keypair.secret_key)?;
        let password_hash = hash_password(&password)?;
        Ok::<_, ApiError>((keypair, encrypted, password_hash))
    })
    .await??;

    CustodialRepository::new(&state.storage).create(&StoredCustodialKey {
        address: keypair.address.clone(),
        public_key: keypair.public_key,
        private_key_encrypted: encrypted,
    })?;

    let account = StoredAccount {
        id: account_id.to_string(),
        email: email.to_string(),
        password_hash,
        custodial_address: keypair.address,
        chain_secret: random_hex::<CHAIN_SECRET_BYTES>(),
        is_partner: false,
        disabled: false,
        agree_tos: request.agree_tos,
        agree_privacy: request.agree_privacy,
        agree_cookies: request.agree_cookies,
        chains: Vec::new(),
        domains: Vec::new(),
        created_at: Utc::now(),
    };
    AccountRepository::new(&state.storage).create(&account)?;
    Ok(account)
}

/// Unlock an account with email and password.
#[utoipa::path(
    post,
    path = "/v1/unlock",
    tag = "Session",
    request_body = UnlockRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn unlock(
    State(state): State<AppState>,
    Json(request): Json<UnlockRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let email = normalize_email(&request.email);
    let audit = AuditRepository::new(&state.storage);
    let reject = |reason: &str| {
        audit.record(AuditEvent::new(AuditEventType::LoginFailed).failed(reason));
        ApiError::from(AuthError::InvalidCredentials)
    };

    let Some(account_id) = state.routing.account_for_email(&email)? else {
        return Err(reject("unknown email"));
    };
    let account = match AccountRepository::new(&state.storage).get(&account_id) {
        Ok(account) => account,
        Err(StorageError::NotFound(_)) => return Err(reject("unknown email")),
        Err(e) => return Err(e.into()),
    };
    if account.disabled {
        return Err(reject("account disabled"));
    }

    let hash = account.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&request.password, &hash)).await??;
    if !matches {
        return Err(reject("wrong password"));
    }

    let session = state.sessions.issue(&account.id, Role::Account)?;
    audit.record(AuditEvent::new(AuditEventType::AccountUnlocked).with_actor(&account.id));

    Ok(Json(
        SessionResponse::new(session, Role::Account).with_account(AccountResponse::from(&account)),
    ))
}

/// Unlock a provider session with its issued key.
#[utoipa::path(
    post,
    path = "/v1/providers/{provider_id}/unlock",
    tag = "Session",
    params(("provider_id" = String, Path, description = "Provider ID")),
    request_body = KeyUnlockRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn provider_unlock(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    Json(request): Json<KeyUnlockRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let provider = match ProviderRepository::new(&state.storage).get(&provider_id) {
        Ok(provider) => provider,
        Err(StorageError::NotFound(_)) => return Err(AuthError::InvalidCredentials.into()),
        Err(e) => return Err(e.into()),
    };

    let hash = provider.key_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&request.key, &hash)).await??;
    if !matches {
        return Err(AuthError::InvalidCredentials.into());
    }

    let session = state.sessions.issue(&provider.id, Role::Provider)?;
    AuditRepository::new(&state.storage).record(
        AuditEvent::new(AuditEventType::ProviderUnlocked)
            .with_actor(&provider.id)
            .with_resource("provider", &provider.id),
    );
    Ok(Json(SessionResponse::new(session, Role::Provider)))
}

/// Exchange `ADMIN_KEY` for an admin session.
#[utoipa::path(
    post,
    path = "/v1/admin/unlock",
    tag = "Session",
    request_body = KeyUnlockRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 401, description = "Invalid key"),
        (status = 403, description = "Admin access not configured")
    )
)]
pub async fn admin_unlock(
    State(state): State<AppState>,
    Json(request): Json<KeyUnlockRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let expected = state
        .config
        .admin_key
        .as_deref()
        .ok_or(AuthError::AdminDisabled)?;
    if !keys_match(expected, &request.key) {
        AuditRepository::new(&state.storage)
            .record(AuditEvent::new(AuditEventType::AdminAccess).failed("invalid admin key"));
        return Err(AuthError::InvalidCredentials.into());
    }

    let session = state.sessions.issue(ADMIN_SUBJECT, Role::Admin)?;
    AuditRepository::new(&state.storage)
        .record(AuditEvent::new(AuditEventType::AdminAccess).with_actor(ADMIN_SUBJECT));
    Ok(Json(SessionResponse::new(session, Role::Admin)))
}
