// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registration invitations: human checks and delivery.
//!
//! Human verification goes to the reCAPTCHA `siteverify` endpoint when a
//! secret is configured and is skipped otherwise. Issued invitations are
//! POSTed to an operator webhook that owns the actual mail delivery.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::storage::StoredInvitation;

pub const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct InviteSettings {
    /// `None` skips human verification.
    pub recaptcha_secret: Option<String>,
    /// `None` stores invitations without delivering them.
    pub webhook: Option<url::Url>,
    pub ttl: chrono::Duration,
    /// Registration must present a live invitation for the same email.
    pub require_invitation: bool,
}

#[derive(Deserialize)]
struct SiteVerifyResponse {
    success: bool,
}

#[derive(Serialize)]
struct InvitationNotice<'a> {
    invitation_id: &'a str,
    email: &'a str,
    expires_at: chrono::DateTime<chrono::Utc>,
}

pub struct InviteService {
    http: reqwest::Client,
    settings: InviteSettings,
}

impl InviteService {
    pub fn new(settings: InviteSettings, timeout: Duration) -> Result<Self, InviteError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, settings })
    }

    pub fn settings(&self) -> &InviteSettings {
        &self.settings
    }

    /// Whether `token` passes the human check. Transport failures count as a no.
    pub async fn verify_human(&self, token: &str) -> bool {
        let Some(secret) = &self.settings.recaptcha_secret else {
            debug!("reCAPTCHA secret not configured; skipping verification");
            return true;
        };

        let result = async {
            let response = self
                .http
                .post(RECAPTCHA_VERIFY_URL)
                .query(&[("secret", secret.as_str()), ("response", token)])
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, InviteError>(response.json::<SiteVerifyResponse>().await?.success)
        }
        .await;

        match result {
            Ok(success) => success,
            Err(e) => {
                warn!(error = %e, "reCAPTCHA verification failed");
                false
            }
        }
    }

    /// Hand the invitation to the delivery webhook.
    pub async fn deliver(&self, invitation: &StoredInvitation) -> Result<(), InviteError> {
        let Some(webhook) = &self.settings.webhook else {
            info!(
                invitation_id = %invitation.id,
                expires_at = %invitation.expires_at,
                "No invitation webhook configured; invitation stored only"
            );
            return Ok(());
        };

        self.http
            .post(webhook.clone())
            .json(&InvitationNotice {
                invitation_id: &invitation.id,
                email: &invitation.email,
                expires_at: invitation.expires_at,
            })
            .send()
            .await?
            .error_for_status()?;

        info!(invitation_id = %invitation.id, "Delivered invitation");
        Ok(())
    }
}
