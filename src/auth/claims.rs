// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session claims and the authenticated caller.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{AuthError, Role};

/// Claims carried in a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account id, provider id, or `admin`.
    pub sub: String,
    pub role: Role,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
    /// Session id, unique per issued token
    pub sid: String,
}

/// Authenticated caller extracted from a verified session token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Subject id (account or provider id)
    pub subject_id: String,
    pub role: Role,
    pub session_id: String,
    /// Token expiration (Unix timestamp)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: SessionClaims) -> Self {
        Self {
            subject_id: claims.sub,
            role: claims.role,
            session_id: claims.sid,
            expires_at: claims.exp,
        }
    }

    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Allow the account itself or an admin.
    pub fn require_account(&self, account_id: &str) -> Result<(), AuthError> {
        self.require_subject(Role::Account, account_id)
    }

    /// Allow the provider itself or an admin.
    pub fn require_provider(&self, provider_id: &str) -> Result<(), AuthError> {
        self.require_subject(Role::Provider, provider_id)
    }

    fn require_subject(&self, role: Role, id: &str) -> Result<(), AuthError> {
        if self.is_admin() || (self.role == role && self.subject_id == id) {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, id: &str) -> AuthenticatedUser {
        AuthenticatedUser::from_claims(SessionClaims {
            sub: id.to_string(),
            role,
            iat: 1_700_000_000,
            exp: 1_700_086_400,
            sid: "sess".to_string(),
        })
    }

    #[test]
    fn from_claims_copies_subject_and_expiry() {
        let u = user(Role::Account, "acc-1");
        assert_eq!(u.subject_id, "acc-1");
        assert_eq!(u.expires_at, 1_700_086_400);
    }

    #[test]
    fn account_may_only_act_on_itself() {
        let u = user(Role::Account, "acc-1");
        assert!(u.require_account("acc-1").is_ok());
        assert!(u.require_account("acc-2").is_err());
        assert!(u.require_provider("acc-1").is_err());
    }

    #[test]
    fn admin_may_act_on_anyone() {
        let u = user(Role::Admin, "admin");
        assert!(u.require_account("acc-1").is_ok());
        assert!(u.require_provider("prov-1").is_ok());
    }
}
