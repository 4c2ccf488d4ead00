// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HS256 session tokens.
//!
//! Accounts unlock with email and password, providers with their issued key,
//! operators with `ADMIN_KEY`. Each unlock yields a bearer token signed with
//! `SESSION_SECRET` that the [`Auth`](super::Auth) extractor verifies.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use sha2::Sha256;
use utoipa::ToSchema;

use super::{AuthError, AuthenticatedUser, Role, SessionClaims};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Subject recorded in admin sessions.
pub const ADMIN_SUBJECT: &str = "admin";

/// A freshly issued bearer token.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SessionIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, subject: &str, role: Role) -> Result<IssuedSession, AuthError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = SessionClaims {
            sub: subject.to_string(),
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            sid: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::InternalError(format!("failed to sign session: {e}")))?;

        tracing::debug!(subject, %role, sid = %claims.sid, "Issued session");
        Ok(IssuedSession { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;

        let data = decode::<SessionClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            }
        })?;

        Ok(AuthenticatedUser::from_claims(data.claims))
    }
}

/// Constant-time comparison of an operator-held key with a presented one.
pub fn keys_match(expected: &str, provided: &str) -> bool {
    const CONTEXT: &[u8] = b"community-chains/key-compare";

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(expected.as_bytes()) else {
        return false;
    };
    mac.update(CONTEXT);
    let tag = mac.finalize().into_bytes();

    let Ok(mut candidate) = Hmac::<Sha256>::new_from_slice(provided.as_bytes()) else {
        return false;
    };
    candidate.update(CONTEXT);
    candidate.verify_slice(&tag).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> SessionIssuer {
        SessionIssuer::new(b"0123456789abcdef0123456789abcdef", Duration::hours(24))
    }

    #[test]
    fn issued_token_verifies() {
        let issuer = issuer();
        let session = issuer.issue("acc-1", Role::Account).unwrap();
        let user = issuer.verify(&session.token).unwrap();

        assert_eq!(user.subject_id, "acc-1");
        assert_eq!(user.role, Role::Account);
        assert_eq!(user.expires_at, session.expires_at.timestamp());
    }

    #[test]
    fn sessions_get_distinct_ids() {
        let issuer = issuer();
        let a = issuer.verify(&issuer.issue("p", Role::Provider).unwrap().token).unwrap();
        let b = issuer.verify(&issuer.issue("p", Role::Provider).unwrap().token).unwrap();
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let token = issuer().issue("acc-1", Role::Account).unwrap().token;
        let other = SessionIssuer::new(b"another-secret-another-secret-xx", Duration::hours(1));
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = issuer();
        let past = Utc::now() - Duration::hours(2);
        let claims = SessionClaims {
            sub: "acc-1".into(),
            role: Role::Account,
            iat: past.timestamp(),
            exp: (past + Duration::minutes(30)).timestamp(),
            sid: "s".into(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &issuer.encoding).unwrap();
        assert!(matches!(issuer.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(issuer().verify("not.a.jwt"), Err(AuthError::MalformedToken)));
    }

    #[test]
    fn key_comparison() {
        assert!(keys_match("operator-key", "operator-key"));
        assert!(!keys_match("operator-key", "operator-kez"));
        assert!(!keys_match("operator-key", ""));
    }
}
