// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated callers.
//!
//! ```rust,ignore
//! async fn get_account(Auth(user): Auth, Path(id): Path<String>) -> Result<_, ApiError> {
//!     user.require_account(&id)?;
//!     // ...
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Any valid session.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let user = state.sessions.verify(token)?;
        parts.extensions.insert(user.clone());
        Ok(Auth(user))
    }
}

/// An admin session.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::state::tests::test_state;
    use axum::http::Request;

    fn parts(token: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn requires_auth_header() {
        let t = test_state();
        let result = Auth::from_request_parts(&mut parts(None), &t.state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn rejects_non_bearer_scheme() {
        let t = test_state();
        let mut p = Request::builder()
            .uri("/test")
            .header("Authorization", "Basic abc")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        let result = Auth::from_request_parts(&mut p, &t.state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn accepts_issued_session() {
        let t = test_state();
        let session = t.state.sessions.issue("acc-1", Role::Account).unwrap();

        let Auth(user) = Auth::from_request_parts(&mut parts(Some(&session.token)), &t.state)
            .await
            .unwrap();
        assert_eq!(user.subject_id, "acc-1");
        assert_eq!(user.role, Role::Account);
    }

    #[tokio::test]
    async fn admin_only_rejects_account_session() {
        let t = test_state();
        let session = t.state.sessions.issue("acc-1", Role::Account).unwrap();
        let result = AdminOnly::from_request_parts(&mut parts(Some(&session.token)), &t.state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }

    #[tokio::test]
    async fn admin_only_accepts_admin_session() {
        let t = test_state();
        let session = t.state.sessions.issue("admin", Role::Admin).unwrap();
        assert!(AdminOnly::from_request_parts(&mut parts(Some(&session.token)), &t.state)
            .await
            .is_ok());
    }
}
