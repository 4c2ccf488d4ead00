// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::auth::AuthError;
use crate::invite::InviteError;
use crate::routing::RoutingError;
use crate::storage::{IndexDbError, StorageError};
use crate::vault::VaultError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Machine-readable code, set for authentication failures.
    pub code: Option<&'static str>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<&'static str>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    /// Log the cause, return a generic 500.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        error!(error = %cause, "Internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code,
        });
        (self.status, body).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(what) => ApiError::not_found(format!("Not found: {what}")),
            StorageError::AlreadyExists(what) => ApiError::conflict(format!("Already exists: {what}")),
            other => ApiError::internal(other),
        }
    }
}

impl From<IndexDbError> for ApiError {
    fn from(e: IndexDbError) -> Self {
        ApiError::internal(e)
    }
}

impl From<VaultError> for ApiError {
    fn from(e: VaultError) -> Self {
        ApiError::internal(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        let status = e.status_code();
        match e {
            AuthError::InternalError(msg) => ApiError::internal(msg),
            other => ApiError {
                code: Some(other.error_code()),
                ..ApiError::new(status, other.to_string())
            },
        }
    }
}

impl From<RoutingError> for ApiError {
    fn from(e: RoutingError) -> Self {
        let message = e.to_string();
        match e {
            RoutingError::Conflict { .. }
            | RoutingError::NodeExists(_)
            | RoutingError::DomainTaken(_)
            | RoutingError::EmailTaken => ApiError::conflict(message),
            RoutingError::AccountNotFound(_)
            | RoutingError::ChainNotFound(_)
            | RoutingError::GatewayNotFound(_)
            | RoutingError::ProviderNotFound(_)
            | RoutingError::NodeNotFound(_)
            | RoutingError::DomainNotFound(_) => ApiError::not_found(message),
            RoutingError::ChainDisabled(_)
            | RoutingError::PartnerOnly(_)
            | RoutingError::PartnerForbidden => ApiError::forbidden(message),
            RoutingError::Cooldown { .. } => ApiError::new(StatusCode::TOO_MANY_REQUESTS, message),
            RoutingError::NodeNotStaked(_) => ApiError::unprocessable(message),
            RoutingError::InvalidAddress(_) | RoutingError::InvalidDomain(_) => {
                ApiError::bad_request(message)
            }
            RoutingError::Storage(e) => e.into(),
            RoutingError::Index(e) => ApiError::internal(e),
            RoutingError::Registry(e) => ApiError::internal(e),
        }
    }
}

impl From<InviteError> for ApiError {
    fn from(e: InviteError) -> Self {
        tracing::warn!(error = %e, "Invitation delivery failed");
        ApiError::new(StatusCode::BAD_GATEWAY, "Invitation could not be delivered")
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::internal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::IdentifierClass;
    use axum::body::to_bytes;
    use chrono::Utc;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);

        let unp = ApiError::unprocessable("oops");
        assert_eq!(unp.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }

    #[test]
    fn routing_errors_map_to_statuses() {
        let cases = [
            (RoutingError::Conflict { host: "h".into() }, StatusCode::CONFLICT),
            (RoutingError::ChainNotFound("1".into()), StatusCode::NOT_FOUND),
            (RoutingError::ChainDisabled("1".into()), StatusCode::FORBIDDEN),
            (RoutingError::PartnerOnly("1".into()), StatusCode::FORBIDDEN),
            (RoutingError::NodeNotStaked("a".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (RoutingError::InvalidDomain("x".into()), StatusCode::BAD_REQUEST),
            (
                RoutingError::Storage(StorageError::NotInitialized),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn cooldown_reports_retry_time() {
        let at = Utc::now();
        let err = ApiError::from(RoutingError::Cooldown {
            class: IdentifierClass::Node,
            available_at: at,
        });
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert!(err.message.contains(&at.to_string()));
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ApiError::from(VaultError::Authentication);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }

    #[test]
    fn auth_errors_keep_their_code() {
        let err = ApiError::from(AuthError::InvalidCredentials);
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.code, Some("invalid_credentials"));
    }
}
