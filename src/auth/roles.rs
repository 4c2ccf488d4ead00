// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Who a session belongs to.
///
/// ## Role Hierarchy
///
/// - `Admin` - Operator session; may act on any account or provider
/// - `Account` - End user; may only act on its own account
/// - `Provider` - Gateway operator; may only read its own gateways and routing tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Account,
    Provider,
}

impl Role {
    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        match (self, required) {
            (Role::Admin, _) => true,
            (Role::Account, Role::Account) => true,
            (Role::Provider, Role::Provider) => true,
            _ => false,
        }
    }

    /// Parse role from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Role> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "account" => Some(Role::Account),
            "provider" => Some(Role::Provider),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Account => write!(f, "account"),
            Role::Provider => write!(f, "provider"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_all_privileges() {
        assert!(Role::Admin.has_privilege(Role::Admin));
        assert!(Role::Admin.has_privilege(Role::Account));
        assert!(Role::Admin.has_privilege(Role::Provider));
    }

    #[test]
    fn account_and_provider_are_disjoint() {
        assert!(Role::Account.has_privilege(Role::Account));
        assert!(!Role::Account.has_privilege(Role::Provider));
        assert!(!Role::Account.has_privilege(Role::Admin));
        assert!(!Role::Provider.has_privilege(Role::Account));
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("Provider"), Some(Role::Provider));
        assert_eq!(Role::parse("client"), None);
    }

    #[test]
    fn serde_uses_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Account).unwrap(), r#""account""#);
    }
}
