// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Session tokens for accounts, providers and operators.
//!
//! ## Auth Flow
//!
//! 1. Caller unlocks: `POST /v1/unlock` (email + password),
//!    `POST /v1/providers/{id}/unlock` (provider key) or
//!    `POST /v1/admin/unlock` (`ADMIN_KEY`)
//! 2. Server returns an HS256 token signed with `SESSION_SECRET`
//! 3. Caller sends `Authorization: Bearer <token>`
//! 4. [`Auth`] verifies signature and expiry and yields the subject and role;
//!    handlers then check the subject owns the path resource
//!
//! ## Security
//!
//! - All non-health endpoints except registration and unlock require a session
//! - Passwords and provider keys are stored as Argon2id PHC strings
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod password;
pub mod roles;
pub mod session;

pub use claims::{AuthenticatedUser, SessionClaims};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth};
pub use password::{hash_password, verify_password, MIN_PASSWORD_LEN};
pub use roles::Role;
pub use session::{keys_match, IssuedSession, SessionIssuer, ADMIN_SUBJECT};
