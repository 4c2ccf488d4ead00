// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Community Chains - relay routing and custodial account service
//!
//! Accounts bind chains and receive a stable, globally unique hostname per
//! chain. Providers download per-gateway routing tables built from those
//! bindings. Reads against the external RPC network go through a redundant
//! consensus client.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Session tokens, roles and extractors
//! - `consensus` - Redundant majority-vote queries
//! - `invite` - Registration invitations (human check, delivery)
//! - `network` - External RPC network client
//! - `registry` - Deletion cooldowns over hashed identifiers
//! - `routing` - Host derivation, bindings, routing tables, admission
//! - `storage` - JSON record store and redb index
//! - `vault` - Custodial key encryption
//! - `reconciler` - Background index repair and tombstone pruning

pub mod api;
pub mod auth;
pub mod config;
pub mod consensus;
pub mod error;
pub mod invite;
pub mod models;
pub mod network;
pub mod reconciler;
pub mod registry;
pub mod routing;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod vault;
