// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Hostname derivation.

use sha2::{Digest, Sha256};

/// Hex characters of the digest kept in the host label.
pub const HOST_PREFIX_LEN: usize = 16;

/// Derive the routing host for one account's use of one chain.
///
/// `hex(SHA256(account_id + account_secret + chain_id))[..16] + "." + chain_id + "." + base_domain`
///
/// Pure: identical inputs give the identical host forever, which is what
/// makes re-binding idempotent. `account_secret` must therefore never change.
/// The chain id is lowercased before hashing so `00A1` and `00a1` share a host.
pub fn derive_host(account_id: &str, account_secret: &str, chain_id: &str, base_domain: &str) -> String {
    let chain_id = chain_id.to_ascii_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(account_id.as_bytes());
    hasher.update(account_secret.as_bytes());
    hasher.update(chain_id.as_bytes());
    let digest = hex::encode(hasher.finalize());

    format!("{}.{chain_id}.{base_domain}", &digest[..HOST_PREFIX_LEN])
}
