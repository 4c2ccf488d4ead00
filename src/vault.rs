// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custodial key encryption.
//!
//! # Algorithms
//!
//! - **Key Generation**: Ed25519; the address is the first 20 bytes of
//!   SHA-256 over the public key, hex encoded
//! - **Key Derivation**: scrypt (memory-hard), parameters stored in the blob
//! - **Encryption**: AES-256-CBC with PKCS#7 padding
//! - **Integrity**: HMAC-SHA256 over `iv || ciphertext` (encrypt-then-MAC)
//!
//! The passphrase is operator-wide. Per-secret confidentiality comes from the
//! fresh random salt and IV drawn for every encryption.
//!
//! scrypt is PBKDF2-based, so the first 32 bytes of a 64-byte derivation are
//! exactly the 32-byte derivation: the AES key is `scrypt(pass, salt, 32)`
//! and the MAC key is the following 32 bytes.
//!
//! Blobs without `kdf` and `mac` fields were written before the tag existed.
//! They use the default cost parameters and a bare 32-byte key, and are
//! authenticated only by the PKCS#7 and UTF-8 checks on the way out.

use std::fmt;

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ed25519_dalek::SigningKey;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Constants
// =============================================================================

/// Algorithm label written into every blob.
pub const ALGORITHM: &str = "aes-256-cbc";

/// Symmetric key length in bytes.
pub const KEY_LEN: usize = 32;

/// MAC key length in bytes.
pub const MAC_KEY_LEN: usize = 32;

/// Salt length for key derivation.
pub const SALT_LEN: usize = 16;

/// AES block-sized IV.
pub const IV_LEN: usize = 16;

/// Upper bound on the work factor accepted from a blob.
const MAX_LOG_N: u8 = 20;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("malformed encrypted secret: {0}")]
    Malformed(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid key derivation parameters: {0}")]
    InvalidKdf(String),

    /// Wrong passphrase or tampered blob. Never yields plaintext.
    #[error("decryption failed (wrong passphrase or corrupted secret)")]
    Authentication,
}

pub type VaultResult<T> = Result<T, VaultError>;

// =============================================================================
// Blob Format
// =============================================================================

/// scrypt cost parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct KdfParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl Default for KdfParams {
    /// N = 16384, r = 8, p = 1.
    fn default() -> Self {
        Self {
            log_n: 14,
            r: 8,
            p: 1,
        }
    }
}

/// Self-describing encrypted blob. Every binary field is hex.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedSecret {
    pub algorithm: String,
    pub keylen: usize,
    #[serde(default)]
    pub kdf: KdfParams,
    pub salt: String,
    pub iv: String,
    pub encrypted: String,
    /// Absent on untagged blobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

// =============================================================================
// Encryption / Decryption
// =============================================================================

fn derive(passphrase: &str, salt: &[u8], len: usize, kdf: KdfParams) -> VaultResult<Vec<u8>> {
    if kdf.log_n > MAX_LOG_N {
        return Err(VaultError::InvalidKdf(format!("log_n {} too large", kdf.log_n)));
    }
    let params = scrypt::Params::new(kdf.log_n, kdf.r, kdf.p, len)
        .map_err(|e| VaultError::InvalidKdf(e.to_string()))?;

    let mut out = vec![0u8; len];
    scrypt::scrypt(passphrase.as_bytes(), salt, &params, &mut out)
        .map_err(|e| VaultError::InvalidKdf(e.to_string()))?;
    Ok(out)
}

/// Derive the AES key and MAC key from the passphrase.
fn derive_keys(
    passphrase: &str,
    salt: &[u8],
    keylen: usize,
    kdf: KdfParams,
) -> VaultResult<(Vec<u8>, Vec<u8>)> {
    let mut out = derive(passphrase, salt, keylen + MAC_KEY_LEN, kdf)?;
    let mac_key = out.split_off(keylen);
    Ok((out, mac_key))
}

fn compute_mac(mac_key: &[u8], iv: &[u8], ciphertext: &[u8]) -> VaultResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(mac_key)
        .map_err(|e| VaultError::InvalidKdf(e.to_string()))?;
    mac.update(iv);
    mac.update(ciphertext);
    Ok(mac)
}

fn decode_hex(field: &str, value: &str) -> VaultResult<Vec<u8>> {
    hex::decode(value).map_err(|e| VaultError::Malformed(format!("{field}: {e}")))
}

/// Encrypt `plaintext` under `passphrase` with explicit cost parameters.
pub fn encrypt_with(plaintext: &str, passphrase: &str, kdf: KdfParams) -> VaultResult<String> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let (key, mac_key) = derive_keys(passphrase, &salt, KEY_LEN, kdf)?;

    let ciphertext = Aes256CbcEnc::new_from_slices(&key, &iv)
        .map_err(|e| VaultError::InvalidKdf(e.to_string()))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let tag = compute_mac(&mac_key, &iv, &ciphertext)?.finalize().into_bytes();

    let blob = EncryptedSecret {
        algorithm: ALGORITHM.to_string(),
        keylen: KEY_LEN,
        kdf,
        salt: hex::encode(salt),
        iv: hex::encode(iv),
        encrypted: hex::encode(&ciphertext),
        mac: Some(hex::encode(tag)),
    };
    serde_json::to_string(&blob).map_err(|e| VaultError::Malformed(e.to_string()))
}

/// Encrypt `plaintext` under `passphrase` with the default cost parameters.
pub fn encrypt(plaintext: &str, passphrase: &str) -> VaultResult<String> {
    encrypt_with(plaintext, passphrase, KdfParams::default())
}

/// Open a blob produced by [`encrypt`].
///
/// Everything needed besides the passphrase is read from the blob itself.
pub fn decrypt(blob: &str, passphrase: &str) -> VaultResult<String> {
    let secret: EncryptedSecret =
        serde_json::from_str(blob).map_err(|e| VaultError::Malformed(e.to_string()))?;

    if secret.algorithm != ALGORITHM {
        return Err(VaultError::UnsupportedAlgorithm(secret.algorithm));
    }
    if secret.keylen != KEY_LEN {
        return Err(VaultError::Malformed(format!("keylen {}", secret.keylen)));
    }

    let salt = decode_hex("salt", &secret.salt)?;
    let iv = decode_hex("iv", &secret.iv)?;
    let ciphertext = decode_hex("encrypted", &secret.encrypted)?;
    if salt.len() != SALT_LEN || iv.len() != IV_LEN {
        return Err(VaultError::Malformed("salt or iv length".to_string()));
    }

    let key = match &secret.mac {
        Some(mac) => {
            let tag = decode_hex("mac", mac)?;
            let (key, mac_key) = derive_keys(passphrase, &salt, secret.keylen, secret.kdf)?;
            compute_mac(&mac_key, &iv, &ciphertext)?
                .verify_slice(&tag)
                .map_err(|_| VaultError::Authentication)?;
            key
        }
        None => derive(passphrase, &salt, secret.keylen, secret.kdf)?,
    };

    let plaintext = Aes256CbcDec::new_from_slices(&key, &iv)
        .map_err(|e| VaultError::InvalidKdf(e.to_string()))?
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| VaultError::Authentication)?;

    String::from_utf8(plaintext).map_err(|_| VaultError::Authentication)
}

// =============================================================================
// KeyVault
// =============================================================================

/// Holds the operator passphrase and applies it to custodial secrets.
#[derive(Clone)]
pub struct KeyVault {
    passphrase: String,
    kdf: KdfParams,
}

impl fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyVault")
            .field("passphrase", &"<redacted>")
            .field("kdf", &self.kdf)
            .finish()
    }
}

impl KeyVault {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self::with_params(passphrase, KdfParams::default())
    }

    pub fn with_params(passphrase: impl Into<String>, kdf: KdfParams) -> Self {
        Self {
            passphrase: passphrase.into(),
            kdf,
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> VaultResult<String> {
        encrypt_with(plaintext, &self.passphrase, self.kdf)
    }

    pub fn decrypt(&self, blob: &str) -> VaultResult<String> {
        decrypt(blob, &self.passphrase)
    }
}

// =============================================================================
// Custodial Keys
// =============================================================================

/// A freshly generated custodial keypair.
pub struct CustodialKeypair {
    /// First 20 bytes of SHA-256(public key), hex.
    pub address: String,
    pub public_key: String,
    /// 64-byte secret||public keypair, hex.
    pub secret_key: String,
}

impl fmt::Debug for CustodialKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustodialKeypair")
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Address for an ed25519 public key.
pub fn address_for_public_key(public_key: &[u8]) -> String {
    let digest = Sha256::digest(public_key);
    hex::encode(&digest[..20])
}

/// Generate a new Ed25519 keypair from the OS RNG.
pub fn generate_custodial_keypair() -> CustodialKeypair {
    let signing_key = SigningKey::generate(&mut OsRng);
    let public_key = signing_key.verifying_key().to_bytes();

    CustodialKeypair {
        address: address_for_public_key(&public_key),
        public_key: hex::encode(public_key),
        secret_key: hex::encode(signing_key.to_keypair_bytes()),
    }
}

/// Random hex string of `N` bytes from the OS RNG.
pub fn random_hex<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
