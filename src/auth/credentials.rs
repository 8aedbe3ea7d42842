// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access credential issuing and hashing.
//!
//! Credentials are random UUIDs handed to the registrant once. Only an
//! Argon2id PHC string is stored, plus a short tag used to narrow the
//! candidate set before the (slow) Argon2 verification.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Credential hashing failed: {0}")]
    Hash(String),

    #[error("Stored credential hash is malformed: {0}")]
    MalformedHash(String),
}

/// Fresh random credential.
pub fn generate_credential() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Argon2id PHC string for `credential`.
pub fn hash_credential(credential: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(credential.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hash(e.to_string()))
}

/// Check `credential` against a stored PHC string.
pub fn verify_credential(credential: &str, stored_hash: &str) -> Result<bool, CredentialError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| CredentialError::MalformedHash(e.to_string()))?;

    match Argon2::default().verify_password(credential.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CredentialError::MalformedHash(e.to_string())),
    }
}

/// Lookup tag: hex of the first 8 bytes of `sha256(credential)`.
///
/// Not reversible and too short to brute-force a UUID from; it only picks
/// which records to run Argon2 against.
pub fn credential_tag(credential: &str) -> String {
    let digest = Sha256::digest(credential.as_bytes());
    hex::encode(&digest[..8])
}
