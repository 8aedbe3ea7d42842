// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service keypair loading and wallet signature checks.
//!
//! The service key signs every escrow transaction and is the address the
//! watcher monitors for inbound transfers.

use ed25519_dalek::{Signature, SigningKey, Verifier, VerifyingKey};

use super::types::Pubkey;

/// Errors from key parsing and signature verification.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Invalid public key: {0}")]
    InvalidPubkey(String),

    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}

/// Parse a secret key as exported by common wallet tooling.
///
/// Accepts a JSON byte array (`[12, 34, ...]`) or a base58 string, holding
/// either the 64-byte keypair (secret || public) or the 32-byte seed.
pub fn load_keypair(raw: &str) -> Result<SigningKey, KeyError> {
    let raw = raw.trim();
    let bytes: Vec<u8> = if raw.starts_with('[') {
        serde_json::from_str(raw)
            .map_err(|e| KeyError::InvalidSecretKey(format!("Invalid JSON byte array: {e}")))?
    } else {
        bs58::decode(raw)
            .into_vec()
            .map_err(|e| KeyError::InvalidSecretKey(format!("Invalid base58: {e}")))?
    };

    match bytes.len() {
        64 => {
            let mut keypair = [0u8; 64];
            keypair.copy_from_slice(&bytes);
            SigningKey::from_keypair_bytes(&keypair)
                .map_err(|e| KeyError::InvalidSecretKey(format!("Keypair mismatch: {e}")))
        }
        32 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&bytes);
            Ok(SigningKey::from_bytes(&seed))
        }
        n => Err(KeyError::InvalidSecretKey(format!(
            "expected 32 or 64 bytes, got {n}"
        ))),
    }
}

/// Address of a signing key.
pub fn pubkey_of(key: &SigningKey) -> Pubkey {
    Pubkey::new_from_array(key.verifying_key().to_bytes())
}

/// Check a base58 ed25519 signature by `wallet` over `message`.
pub fn verify_wallet_signature(
    wallet: &Pubkey,
    message: &[u8],
    signature_b58: &str,
) -> Result<(), KeyError> {
    let verifying_key = VerifyingKey::from_bytes(&wallet.to_bytes())
        .map_err(|e| KeyError::InvalidPubkey(e.to_string()))?;

    let sig_bytes = bs58::decode(signature_b58.trim())
        .into_vec()
        .map_err(|e| KeyError::InvalidSignature(e.to_string()))?;
    let signature = Signature::from_slice(&sig_bytes)
        .map_err(|e| KeyError::InvalidSignature(e.to_string()))?;

    verifying_key
        .verify(message, &signature)
        .map_err(|e| KeyError::InvalidSignature(e.to_string()))
}
