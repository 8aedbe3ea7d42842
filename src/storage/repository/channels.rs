// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Channel ledger: the local cache of open escrow channels.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/channels.json   # { "<channel id>": ChannelRecord, ... }
//! ```
//!
//! The whole document is loaded and rewritten on every mutation. The
//! channel id is the signature of the funding transaction, so it doubles as
//! the funding reference.

use std::collections::BTreeMap;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::super::{JsonStorage, StorageError, StorageResult};

/// All channel records keyed by channel id.
pub type ChannelMap = BTreeMap<String, ChannelRecord>;

/// Clear-text channel secret.
///
/// Kept server-side until the channel is closed; the escrow program only
/// ever sees its SHA-256 digest until settlement reveals it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelSecret(String);

impl ChannelSecret {
    /// Fresh 32-byte random secret, hex encoded.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// The hashlock committed on-chain: `sha256(secret)` over the hex string.
    pub fn hashlock(&self) -> [u8; 32] {
        Sha256::digest(self.0.as_bytes()).into()
    }

    /// Hex form of [`hashlock`](Self::hashlock), as stored in the record.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hashlock())
    }

    /// Expose the clear secret. Only settlement paths should call this.
    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ChannelSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChannelSecret([redacted])")
    }
}

impl From<&str> for ChannelSecret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A channel record as persisted in `channels.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Identity allowed to spend from and close this channel.
    pub counterparty: String,
    /// Remaining spendable balance (lamports).
    pub balance: u64,
    /// Amount locked when the channel was opened.
    pub funded_amount: u64,
    /// Clear secret, never returned to callers before close.
    pub secret: ChannelSecret,
    /// Hex `sha256(secret)`; the on-chain hashlock.
    pub secret_hash: String,
    /// Incremented on every successful spend.
    pub nonce: u64,
    /// Template the channel was opened against.
    pub template_id: String,
    /// Open time, seconds since epoch.
    pub created_at: i64,
    /// On-chain timelock, seconds since epoch.
    pub expires_at: i64,
    /// Signature of the funding transfer.
    pub funding_reference: String,
    /// Persisted before `open_channel` is submitted and cleared once the
    /// escrow account exists. A pending record only keeps the secret.
    #[serde(default)]
    pub pending: bool,
}

impl ChannelRecord {
    /// A confirmed channel that can be spent, closed and swept.
    pub fn is_open(&self) -> bool {
        !self.pending
    }

    /// Seconds elapsed since the channel was opened.
    pub fn age_at(&self, now: i64) -> i64 {
        now.saturating_sub(self.created_at)
    }
}

/// True if an open record is keyed by, or was funded by, `signature`.
///
/// Pending records do not count: their transfer is still being consumed.
pub fn contains_funding(channels: &ChannelMap, signature: &str) -> bool {
    channels.iter().any(|(id, record)| {
        record.is_open() && (id == signature || record.funding_reference == signature)
    })
}

/// Repository over the channel ledger document.
pub struct ChannelLedger<'a> {
    storage: &'a JsonStorage,
}

impl<'a> ChannelLedger<'a> {
    /// Create a new ChannelLedger.
    pub fn new(storage: &'a JsonStorage) -> Self {
        Self { storage }
    }

    /// Load the full collection.
    ///
    /// A missing or unreadable document yields an empty map: a cold start
    /// is not an error.
    pub fn load(&self) -> ChannelMap {
        let path = self.storage.paths().channels_file();
        match self.storage.read_json(&path) {
            Ok(channels) => channels,
            Err(StorageError::NotFound(_)) => ChannelMap::new(),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "Channel ledger unreadable, starting empty");
                ChannelMap::new()
            }
        }
    }

    /// Replace the persisted collection.
    pub fn save(&self, channels: &ChannelMap) -> StorageResult<()> {
        self.storage
            .write_json(self.storage.paths().channels_file(), channels)
    }

    /// Convenience lookup over a fresh load.
    pub fn get(&self, channel_id: &str) -> Option<ChannelRecord> {
        self.load().remove(channel_id)
    }
}
