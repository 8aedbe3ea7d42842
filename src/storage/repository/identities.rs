// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity registry: wallet address -> hashed access credential.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/identities.json   # { "<wallet address>": IdentityRecord, ... }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::super::{JsonStorage, StorageError, StorageResult};

/// All identity records keyed by wallet address.
pub type IdentityMap = BTreeMap<String, IdentityRecord>;

/// An identity as persisted in `identities.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Argon2 PHC string of the access credential.
    pub credential_hash: String,
    /// Short non-reversible lookup tag derived from the credential.
    #[serde(default)]
    pub credential_tag: Option<String>,
    /// Registration time, seconds since epoch.
    pub created_at: i64,
    /// Wallet address; equal to the registry key and never changed.
    pub wallet_address: String,
}

/// Repository over the identity registry document.
pub struct IdentityRegistry<'a> {
    storage: &'a JsonStorage,
}

impl<'a> IdentityRegistry<'a> {
    /// Create a new IdentityRegistry.
    pub fn new(storage: &'a JsonStorage) -> Self {
        Self { storage }
    }

    /// Load the full collection; missing or unreadable yields empty.
    pub fn load(&self) -> IdentityMap {
        let path = self.storage.paths().identities_file();
        match self.storage.read_json(&path) {
            Ok(identities) => identities,
            Err(StorageError::NotFound(_)) => IdentityMap::new(),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "Identity registry unreadable, starting empty");
                IdentityMap::new()
            }
        }
    }

    /// Replace the persisted collection.
    pub fn save(&self, identities: &IdentityMap) -> StorageResult<()> {
        self.storage
            .write_json(self.storage.paths().identities_file(), identities)
    }

    /// Check if an identity exists.
    pub fn exists(&self, identity: &str) -> bool {
        self.load().contains_key(identity)
    }
}
