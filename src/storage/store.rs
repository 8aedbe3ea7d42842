// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Serialized access to the persisted collections.
//!
//! Two levels of locking:
//!
//! - a per-collection write lock held only for load-mutate-save, so two
//!   writers touching different records never lose each other's updates;
//! - a per-channel lock held across a whole operation on one channel
//!   (including escrow calls), so spend, close and sweep on the same record
//!   never interleave.
//!
//! Lock order is always channel lock first, then collection lock.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::repository::{ChannelLedger, ChannelMap, IdentityMap, IdentityRegistry};
use super::{AuditRepository, JsonStorage, StorageError};

/// Handle shared by every component that reads or writes the collections.
pub struct Store {
    storage: Arc<JsonStorage>,
    channels_write: Mutex<()>,
    identities_write: Mutex<()>,
    channel_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Store {
    pub fn new(storage: Arc<JsonStorage>) -> Self {
        Self {
            storage,
            channels_write: Mutex::new(()),
            identities_write: Mutex::new(()),
            channel_locks: DashMap::new(),
        }
    }

    pub fn storage(&self) -> &JsonStorage {
        &self.storage
    }

    pub fn audit(&self) -> AuditRepository<'_> {
        AuditRepository::new(&self.storage)
    }

    /// Snapshot of the channel ledger.
    pub fn channels(&self) -> ChannelMap {
        ChannelLedger::new(&self.storage).load()
    }

    /// Snapshot of the identity registry.
    pub fn identities(&self) -> IdentityMap {
        IdentityRegistry::new(&self.storage).load()
    }

    /// Acquire the operation lock for one channel.
    pub async fn lock_channel(&self, channel_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .channel_locks
            .entry(channel_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Drop lock entries nobody is holding or waiting on.
    pub fn prune_channel_locks(&self) {
        self.channel_locks
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Load, mutate and persist the channel ledger under its write lock.
    ///
    /// Nothing is written when `mutate` returns an error.
    pub async fn update_channels<R, E>(
        &self,
        mutate: impl FnOnce(&mut ChannelMap) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<StorageError>,
    {
        let _guard = self.channels_write.lock().await;
        let ledger = ChannelLedger::new(&self.storage);
        let mut channels = ledger.load();
        let result = mutate(&mut channels)?;
        ledger.save(&channels)?;
        Ok(result)
    }

    /// Load, mutate and persist the identity registry under its write lock.
    pub async fn update_identities<R, E>(
        &self,
        mutate: impl FnOnce(&mut IdentityMap) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<StorageError>,
    {
        let _guard = self.identities_write.lock().await;
        let registry = IdentityRegistry::new(&self.storage);
        let mut identities = registry.load();
        let result = mutate(&mut identities)?;
        registry.save(&identities)?;
        Ok(result)
    }
}
