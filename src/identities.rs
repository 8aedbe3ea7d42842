// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity registration and one-time credential delivery.
//!
//! A wallet is registered at most once. The plaintext credential exists
//! only in the response to an explicit registration, or, for identities
//! registered by the ledger watcher, in an in-memory outbox until the
//! wallet owner claims it with a signature. The outbox does not survive a
//! restart.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::info;

use crate::auth::credentials::{credential_tag, generate_credential, hash_credential};
use crate::blockchain::keys::verify_wallet_signature;
use crate::blockchain::Pubkey;
use crate::channels::ChannelError;
use crate::storage::repository::IdentityRecord;
use crate::storage::{AuditEvent, AuditEventType, Store};

/// Outcome of a register-if-absent call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// New identity; the only time this credential is handed out.
    Created { credential: String },
    Existing,
}

/// Message a wallet signs to register itself.
pub fn register_message(wallet: &Pubkey) -> String {
    format!("register:{wallet}")
}

/// Message a wallet signs to pick up its credential.
pub fn claim_message(wallet: &Pubkey) -> String {
    format!("claim-credential:{wallet}")
}

pub struct IdentityService {
    store: Arc<Store>,
    outbox: DashMap<String, String>,
}

impl IdentityService {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            outbox: DashMap::new(),
        }
    }

    /// Explicit registration by the holder of `wallet`'s key.
    ///
    /// `signature` is a base58 ed25519 signature over [`register_message`].
    pub async fn register(&self, wallet: &Pubkey, signature: &str) -> Result<Registration, ChannelError> {
        if let Err(e) = verify_wallet_signature(wallet, register_message(wallet).as_bytes(), signature) {
            let identity = wallet.to_string();
            self.store.audit().record(
                AuditEvent::new(AuditEventType::IdentityRegistered)
                    .with_identity(&identity)
                    .with_resource("identity", &identity)
                    .failed(e.to_string()),
            );
            return Err(ChannelError::Forbidden(format!(
                "Invalid registration signature: {e}"
            )));
        }
        self.register_if_absent(wallet).await
    }

    /// Register `wallet` unless it already has an identity.
    ///
    /// The existence check and the insert happen under the registry write
    /// lock, so concurrent calls for one wallet create a single record.
    pub async fn register_if_absent(&self, wallet: &Pubkey) -> Result<Registration, ChannelError> {
        let identity = wallet.to_string();
        if self.store.identities().contains_key(&identity) {
            return Ok(Registration::Existing);
        }

        let credential = generate_credential();
        let hash = {
            let credential = credential.clone();
            tokio::task::spawn_blocking(move || hash_credential(&credential))
                .await
                .map_err(|e| ChannelError::Internal(format!("credential hashing aborted: {e}")))?
                .map_err(|e| ChannelError::Internal(e.to_string()))?
        };

        let record = IdentityRecord {
            credential_hash: hash,
            credential_tag: Some(credential_tag(&credential)),
            created_at: Utc::now().timestamp(),
            wallet_address: identity.clone(),
        };

        let created = self
            .store
            .update_identities(|identities| {
                if identities.contains_key(&identity) {
                    return Ok::<_, ChannelError>(false);
                }
                identities.insert(identity.clone(), record);
                Ok(true)
            })
            .await?;

        if !created {
            return Ok(Registration::Existing);
        }

        info!(identity = %identity, "Identity registered");
        self.store.audit().record(
            AuditEvent::new(AuditEventType::IdentityRegistered)
                .with_identity(&identity)
                .with_resource("identity", &identity),
        );
        Ok(Registration::Created { credential })
    }

    /// Registration on first funding: the credential goes to the outbox.
    ///
    /// Returns true if a new identity was created.
    pub async fn auto_register(&self, wallet: &Pubkey) -> Result<bool, ChannelError> {
        match self.register_if_absent(wallet).await? {
            Registration::Created { credential } => {
                self.outbox.insert(wallet.to_string(), credential);
                Ok(true)
            }
            Registration::Existing => Ok(false),
        }
    }

    /// Hand out a pending credential to the holder of `wallet`'s key.
    ///
    /// `signature` is a base58 ed25519 signature over [`claim_message`].
    /// The entry is removed, so a credential can be claimed once.
    pub fn claim(&self, wallet: &Pubkey, signature: &str) -> Result<String, ChannelError> {
        let identity = wallet.to_string();
        let event = AuditEvent::new(AuditEventType::CredentialClaimed)
            .with_identity(&identity)
            .with_resource("identity", &identity);

        if let Err(e) = verify_wallet_signature(wallet, claim_message(wallet).as_bytes(), signature) {
            self.store.audit().record(event.failed(e.to_string()));
            return Err(ChannelError::Forbidden(format!("Invalid claim signature: {e}")));
        }

        let (_, credential) = self
            .outbox
            .remove(&identity)
            .ok_or_else(|| ChannelError::NotFound("Pending credential".to_string()))?;

        info!(identity = %identity, "Credential claimed");
        self.store.audit().record(event);
        Ok(credential)
    }

    pub fn has_pending(&self, wallet: &Pubkey) -> bool {
        self.outbox.contains_key(&wallet.to_string())
    }
}
