// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential verification against the identity registry.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use super::credentials::{credential_tag, verify_credential};
use super::AuthError;
use crate::storage::repository::IdentityRecord;
use crate::storage::Store;

/// Identity bound to a request after authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AuthenticatedIdentity {
    /// Wallet address; also the identity key.
    pub wallet: String,
}

/// Resolves a presented credential to a registered identity.
#[derive(Clone)]
pub struct AccessGate {
    store: Arc<Store>,
}

impl AccessGate {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Resolve `credential` to its identity.
    ///
    /// Candidates whose lookup tag matches are checked first, then records
    /// without a tag. Each Argon2 check runs to completion before the next
    /// candidate is tried; failure is only reported once every candidate
    /// has been rejected.
    pub async fn authenticate(
        &self,
        credential: Option<&str>,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let credential = match credential.map(str::trim) {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => return Err(AuthError::MissingCredential),
        };

        let tag = credential_tag(&credential);
        let identities = self.store.identities();

        let tagged = identities
            .iter()
            .filter(|(_, record)| record.credential_tag.as_deref() == Some(tag.as_str()));
        let untagged = identities
            .iter()
            .filter(|(_, record)| record.credential_tag.is_none());

        for (identity, record) in tagged.chain(untagged) {
            if self.matches(&credential, identity, record).await? {
                return Ok(AuthenticatedIdentity {
                    wallet: identity.clone(),
                });
            }
        }

        Err(AuthError::InvalidCredential)
    }

    async fn matches(
        &self,
        credential: &str,
        identity: &str,
        record: &IdentityRecord,
    ) -> Result<bool, AuthError> {
        let credential = credential.to_string();
        let hash = record.credential_hash.clone();

        let verified = tokio::task::spawn_blocking(move || verify_credential(&credential, &hash))
            .await
            .map_err(|e| AuthError::InternalError(format!("credential check aborted: {e}")))?;

        match verified {
            Ok(matched) => Ok(matched),
            Err(e) => {
                warn!(identity = %identity, error = %e, "Skipping identity with unreadable credential hash");
                Ok(false)
            }
        }
    }
}
