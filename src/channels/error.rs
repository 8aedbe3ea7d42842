// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Errors of the channel and identity core.

use crate::blockchain::EscrowError;
use crate::dialogue::DialogueError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Credential required")]
    Unauthenticated,

    #[error("Insufficient channel balance: {balance} available, {requested} requested")]
    InsufficientFunds { balance: u64, requested: u64 },

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EscrowError> for ChannelError {
    fn from(e: EscrowError) -> Self {
        match e {
            // Seeds come straight from request fields.
            EscrowError::Address(seed) => ChannelError::Validation(seed.to_string()),
            EscrowError::Encode(reason) => ChannelError::Internal(reason),
            other => ChannelError::Upstream(other.to_string()),
        }
    }
}

impl From<DialogueError> for ChannelError {
    fn from(e: DialogueError) -> Self {
        ChannelError::Upstream(e.to_string())
    }
}
