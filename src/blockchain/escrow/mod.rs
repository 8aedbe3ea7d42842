// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Escrow program client.
//!
//! The escrow program is the authoritative record of every channel; the
//! service only ever reaches it through [`EscrowClient`]. The production
//! implementation is [`SolanaEscrowClient`]; tests substitute fakes.

pub mod accounts;
pub mod client;
pub mod instruction;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_program::pubkey::PubkeyError;

use super::rpc::RpcError;
use super::transaction::TransactionError;
use super::types::{Instruction, Pubkey};

pub use accounts::{
    decode_account, AccountData, AccountKind, MemoryAccount, NpcStateAccount,
    PaymentChannelAccount, TemplateAccount,
};
pub use client::SolanaEscrowClient;
pub use instruction::{onchain_channel_id, EscrowProgram};

/// Errors from escrow calls.
#[derive(Debug, thiserror::Error)]
pub enum EscrowError {
    #[error("Invalid account seed: {0}")]
    Address(#[from] PubkeyError),

    #[error("Instruction encode failed: {0}")]
    Encode(String),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("Transaction build failed: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Escrow program rejected the call: {0}")]
    Rejected(String),

    #[error("Account decode failed: {0}")]
    Decode(String),
}

/// Identifies one NPC instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcKey {
    pub npc_id: String,
    pub game_id: String,
}

/// Arguments of `open_channel`. The service key is always the opener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenChannelArgs {
    pub channel_id: String,
    pub counterparty: Pubkey,
    pub amount: u64,
    pub hashlock: [u8; 32],
    pub timelock: u64,
    pub template_id: String,
}

/// Arguments of `close_channel`.
#[derive(Clone, PartialEq, Eq)]
pub struct CloseChannelArgs {
    pub channel_id: String,
    pub secret: String,
    pub final_balance: u64,
    pub template_creator: Pubkey,
    pub counterparty: Pubkey,
}

impl std::fmt::Debug for CloseChannelArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloseChannelArgs")
            .field("channel_id", &self.channel_id)
            .field("secret", &"[redacted]")
            .field("final_balance", &self.final_balance)
            .field("template_creator", &self.template_creator)
            .field("counterparty", &self.counterparty)
            .finish()
    }
}

/// Outcome of a submitted escrow transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscrowReceipt {
    pub signature: String,
}

#[async_trait]
pub trait EscrowClient: Send + Sync {
    /// Key that signs every submitted transaction.
    fn service_key(&self) -> Pubkey;

    fn program(&self) -> EscrowProgram;

    async fn open_channel(&self, args: OpenChannelArgs) -> Result<EscrowReceipt, EscrowError>;

    async fn close_channel(&self, args: CloseChannelArgs) -> Result<EscrowReceipt, EscrowError>;

    /// Build (not submit) the refund instruction for an expired channel.
    ///
    /// The program pays the refund to the counterparty and requires their
    /// signature, so the service cannot submit it on their behalf.
    fn claim_refund(&self, counterparty: &Pubkey, channel_id: &str) -> Result<Instruction, EscrowError> {
        self.program().claim_refund(counterparty, channel_id)
    }

    async fn create_template(
        &self,
        template_id: &str,
        name: &str,
        base_behavior: &str,
    ) -> Result<EscrowReceipt, EscrowError>;

    async fn init_npc(&self, npc: &NpcKey, template_id: &str) -> Result<EscrowReceipt, EscrowError>;

    /// Build (not submit) the instruction recording an NPC action.
    fn update_npc(
        &self,
        npc: &NpcKey,
        action: &str,
        dialogue: &str,
        behavior: &str,
    ) -> Result<Instruction, EscrowError> {
        self.program()
            .update_npc(&self.service_key(), npc, action, dialogue, behavior)
    }

    /// `Ok(None)` when the account does not exist.
    async fn fetch_account(
        &self,
        kind: AccountKind,
        address: &Pubkey,
    ) -> Result<Option<AccountData>, EscrowError>;

    async fn fetch_template(&self, template_id: &str) -> Result<Option<TemplateAccount>, EscrowError> {
        let address = self.program().template_address(template_id)?;
        match self.fetch_account(AccountKind::Template, &address).await? {
            Some(AccountData::Template(template)) => Ok(Some(template)),
            Some(_) => Err(EscrowError::Decode("expected a Template account".to_string())),
            None => Ok(None),
        }
    }

    async fn fetch_memory(&self, npc: &NpcKey) -> Result<Option<MemoryAccount>, EscrowError> {
        let address = self.program().memory_address(&self.service_key(), npc)?;
        match self.fetch_account(AccountKind::Memory, &address).await? {
            Some(AccountData::Memory(memory)) => Ok(Some(memory)),
            Some(_) => Err(EscrowError::Decode("expected a Memory account".to_string())),
            None => Ok(None),
        }
    }

    async fn fetch_npc_state(&self, npc: &NpcKey) -> Result<Option<NpcStateAccount>, EscrowError> {
        let address = self.program().state_address(&self.service_key(), npc)?;
        match self.fetch_account(AccountKind::NpcState, &address).await? {
            Some(AccountData::NpcState(state)) => Ok(Some(state)),
            Some(_) => Err(EscrowError::Decode("expected a State account".to_string())),
            None => Ok(None),
        }
    }
}
