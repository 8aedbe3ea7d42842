// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! RPC-backed escrow client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use tracing::info;

use super::accounts::decode_account;
use super::{
    AccountData, AccountKind, CloseChannelArgs, EscrowClient, EscrowError, EscrowProgram,
    EscrowReceipt, NpcKey, OpenChannelArgs,
};
use crate::blockchain::keys::pubkey_of;
use crate::blockchain::rpc::{RpcError, SolanaRpc};
use crate::blockchain::transaction::SignedTransaction;
use crate::blockchain::types::{Instruction, Pubkey};

/// Default bound on waiting for a submitted transaction to confirm.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(15);

/// Confirmation wait that fits inside an upstream call bound, leaving a
/// quarter of it for the blockhash fetch and the send.
pub fn confirm_timeout_within(upstream_timeout: Duration) -> Duration {
    upstream_timeout * 3 / 4
}

/// Signs escrow instructions with the service key and submits them.
pub struct SolanaEscrowClient {
    rpc: Arc<SolanaRpc>,
    signer: SigningKey,
    service_key: Pubkey,
    program: EscrowProgram,
    confirm_timeout: Duration,
}

impl SolanaEscrowClient {
    pub fn new(rpc: Arc<SolanaRpc>, signer: SigningKey, program_id: Pubkey) -> Self {
        let service_key = pubkey_of(&signer);
        Self {
            rpc,
            signer,
            service_key,
            program: EscrowProgram::new(program_id),
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    /// Compile, sign, send and confirm a single instruction.
    async fn submit(&self, name: &str, instruction: Instruction) -> Result<EscrowReceipt, EscrowError> {
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let transaction = SignedTransaction::sign(&[instruction], &self.signer, blockhash)?;

        let signature = self
            .rpc
            .send_transaction(&transaction.serialize())
            .await
            .map_err(reject_on_node_error)?;

        self.rpc
            .confirm_transaction(&signature, self.confirm_timeout)
            .await
            .map_err(reject_on_node_error)?;

        info!(instruction = name, signature = %signature, "Escrow transaction confirmed");
        Ok(EscrowReceipt { signature })
    }
}

/// Program-level failures are rejections; everything else stays transport.
fn reject_on_node_error(err: RpcError) -> EscrowError {
    match err {
        RpcError::Node { message, .. } => EscrowError::Rejected(message),
        RpcError::TransactionFailed { reason, .. } => EscrowError::Rejected(reason),
        other => EscrowError::Rpc(other),
    }
}

#[async_trait]
impl EscrowClient for SolanaEscrowClient {
    fn service_key(&self) -> Pubkey {
        self.service_key
    }

    fn program(&self) -> EscrowProgram {
        self.program
    }

    async fn open_channel(&self, args: OpenChannelArgs) -> Result<EscrowReceipt, EscrowError> {
        let ix = self.program.open_channel(
            &self.service_key,
            &args.counterparty,
            &args.channel_id,
            args.amount,
            &args.hashlock,
            args.timelock,
            &args.template_id,
        )?;
        self.submit("open_channel", ix).await
    }

    async fn close_channel(&self, args: CloseChannelArgs) -> Result<EscrowReceipt, EscrowError> {
        let ix = self.program.close_channel(
            &self.service_key,
            &self.service_key,
            &args.template_creator,
            &args.counterparty,
            &args.channel_id,
            &args.secret,
            args.final_balance,
        )?;
        self.submit("close_channel", ix).await
    }

    async fn create_template(
        &self,
        template_id: &str,
        name: &str,
        base_behavior: &str,
    ) -> Result<EscrowReceipt, EscrowError> {
        let ix = self
            .program
            .create_template(&self.service_key, template_id, name, base_behavior)?;
        self.submit("create_template", ix).await
    }

    async fn init_npc(&self, npc: &NpcKey, template_id: &str) -> Result<EscrowReceipt, EscrowError> {
        let ix = self.program.init_npc(&self.service_key, npc, template_id)?;
        self.submit("init_npc", ix).await
    }

    async fn fetch_account(
        &self,
        kind: AccountKind,
        address: &Pubkey,
    ) -> Result<Option<AccountData>, EscrowError> {
        match self.rpc.get_account_data(address).await? {
            Some(data) => decode_account(kind, &data).map(Some),
            None => Ok(None),
        }
    }
}
