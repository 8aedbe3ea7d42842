// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed instruction builders for the escrow program.
//!
//! Each builder takes exactly the arguments its instruction declares and
//! lays out the accounts in the order the program expects. Instruction data
//! is `sha256("global:<name>")[..8]` followed by Borsh-encoded arguments.

use borsh::BorshSerialize;
use sha2::{Digest, Sha256};
use solana_program::pubkey::{PubkeyError, MAX_SEED_LEN};

use super::{EscrowError, NpcKey};
use crate::blockchain::types::{AccountMeta, Instruction, Pubkey, SYSTEM_PROGRAM_ID};

pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("global:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

/// Channel id as used in on-chain seeds.
///
/// Seeds cap at 32 bytes while funding signatures are ~88 characters, so the
/// program only ever sees the first 32.
pub fn onchain_channel_id(channel_id: &str) -> &str {
    match channel_id.char_indices().nth(MAX_SEED_LEN) {
        Some((idx, _)) => &channel_id[..idx],
        None => channel_id,
    }
}

#[derive(BorshSerialize)]
struct CreateTemplateData<'a> {
    template_id: &'a str,
    name: &'a str,
    base_behavior: &'a str,
}

#[derive(BorshSerialize)]
struct InitNpcData<'a> {
    npc_id: &'a str,
    game_id: &'a str,
    template_id: &'a str,
}

#[derive(BorshSerialize)]
struct UpdateNpcData<'a> {
    action: &'a str,
    dialogue: &'a str,
    behavior: &'a str,
}

#[derive(BorshSerialize)]
struct OpenChannelData<'a> {
    channel_id: &'a str,
    amount: u64,
    hashlock: [u8; 32],
    timelock: u64,
    template_id: &'a str,
}

#[derive(BorshSerialize)]
struct CloseChannelData<'a> {
    channel_id: &'a str,
    secret: &'a str,
    final_balance: u64,
}

#[derive(BorshSerialize)]
struct ClaimRefundData<'a> {
    channel_id: &'a str,
}

/// Discriminator followed by the Borsh-encoded arguments.
fn encode_args<T: BorshSerialize>(name: &str, args: &T) -> Result<Vec<u8>, EscrowError> {
    let mut data = instruction_discriminator(name).to_vec();
    args.serialize(&mut data)
        .map_err(|e| EscrowError::Encode(e.to_string()))?;
    Ok(data)
}

/// Address derivation and instruction building for one deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowProgram {
    program_id: Pubkey,
}

impl EscrowProgram {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    fn derive(&self, seeds: &[&[u8]]) -> Result<Pubkey, EscrowError> {
        if seeds.iter().any(|seed| seed.len() > MAX_SEED_LEN) {
            return Err(PubkeyError::MaxSeedLengthExceeded.into());
        }
        Pubkey::try_find_program_address(seeds, &self.program_id)
            .map(|(address, _bump)| address)
            .ok_or(EscrowError::Address(PubkeyError::InvalidSeeds))
    }

    pub fn template_address(&self, template_id: &str) -> Result<Pubkey, EscrowError> {
        self.derive(&[b"template", template_id.as_bytes()])
    }

    pub fn channel_address(&self, owner: &Pubkey, channel_id: &str) -> Result<Pubkey, EscrowError> {
        self.derive(&[
            b"channel",
            owner.as_ref(),
            onchain_channel_id(channel_id).as_bytes(),
        ])
    }

    pub fn memory_address(&self, creator: &Pubkey, npc: &NpcKey) -> Result<Pubkey, EscrowError> {
        self.derive(&[
            b"memory",
            creator.as_ref(),
            npc.npc_id.as_bytes(),
            npc.game_id.as_bytes(),
        ])
    }

    pub fn state_address(&self, creator: &Pubkey, npc: &NpcKey) -> Result<Pubkey, EscrowError> {
        self.derive(&[
            b"state",
            creator.as_ref(),
            npc.npc_id.as_bytes(),
            npc.game_id.as_bytes(),
        ])
    }

    fn instruction(&self, accounts: Vec<AccountMeta>, data: Vec<u8>) -> Instruction {
        Instruction::new_with_bytes(self.program_id, &data, accounts)
    }

    pub fn create_template(
        &self,
        caller: &Pubkey,
        template_id: &str,
        name: &str,
        base_behavior: &str,
    ) -> Result<Instruction, EscrowError> {
        let accounts = vec![
            AccountMeta::new(self.template_address(template_id)?, false),
            AccountMeta::new(*caller, true),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ];
        let data = encode_args(
            "create_template",
            &CreateTemplateData {
                template_id,
                name,
                base_behavior,
            },
        )?;
        Ok(self.instruction(accounts, data))
    }

    pub fn init_npc(
        &self,
        caller: &Pubkey,
        npc: &NpcKey,
        template_id: &str,
    ) -> Result<Instruction, EscrowError> {
        let accounts = vec![
            AccountMeta::new(self.memory_address(caller, npc)?, false),
            AccountMeta::new(self.state_address(caller, npc)?, false),
            AccountMeta::new_readonly(self.template_address(template_id)?, false),
            AccountMeta::new(*caller, true),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ];
        let data = encode_args(
            "init_npc",
            &InitNpcData {
                npc_id: &npc.npc_id,
                game_id: &npc.game_id,
                template_id,
            },
        )?;
        Ok(self.instruction(accounts, data))
    }

    pub fn update_npc(
        &self,
        caller: &Pubkey,
        npc: &NpcKey,
        action: &str,
        dialogue: &str,
        behavior: &str,
    ) -> Result<Instruction, EscrowError> {
        let accounts = vec![
            AccountMeta::new(self.memory_address(caller, npc)?, false),
            AccountMeta::new(self.state_address(caller, npc)?, false),
            AccountMeta::new_readonly(*caller, true),
        ];
        let data = encode_args(
            "update_npc",
            &UpdateNpcData {
                action,
                dialogue,
                behavior,
            },
        )?;
        Ok(self.instruction(accounts, data))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn open_channel(
        &self,
        caller: &Pubkey,
        counterparty: &Pubkey,
        channel_id: &str,
        amount: u64,
        hashlock: &[u8; 32],
        timelock: u64,
        template_id: &str,
    ) -> Result<Instruction, EscrowError> {
        let accounts = vec![
            AccountMeta::new(self.channel_address(caller, channel_id)?, false),
            AccountMeta::new(*caller, true),
            AccountMeta::new(*counterparty, false),
            AccountMeta::new_readonly(self.template_address(template_id)?, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ];
        let data = encode_args(
            "open_channel",
            &OpenChannelData {
                channel_id: onchain_channel_id(channel_id),
                amount,
                hashlock: *hashlock,
                timelock,
                template_id,
            },
        )?;
        Ok(self.instruction(accounts, data))
    }

    /// `owner` is the key that opened the channel; it seeds the address and
    /// receives the fee share.
    #[allow(clippy::too_many_arguments)]
    pub fn close_channel(
        &self,
        caller: &Pubkey,
        owner: &Pubkey,
        template_creator: &Pubkey,
        counterparty: &Pubkey,
        channel_id: &str,
        secret: &str,
        final_balance: u64,
    ) -> Result<Instruction, EscrowError> {
        let accounts = vec![
            AccountMeta::new(self.channel_address(owner, channel_id)?, false),
            AccountMeta::new(*caller, true),
            AccountMeta::new(*template_creator, false),
            AccountMeta::new(*owner, false),
            AccountMeta::new(*counterparty, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ];
        let data = encode_args(
            "close_channel",
            &CloseChannelData {
                channel_id: onchain_channel_id(channel_id),
                secret,
                final_balance,
            },
        )?;
        Ok(self.instruction(accounts, data))
    }

    /// Refunds go to the channel's counterparty, who must sign. The program
    /// seeds the channel address with the signing key.
    pub fn claim_refund(
        &self,
        counterparty: &Pubkey,
        channel_id: &str,
    ) -> Result<Instruction, EscrowError> {
        let accounts = vec![
            AccountMeta::new(self.channel_address(counterparty, channel_id)?, false),
            AccountMeta::new(*counterparty, true),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ];
        let data = encode_args(
            "claim_refund",
            &ClaimRefundData {
                channel_id: onchain_channel_id(channel_id),
            },
        )?;
        Ok(self.instruction(accounts, data))
    }
}
