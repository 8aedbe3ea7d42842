// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decoders for the escrow program's account layouts.
//!
//! Every account starts with an 8-byte discriminator,
//! `sha256("account:<Name>")[..8]`, followed by Borsh fields.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::EscrowError;
use crate::blockchain::types::{serialize_pubkey, Pubkey};

/// Which account layout to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Template,
    Memory,
    NpcState,
    PaymentChannel,
}

impl AccountKind {
    /// Account struct name as declared by the program.
    pub fn type_name(self) -> &'static str {
        match self {
            AccountKind::Template => "Template",
            AccountKind::Memory => "Memory",
            AccountKind::NpcState => "State",
            AccountKind::PaymentChannel => "PaymentChannel",
        }
    }

    pub fn discriminator(self) -> [u8; 8] {
        account_discriminator(self.type_name())
    }
}

pub fn account_discriminator(type_name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("account:{type_name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema, BorshSerialize, BorshDeserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateAccount {
    #[serde(serialize_with = "serialize_pubkey")]
    #[schema(value_type = String)]
    pub creator: Pubkey,
    pub name: String,
    pub base_behavior: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema, BorshSerialize, BorshDeserialize)]
pub struct MemoryAccount {
    /// Comma-separated `action@timestamp` history.
    pub data: String,
}

/// NPC dialogue/behavior state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema, BorshSerialize, BorshDeserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcStateAccount {
    #[serde(serialize_with = "serialize_pubkey")]
    #[schema(value_type = String)]
    pub creator: Pubkey,
    pub npc_id: String,
    pub game_id: String,
    pub dialogue: String,
    pub behavior: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema, BorshSerialize, BorshDeserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentChannelAccount {
    #[serde(serialize_with = "serialize_pubkey")]
    #[schema(value_type = String)]
    pub owner: Pubkey,
    #[serde(serialize_with = "serialize_pubkey")]
    #[schema(value_type = String)]
    pub counter_party: Pubkey,
    pub balance: u64,
    #[serde(serialize_with = "serialize_hex")]
    #[schema(value_type = String)]
    pub hashlock: [u8; 32],
    pub timelock: u64,
    #[serde(serialize_with = "serialize_pubkey")]
    #[schema(value_type = String)]
    pub template_creator: Pubkey,
}

fn serialize_hex<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

/// A decoded escrow account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountData {
    Template(TemplateAccount),
    Memory(MemoryAccount),
    NpcState(NpcStateAccount),
    PaymentChannel(PaymentChannelAccount),
}

fn decode_body<T: BorshDeserialize>(kind: AccountKind, mut body: &[u8]) -> Result<T, EscrowError> {
    // Trailing bytes (bump, realloc padding) are left unread.
    T::deserialize(&mut body)
        .map_err(|e| EscrowError::Decode(format!("{} account: {e}", kind.type_name())))
}

/// Decode raw account bytes as `kind`, checking the discriminator.
pub fn decode_account(kind: AccountKind, data: &[u8]) -> Result<AccountData, EscrowError> {
    let (discriminator, body) = data
        .split_at_checked(8)
        .ok_or_else(|| EscrowError::Decode("account shorter than its discriminator".to_string()))?;
    if discriminator != kind.discriminator() {
        return Err(EscrowError::Decode(format!(
            "account is not a {}",
            kind.type_name()
        )));
    }

    let decoded = match kind {
        AccountKind::Template => AccountData::Template(decode_body(kind, body)?),
        AccountKind::Memory => AccountData::Memory(decode_body(kind, body)?),
        AccountKind::NpcState => AccountData::NpcState(decode_body(kind, body)?),
        AccountKind::PaymentChannel => AccountData::PaymentChannel(decode_body(kind, body)?),
    };
    Ok(decoded)
}
