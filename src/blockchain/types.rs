// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger primitive types and constants.

use base64ct::{Base64, Encoding};
use serde::{Serialize, Serializer};
use utoipa::ToSchema;

pub use solana_program::instruction::{AccountMeta, Instruction};
pub use solana_program::pubkey::Pubkey;

/// Lamports per native unit.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// The system program, `11111111111111111111111111111111`.
pub const SYSTEM_PROGRAM_ID: Pubkey = solana_program::system_program::ID;

/// Serialize a key as its base58 string.
pub fn serialize_pubkey<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(key)
}

/// One account reference of a [`ClientInstruction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientAccountMeta {
    #[serde(serialize_with = "serialize_pubkey")]
    #[schema(value_type = String)]
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

/// An instruction as handed to a client for signing and submission:
/// base58 keys and base64 `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientInstruction {
    #[serde(serialize_with = "serialize_pubkey")]
    #[schema(value_type = String)]
    pub program_id: Pubkey,
    pub accounts: Vec<ClientAccountMeta>,
    #[serde(serialize_with = "serialize_base64")]
    #[schema(value_type = String, format = Byte)]
    pub data: Vec<u8>,
}

impl From<Instruction> for ClientInstruction {
    fn from(ix: Instruction) -> Self {
        Self {
            program_id: ix.program_id,
            accounts: ix
                .accounts
                .into_iter()
                .map(|meta| ClientAccountMeta {
                    pubkey: meta.pubkey,
                    is_signer: meta.is_signer,
                    is_writable: meta.is_writable,
                })
                .collect(),
            data: ix.data,
        }
    }
}

fn serialize_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&Base64::encode_string(data))
}
