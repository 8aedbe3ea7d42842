// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger integration.
//!
//! This module provides functionality for:
//! - Talking to the ledger node over JSON-RPC
//! - Building, signing and submitting escrow program transactions
//! - Deriving program addresses and decoding escrow accounts

pub mod escrow;
pub mod keys;
pub mod rpc;
pub mod transaction;
pub mod types;

pub use escrow::{EscrowClient, EscrowError, SolanaEscrowClient};
pub use keys::KeyError;
pub use rpc::{RpcError, SolanaRpc};
pub use types::{ClientAccountMeta, ClientInstruction, Instruction, Pubkey, SYSTEM_PROGRAM_ID};
