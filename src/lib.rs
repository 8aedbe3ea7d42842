// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! NPC Channel Server - payment-channel bookkeeping for an on-chain escrow
//!
//! Funding transfers seen on the ledger open hashed time-locked channels in
//! an escrow program. NPC actions are paid for by debiting a channel
//! off-chain, and channels are settled on-chain when their owner closes them
//! or when they expire.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - API-key authentication (Argon2 credential hashes)
//! - `blockchain` - Ledger RPC and escrow program client
//! - `channels` - Channel lifecycle: open, spend, close, settle
//! - `dialogue` - NPC dialogue generation
//! - `identities` - Identity registration and credential pickup
//! - `storage` - JSON document storage and audit trail
//! - `sweeper` - Scheduled settlement of expired channels
//! - `watcher` - Ledger watcher that opens channels for funding transfers

pub mod api;
pub mod auth;
pub mod blockchain;
pub mod channels;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod identities;
pub mod models;
pub mod state;
pub mod storage;
pub mod sweeper;
pub mod watcher;

#[cfg(test)]
mod test_support;
