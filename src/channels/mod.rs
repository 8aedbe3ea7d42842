// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Channel lifecycle manager and the NPC actions it pays for.

pub mod error;
pub mod manager;
pub mod npc;

pub use error::ChannelError;
pub use manager::{
    ChannelManager, ChannelSummary, CloseReceipt, FundingTransfer, SpendReceipt,
    CHANNEL_MAX_AGE_SECS, CHANNEL_TIMELOCK_SECS, SPEND_PER_ACTION,
};
pub use npc::{NpcActionRequest, NpcActionResult, NpcOutcome};
