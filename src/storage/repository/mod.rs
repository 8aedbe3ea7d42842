// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the JSON collections.
//!
//! Each repository loads and saves one whole collection; callers own the
//! load-mutate-save sequencing (see [`crate::storage::Store`]).

pub mod channels;
pub mod identities;

pub use channels::{contains_funding, ChannelLedger, ChannelMap, ChannelRecord, ChannelSecret};
pub use identities::{IdentityMap, IdentityRecord, IdentityRegistry};
