// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state lives in plain JSON documents under `DATA_DIR`:
//!
//! ```text
//! {DATA_DIR}/
//!   identities.json          # identity registry
//!   channels.json            # channel ledger
//!   audit/
//!     {date}/events.jsonl    # daily audit logs
//! ```
//!
//! Both collections are small and rewritten whole on each mutation; all
//! mutations go through [`Store`] which serializes them.

pub mod audit;
pub mod json_fs;
pub mod paths;
pub mod repository;
pub mod store;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use json_fs::{JsonStorage, StorageError, StorageResult};
pub use paths::StoragePaths;
pub use repository::{
    ChannelLedger, ChannelMap, ChannelRecord, ChannelSecret, IdentityMap, IdentityRecord,
    IdentityRegistry,
};
pub use store::Store;
