// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger Watcher
//!
//! Background task that turns inbound transfers to the service address
//! into registered identities and open channels.
//!
//! ## Strategy
//!
//! 1. Poll the current slot; do nothing until it moves past the last one
//!    seen.
//! 2. List recent signatures for the service address and skip those
//!    already bound to a channel, failed on-chain, or already known to be
//!    irrelevant.
//! 3. Fetch each remaining transaction and look for a system transfer to
//!    the service address. For a match: register the sender if new, then
//!    open a channel keyed by the signature.
//!
//! ## Idempotence
//!
//! The watcher keeps no checkpoint. Replaying a signature is harmless:
//! registration is register-if-absent and channel creation is gated on the
//! funding reference. A transfer whose processing failed is simply picked
//! up again on a later cycle.
//!
//! Cycles never overlap: the loop runs one cycle to completion before it
//! polls the slot again.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio_util::sync::CancellationToken;

use crate::blockchain::rpc::{ParsedTransaction, RpcError, SignatureInfo, SolanaRpc};
use crate::blockchain::{Pubkey, SYSTEM_PROGRAM_ID};
use crate::channels::{ChannelManager, FundingTransfer};
use crate::identities::IdentityService;
use crate::storage::repository::contains_funding;

/// Default slot poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Signatures requested per cycle.
const SIGNATURE_LIMIT: usize = 100;

/// Irrelevant signatures remembered between cycles.
const NOISE_CACHE_SIZE: usize = 4096;

/// Read access to the ledger, as needed by the watcher.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    async fn current_slot(&self) -> Result<u64, RpcError>;

    /// Most recent signatures involving `address`, newest first.
    async fn recent_signatures(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, RpcError>;

    /// `Ok(None)` when the transaction is not (yet) available.
    async fn transaction(&self, signature: &str) -> Result<Option<ParsedTransaction>, RpcError>;
}

#[async_trait]
impl LedgerSource for SolanaRpc {
    async fn current_slot(&self) -> Result<u64, RpcError> {
        self.get_slot().await
    }

    async fn recent_signatures(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, RpcError> {
        self.get_signatures_for_address(address, limit).await
    }

    async fn transaction(&self, signature: &str) -> Result<Option<ParsedTransaction>, RpcError> {
        self.get_transaction(signature).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("Ledger read failed: {0}")]
    Rpc(#[from] RpcError),
}

/// Counters for one processing cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub signatures: usize,
    pub opened: usize,
    pub registered: usize,
    pub failed: usize,
}

/// Extract a qualifying funding transfer from a parsed transaction.
///
/// Qualifies when the transaction succeeded and carries a top-level system
/// program `transfer` of a non-zero amount whose destination is `service`.
/// The sender is the fee payer.
pub fn find_funding_transfer(
    signature: &str,
    tx: &ParsedTransaction,
    service: &Pubkey,
) -> Option<FundingTransfer> {
    if tx.meta.as_ref().is_some_and(|meta| meta.err.is_some()) {
        return None;
    }

    let system_program = SYSTEM_PROGRAM_ID.to_string();
    let service = service.to_string();

    let lamports = tx
        .transaction
        .message
        .instructions
        .iter()
        .filter(|ix| ix.program_id == system_program)
        .filter_map(|ix| ix.parsed.as_ref())
        .filter(|parsed| parsed["type"] == "transfer")
        .filter(|parsed| parsed["info"]["destination"].as_str() == Some(service.as_str()))
        .find_map(|parsed| parsed["info"]["lamports"].as_u64())?;

    if lamports == 0 {
        return None;
    }

    let sender = tx
        .transaction
        .message
        .account_keys
        .first()?
        .pubkey
        .parse()
        .ok()?;

    Some(FundingTransfer {
        signature: signature.to_string(),
        sender,
        lamports,
    })
}

/// Ledger watcher that runs as a background tokio task.
pub struct LedgerWatcher {
    ledger: Arc<dyn LedgerSource>,
    manager: Arc<ChannelManager>,
    identities: Arc<IdentityService>,
    service: Pubkey,
    template_id: String,
    poll_interval: Duration,
    last_slot: Option<u64>,
    noise: LruCache<String, ()>,
}

impl LedgerWatcher {
    pub fn new(
        ledger: Arc<dyn LedgerSource>,
        manager: Arc<ChannelManager>,
        identities: Arc<IdentityService>,
        template_id: impl Into<String>,
    ) -> Self {
        let service = manager.escrow().service_key();
        let capacity = NonZeroUsize::new(NOISE_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            ledger,
            manager,
            identities,
            service,
            template_id: template_id.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            last_slot: None,
            noise: LruCache::new(capacity),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run the watcher loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(watcher.run(shutdown.clone()));
    /// ```
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(
            service = %self.service,
            template_id = %self.template_id,
            poll_ms = self.poll_interval.as_millis() as u64,
            "Ledger watcher starting"
        );

        loop {
            if shutdown.is_cancelled() {
                tracing::info!("Ledger watcher shutting down");
                return;
            }

            if let Err(e) = self.tick().await {
                tracing::warn!(error = %e, "Watcher cycle failed, will retry");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = shutdown.cancelled() => {
                    tracing::info!("Ledger watcher shutting down");
                    return;
                }
            }
        }
    }

    /// Poll the slot and run a cycle if it advanced.
    ///
    /// Returns `None` when the slot did not move.
    pub async fn tick(&mut self) -> Result<Option<CycleReport>, WatcherError> {
        let slot = self.ledger.current_slot().await?;
        if self.last_slot.is_some_and(|last| slot <= last) {
            return Ok(None);
        }
        self.last_slot = Some(slot);

        let report = self.process_cycle().await?;
        if report.opened > 0 || report.failed > 0 {
            tracing::info!(
                slot,
                signatures = report.signatures,
                opened = report.opened,
                registered = report.registered,
                failed = report.failed,
                "Watcher cycle complete"
            );
        } else {
            tracing::debug!(slot, signatures = report.signatures, "Watcher cycle complete");
        }
        Ok(Some(report))
    }

    /// Inspect recent signatures for the service address, oldest first.
    pub async fn process_cycle(&mut self) -> Result<CycleReport, WatcherError> {
        let mut signatures = self
            .ledger
            .recent_signatures(&self.service, SIGNATURE_LIMIT)
            .await?;
        signatures.reverse();

        let channels = self.manager.store().channels();
        let mut report = CycleReport {
            signatures: signatures.len(),
            ..CycleReport::default()
        };

        for info in signatures {
            let signature = info.signature;
            if contains_funding(&channels, &signature) || self.noise.contains(&signature) {
                continue;
            }
            if info.err.is_some() {
                self.noise.put(signature, ());
                continue;
            }

            let Some(tx) = self.ledger.transaction(&signature).await? else {
                continue;
            };

            let Some(transfer) = find_funding_transfer(&signature, &tx, &self.service) else {
                self.noise.put(signature, ());
                continue;
            };

            self.consume(&transfer, &mut report).await;
        }

        Ok(report)
    }

    /// Register the sender and open the channel. Failures leave the
    /// transfer unconsumed.
    async fn consume(&self, transfer: &FundingTransfer, report: &mut CycleReport) {
        match self.identities.auto_register(&transfer.sender).await {
            Ok(true) => {
                report.registered += 1;
                tracing::info!(identity = %transfer.sender, "Auto-registered identity from funding transfer");
            }
            Ok(false) => {}
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    signature = %transfer.signature,
                    identity = %transfer.sender,
                    error = %e,
                    "Auto-registration failed"
                );
                return;
            }
        }

        match self.manager.open_funded(transfer, &self.template_id).await {
            Ok(Some(_)) => report.opened += 1,
            Ok(None) => {}
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    signature = %transfer.signature,
                    error = %e,
                    "Failed to open channel for funding transfer"
                );
            }
        }
    }
}
