// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Expiry Sweeper
//!
//! Settles every channel older than [`CHANNEL_MAX_AGE_SECS`] on-chain and
//! drops it from the ledger.
//!
//! Runs once at startup, then at 00:00, 08:00 and 16:00 UTC. Each due
//! channel is settled under its channel lock, re-checked against a fresh
//! load first so a channel closed by its counterparty in the meantime is
//! skipped. Settled ids are removed in a single ledger write at the end of
//! the pass, while their locks are still held. A channel whose settlement
//! failed stays and is retried on the next pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use serde_json::json;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;

use crate::channels::{ChannelError, ChannelManager, CHANNEL_MAX_AGE_SECS};
use crate::storage::repository::ChannelRecord;
use crate::storage::{AuditEvent, AuditEventType};

/// Spacing of the wall-clock schedule.
pub const SWEEP_INTERVAL_HOURS: i64 = 8;

/// Outcome of one sweep pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub due: usize,
    pub settled: Vec<String>,
    pub failed: Vec<String>,
}

/// Next scheduled run strictly after `now`, on the 8-hour UTC grid.
pub fn next_run_after(now: DateTime<Utc>) -> DateTime<Utc> {
    let step = ChronoDuration::hours(SWEEP_INTERVAL_HOURS);
    let aligned = now.duration_trunc(step).unwrap_or(now);
    aligned + step
}

pub struct ExpirySweeper {
    manager: Arc<ChannelManager>,
}

impl ExpirySweeper {
    pub fn new(manager: Arc<ChannelManager>) -> Self {
        Self { manager }
    }

    /// Run one pass now, then on schedule until cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            max_age_secs = CHANNEL_MAX_AGE_SECS,
            "Expiry sweeper starting"
        );

        loop {
            self.sweep_now().await;

            let now = Utc::now();
            let next = next_run_after(now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tracing::debug!(next_run = %next, "Next channel sweep scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {},
                _ = shutdown.cancelled() => {
                    tracing::info!("Expiry sweeper shutting down");
                    return;
                }
            }
        }
    }

    async fn sweep_now(&self) -> SweepReport {
        let report = self.sweep_at(Utc::now().timestamp()).await;
        if report.due > 0 {
            tracing::info!(
                due = report.due,
                settled = report.settled.len(),
                failed = report.failed.len(),
                "Channel sweep complete"
            );
        }
        report
    }

    /// Settle every channel whose age at `now` is at least the maximum.
    pub async fn sweep_at(&self, now: i64) -> SweepReport {
        let store = self.manager.store().clone();
        let due: Vec<String> = store
            .channels()
            .iter()
            .filter(|(_, record)| {
                record.is_open() && record.age_at(now) >= CHANNEL_MAX_AGE_SECS
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut report = SweepReport {
            due: due.len(),
            ..SweepReport::default()
        };
        let mut held: Vec<OwnedMutexGuard<()>> = Vec::new();

        for channel_id in due {
            let guard = store.lock_channel(&channel_id).await;

            let Some(record) = store
                .channels()
                .remove(&channel_id)
                .filter(ChannelRecord::is_open)
            else {
                continue;
            };
            if record.age_at(now) < CHANNEL_MAX_AGE_SECS {
                continue;
            }

            match self.manager.settle(&channel_id, &record).await {
                Ok(receipt) => {
                    tracing::info!(
                        channel_id = %channel_id,
                        transaction = %receipt.signature,
                        final_balance = record.balance,
                        "Expired channel settled"
                    );
                    store.audit().record(
                        AuditEvent::new(AuditEventType::ChannelSettled)
                            .with_identity(&record.counterparty)
                            .with_resource("channel", &channel_id)
                            .with_details(json!({
                                "transaction": receipt.signature,
                                "final_balance": record.balance,
                                "age_secs": record.age_at(now),
                            })),
                    );
                    report.settled.push(channel_id);
                    held.push(guard);
                }
                Err(e) => {
                    tracing::warn!(channel_id = %channel_id, error = %e, "Failed to settle expired channel");
                    store.audit().record(
                        AuditEvent::new(AuditEventType::SettlementFailed)
                            .with_identity(&record.counterparty)
                            .with_resource("channel", &channel_id)
                            .failed(e.to_string()),
                    );
                    report.failed.push(channel_id);
                }
            }
        }

        if !report.settled.is_empty() {
            let settled = report.settled.clone();
            let removed = store
                .update_channels(|channels| {
                    for id in &settled {
                        channels.remove(id);
                    }
                    Ok::<_, ChannelError>(())
                })
                .await;
            if let Err(e) = removed {
                tracing::warn!(error = %e, "Failed to persist sweep; settled channels remain in ledger");
            }
        }

        drop(held);
        store.prune_channel_locks();
        report
    }
}
