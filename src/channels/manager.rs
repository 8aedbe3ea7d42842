// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Channel lifecycle: open from a funding transfer, spend, close, settle.
//!
//! Every operation on a channel first takes that channel's lock from
//! [`Store::lock_channel`] and keeps it until the ledger reflects the
//! outcome, so a spend, an explicit close and the expiry sweep never
//! interleave on one record. A record is only removed after the escrow
//! program accepted the settlement.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::ChannelError;
use crate::blockchain::escrow::{
    AccountData, AccountKind, CloseChannelArgs, EscrowReceipt, OpenChannelArgs,
};
use crate::blockchain::{EscrowClient, Pubkey};
use crate::dialogue::DialogueGenerator;
use crate::storage::repository::{contains_funding, ChannelRecord, ChannelSecret};
use crate::storage::{AuditEvent, AuditEventType, Store};

/// Fixed debit charged for one NPC action.
pub const SPEND_PER_ACTION: u64 = 1_000;

/// Age at which the sweeper settles a channel.
pub const CHANNEL_MAX_AGE_SECS: i64 = 8 * 60 * 60;

/// On-chain timelock granted to newly opened channels.
pub const CHANNEL_TIMELOCK_SECS: i64 = 24 * 60 * 60;

/// An inbound transfer to the service address, as seen on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingTransfer {
    /// Transaction signature; becomes the channel id.
    pub signature: String,
    /// Fee payer of the transfer.
    pub sender: Pubkey,
    pub lamports: u64,
}

/// Result of a successful debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpendReceipt {
    pub channel_id: String,
    pub balance: u64,
    pub nonce: u64,
}

/// Result of an owner-initiated close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CloseReceipt {
    /// Settlement transaction signature.
    pub transaction: String,
    /// The channel secret, revealed now that the channel is settled.
    pub secret: String,
}

/// A channel as shown to its counterparty. Never carries the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSummary {
    pub channel_id: String,
    pub balance: u64,
    pub funded_amount: u64,
    pub nonce: u64,
    pub template_id: String,
    pub created_at: i64,
    pub expires_at: i64,
    /// When the sweeper will settle the channel.
    pub settles_at: i64,
}

impl ChannelSummary {
    fn from_record(channel_id: &str, record: &ChannelRecord) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            balance: record.balance,
            funded_amount: record.funded_amount,
            nonce: record.nonce,
            template_id: record.template_id.clone(),
            created_at: record.created_at,
            expires_at: record.expires_at,
            settles_at: record.created_at + CHANNEL_MAX_AGE_SECS,
        }
    }
}

fn pending_record(transfer: &FundingTransfer, template_id: &str) -> ChannelRecord {
    let secret = ChannelSecret::generate();
    let created_at = Utc::now().timestamp();
    ChannelRecord {
        counterparty: transfer.sender.to_string(),
        balance: transfer.lamports,
        funded_amount: transfer.lamports,
        secret_hash: secret.hash_hex(),
        secret,
        nonce: 0,
        template_id: template_id.to_string(),
        created_at,
        expires_at: created_at + CHANNEL_TIMELOCK_SECS,
        funding_reference: transfer.signature.clone(),
        pending: true,
    }
}

pub struct ChannelManager {
    pub(crate) store: Arc<Store>,
    pub(crate) escrow: Arc<dyn EscrowClient>,
    pub(crate) dialogue: Arc<dyn DialogueGenerator>,
    upstream_timeout: Duration,
}

impl ChannelManager {
    pub fn new(
        store: Arc<Store>,
        escrow: Arc<dyn EscrowClient>,
        dialogue: Arc<dyn DialogueGenerator>,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            store,
            escrow,
            dialogue,
            upstream_timeout,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn escrow(&self) -> &Arc<dyn EscrowClient> {
        &self.escrow
    }

    /// Run an upstream call under the configured timeout.
    pub(crate) async fn bounded<T, E>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, E>>,
    ) -> Result<T, ChannelError>
    where
        ChannelError: From<E>,
    {
        match tokio::time::timeout(self.upstream_timeout, call).await {
            Ok(result) => result.map_err(ChannelError::from),
            Err(_) => Err(ChannelError::Upstream(format!(
                "{operation} timed out after {}s",
                self.upstream_timeout.as_secs()
            ))),
        }
    }

    /// Debit `amount` from a channel on behalf of its counterparty.
    ///
    /// The debit and nonce increment are persisted before this returns and
    /// are never reverted by whatever the caller does next.
    pub async fn spend(
        &self,
        channel_id: &str,
        identity: &str,
        amount: u64,
    ) -> Result<SpendReceipt, ChannelError> {
        let _channel = self.store.lock_channel(channel_id).await;

        let result = self
            .store
            .update_channels(|channels| {
                let record = channels
                    .get_mut(channel_id)
                    .filter(|record| record.is_open())
                    .ok_or_else(|| ChannelError::NotFound("Channel".to_string()))?;
                if record.counterparty != identity {
                    return Err(ChannelError::Forbidden(
                        "Only the channel creator can spend from this channel".to_string(),
                    ));
                }
                if record.balance < amount {
                    return Err(ChannelError::InsufficientFunds {
                        balance: record.balance,
                        requested: amount,
                    });
                }

                record.balance -= amount;
                record.nonce += 1;
                Ok(SpendReceipt {
                    channel_id: channel_id.to_string(),
                    balance: record.balance,
                    nonce: record.nonce,
                })
            })
            .await;

        let event = AuditEvent::new(AuditEventType::ChannelSpent)
            .with_identity(identity)
            .with_resource("channel", channel_id);
        match &result {
            Ok(receipt) => {
                info!(
                    channel_id = %channel_id,
                    amount,
                    balance = receipt.balance,
                    nonce = receipt.nonce,
                    "Channel debited"
                );
                self.store.audit().record(event.with_details(json!({
                    "amount": amount,
                    "balance": receipt.balance,
                    "nonce": receipt.nonce,
                })));
            }
            Err(e) => {
                self.store.audit().record(event.failed(e.to_string()));
            }
        }

        result
    }

    /// Settle a channel on the counterparty's request and reveal its secret.
    ///
    /// The record is removed only once the escrow program accepted the
    /// settlement; on any failure it stays as it was.
    pub async fn close(&self, channel_id: &str, identity: &str) -> Result<CloseReceipt, ChannelError> {
        let _channel = self.store.lock_channel(channel_id).await;

        let record = self
            .store
            .channels()
            .remove(channel_id)
            .filter(ChannelRecord::is_open)
            .ok_or_else(|| ChannelError::NotFound("Channel".to_string()))?;
        if record.counterparty != identity {
            return Err(ChannelError::Forbidden(
                "Only the channel creator can close this channel".to_string(),
            ));
        }

        let event = AuditEvent::new(AuditEventType::ChannelClosed)
            .with_identity(identity)
            .with_resource("channel", channel_id);

        let receipt = match self.settle(channel_id, &record).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(channel_id = %channel_id, error = %e, "Channel close failed");
                self.store.audit().record(event.failed(e.to_string()));
                return Err(e);
            }
        };

        // Settlement is final on-chain; a failed removal must not hide the secret.
        let removed = self
            .store
            .update_channels(|channels| {
                channels.remove(channel_id);
                Ok::<_, ChannelError>(())
            })
            .await;
        if let Err(e) = removed {
            warn!(
                channel_id = %channel_id,
                transaction = %receipt.signature,
                error = %e,
                "Channel settled but ledger removal failed; record is stale"
            );
        }

        info!(
            channel_id = %channel_id,
            transaction = %receipt.signature,
            final_balance = record.balance,
            "Channel closed by counterparty"
        );
        self.store.audit().record(event.with_details(json!({
            "transaction": receipt.signature,
            "final_balance": record.balance,
        })));

        Ok(CloseReceipt {
            transaction: receipt.signature,
            secret: record.secret.reveal().to_string(),
        })
    }

    /// Submit `close_channel` for a record. Does not touch the ledger.
    ///
    /// The caller must hold the channel lock.
    pub(crate) async fn settle(
        &self,
        channel_id: &str,
        record: &ChannelRecord,
    ) -> Result<EscrowReceipt, ChannelError> {
        let template = self
            .bounded("fetch_template", self.escrow.fetch_template(&record.template_id))
            .await?
            .ok_or_else(|| ChannelError::NotFound(format!("Template {}", record.template_id)))?;

        let counterparty: Pubkey = record.counterparty.parse().map_err(|_| {
            ChannelError::Validation(format!(
                "Channel counterparty {} is not a valid address",
                record.counterparty
            ))
        })?;

        let args = CloseChannelArgs {
            channel_id: channel_id.to_string(),
            secret: record.secret.reveal().to_string(),
            final_balance: record.balance,
            template_creator: template.creator,
            counterparty,
        };
        self.bounded("close_channel", self.escrow.close_channel(args))
            .await
    }

    /// Open a channel for a funding transfer, unless one already exists.
    ///
    /// Returns the new channel id, or `None` when the transfer was already
    /// consumed. The secret is persisted in a pending record before
    /// `open_channel` is submitted. A failed or timed-out open leaves that
    /// record behind; the next attempt reuses its secret and only resubmits
    /// if the escrow account does not exist yet.
    pub async fn open_funded(
        &self,
        transfer: &FundingTransfer,
        template_id: &str,
    ) -> Result<Option<String>, ChannelError> {
        let channel_id = transfer.signature.as_str();
        let _channel = self.store.lock_channel(channel_id).await;

        let channels = self.store.channels();
        if contains_funding(&channels, channel_id) {
            return Ok(None);
        }

        let record = match channels.get(channel_id) {
            Some(pending) => pending.clone(),
            None => {
                let record = pending_record(transfer, template_id);
                let inserted = record.clone();
                self.store
                    .update_channels(|channels| {
                        channels.insert(channel_id.to_string(), inserted);
                        Ok::<_, ChannelError>(())
                    })
                    .await?;
                record
            }
        };

        let transaction = if self.landed_channel(channel_id, &record).await? {
            info!(channel_id = %channel_id, "Escrow channel already exists, resuming open");
            None
        } else {
            let args = OpenChannelArgs {
                channel_id: channel_id.to_string(),
                counterparty: transfer.sender,
                amount: record.funded_amount,
                hashlock: record.secret.hashlock(),
                timelock: u64::try_from(record.expires_at).unwrap_or_default(),
                template_id: record.template_id.clone(),
            };
            let receipt = self
                .bounded("open_channel", self.escrow.open_channel(args))
                .await?;
            Some(receipt.signature)
        };

        let created = self
            .store
            .update_channels(|channels| match channels.get_mut(channel_id) {
                Some(record) if record.pending => {
                    record.pending = false;
                    Ok::<_, ChannelError>(true)
                }
                _ => Ok(false),
            })
            .await?;
        if !created {
            return Ok(None);
        }

        info!(
            channel_id = %channel_id,
            identity = %transfer.sender,
            lamports = record.funded_amount,
            transaction = transaction.as_deref().unwrap_or("-"),
            "Channel opened for funding transfer"
        );
        self.store.audit().record(
            AuditEvent::new(AuditEventType::ChannelOpened)
                .with_identity(transfer.sender.to_string())
                .with_resource("channel", channel_id)
                .with_details(json!({
                    "lamports": record.funded_amount,
                    "template_id": record.template_id,
                    "transaction": transaction,
                })),
        );

        Ok(Some(channel_id.to_string()))
    }

    /// Whether the escrow account for a pending record already exists.
    ///
    /// An existing account must commit to the record's hashlock.
    async fn landed_channel(
        &self,
        channel_id: &str,
        record: &ChannelRecord,
    ) -> Result<bool, ChannelError> {
        let address = self
            .escrow
            .program()
            .channel_address(&self.escrow.service_key(), channel_id)?;
        let account = self
            .bounded(
                "fetch_channel",
                self.escrow.fetch_account(AccountKind::PaymentChannel, &address),
            )
            .await?;

        match account {
            None => Ok(false),
            Some(AccountData::PaymentChannel(onchain))
                if onchain.hashlock == record.secret.hashlock() =>
            {
                Ok(true)
            }
            Some(AccountData::PaymentChannel(_)) => Err(ChannelError::Internal(format!(
                "Escrow channel {channel_id} commits to a different hashlock"
            ))),
            Some(_) => Err(ChannelError::Internal(format!(
                "Escrow account for channel {channel_id} is not a payment channel"
            ))),
        }
    }

    /// Channels bound to `identity`, oldest first.
    pub fn list_for(&self, identity: &str) -> Vec<ChannelSummary> {
        let mut summaries: Vec<ChannelSummary> = self
            .store
            .channels()
            .iter()
            .filter(|(_, record)| record.is_open() && record.counterparty == identity)
            .map(|(id, record)| ChannelSummary::from_record(id, record))
            .collect();
        summaries.sort_by_key(|summary| summary.created_at);
        summaries
    }
}
