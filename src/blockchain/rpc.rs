// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC client for the ledger node.
//!
//! Only the handful of methods the service needs; nothing here tries to be a
//! general-purpose chain client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64ct::{Base64, Encoding};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::types::Pubkey;

/// Commitment used for every read and for confirmation.
pub const COMMITMENT: &str = "confirmed";

const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Errors from the RPC transport or node.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(String),

    #[error("RPC transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Node { code: i64, message: String },

    #[error("RPC response was invalid: {0}")]
    InvalidResponse(String),

    #[error("Transaction {signature} failed: {reason}")]
    TransactionFailed { signature: String, reason: String },

    #[error("Transaction {0} was not confirmed in time")]
    ConfirmationTimeout(String),
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

/// Entry of `getSignaturesForAddress`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    #[serde(default)]
    pub err: Option<Value>,
}

/// `getTransaction` with `jsonParsed` encoding, reduced to what the
/// watcher reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTransaction {
    pub slot: u64,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub meta: Option<TransactionMeta>,
    pub transaction: ParsedTransactionBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionMeta {
    #[serde(default)]
    pub err: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedTransactionBody {
    pub signatures: Vec<String>,
    pub message: ParsedMessage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMessage {
    pub account_keys: Vec<ParsedAccountKey>,
    pub instructions: Vec<ParsedInstruction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedAccountKey {
    pub pubkey: String,
    #[serde(default)]
    pub signer: bool,
    #[serde(default)]
    pub writable: bool,
}

/// A top-level instruction. `parsed` is present only for programs the node
/// knows how to decode (and may be a bare string, e.g. memos).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInstruction {
    #[serde(default)]
    pub program: Option<String>,
    pub program_id: String,
    #[serde(default)]
    pub parsed: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    data: (String, String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlockhash {
    blockhash: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub confirmation_status: Option<String>,
}

/// HTTP JSON-RPC client.
#[derive(Debug)]
pub struct SolanaRpc {
    url: String,
    http: Client,
    next_id: AtomicU64,
}

impl SolanaRpc {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RpcError> {
        let parsed: url::Url = url
            .parse()
            .map_err(|e: url::ParseError| RpcError::InvalidUrl(e.to_string()))?;

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: parsed.to_string(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("{method}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Transport(format!("{method}: HTTP {status}")));
        }

        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .map_err(|e| RpcError::InvalidResponse(format!("{method}: {e}")))?;

        if let Some(err) = envelope.error {
            return Err(RpcError::Node {
                code: err.code,
                message: err.message,
            });
        }
        Ok(envelope.result)
    }

    async fn call_required<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        self.call(method, params)
            .await?
            .ok_or_else(|| RpcError::InvalidResponse(format!("{method}: missing result")))
    }

    pub async fn get_slot(&self) -> Result<u64, RpcError> {
        self.call_required("getSlot", json!([{ "commitment": COMMITMENT }]))
            .await
    }

    pub async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, RpcError> {
        self.call_required(
            "getSignaturesForAddress",
            json!([address.to_string(), { "limit": limit, "commitment": COMMITMENT }]),
        )
        .await
    }

    /// `None` when the node does not know the signature (yet).
    pub async fn get_transaction(&self, signature: &str) -> Result<Option<ParsedTransaction>, RpcError> {
        self.call(
            "getTransaction",
            json!([signature, {
                "encoding": "jsonParsed",
                "commitment": COMMITMENT,
                "maxSupportedTransactionVersion": 0,
            }]),
        )
        .await
    }

    /// Raw account data, or `None` if the account does not exist.
    pub async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError> {
        let response: WithContext<Option<AccountInfo>> = self
            .call_required(
                "getAccountInfo",
                json!([address.to_string(), { "encoding": "base64", "commitment": COMMITMENT }]),
            )
            .await?;

        match response.value {
            None => Ok(None),
            Some(info) => Base64::decode_vec(&info.data.0)
                .map(Some)
                .map_err(|e| RpcError::InvalidResponse(format!("account data: {e}"))),
        }
    }

    pub async fn get_latest_blockhash(&self) -> Result<[u8; 32], RpcError> {
        let response: WithContext<LatestBlockhash> = self
            .call_required("getLatestBlockhash", json!([{ "commitment": COMMITMENT }]))
            .await?;

        let bytes = bs58::decode(&response.value.blockhash)
            .into_vec()
            .map_err(|e| RpcError::InvalidResponse(format!("blockhash: {e}")))?;
        bytes
            .try_into()
            .map_err(|_| RpcError::InvalidResponse("blockhash is not 32 bytes".to_string()))
    }

    /// Submit a signed transaction; returns its signature.
    pub async fn send_transaction(&self, wire: &[u8]) -> Result<String, RpcError> {
        self.call_required(
            "sendTransaction",
            json!([Base64::encode_string(wire), {
                "encoding": "base64",
                "preflightCommitment": COMMITMENT,
            }]),
        )
        .await
    }

    pub async fn get_signature_statuses(
        &self,
        signatures: &[String],
    ) -> Result<Vec<Option<SignatureStatus>>, RpcError> {
        let response: WithContext<Vec<Option<SignatureStatus>>> = self
            .call_required("getSignatureStatuses", json!([signatures]))
            .await?;
        Ok(response.value)
    }

    /// Poll until `signature` reaches `confirmed`, fails, or `timeout` passes.
    pub async fn confirm_transaction(&self, signature: &str, timeout: Duration) -> Result<(), RpcError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let query = [signature.to_string()];

        loop {
            let statuses = self.get_signature_statuses(&query).await?;
            if let Some(Some(status)) = statuses.into_iter().next() {
                if let Some(err) = status.err {
                    return Err(RpcError::TransactionFailed {
                        signature: signature.to_string(),
                        reason: err.to_string(),
                    });
                }
                if matches!(
                    status.confirmation_status.as_deref(),
                    Some("confirmed") | Some("finalized")
                ) {
                    return Ok(());
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(RpcError::ConfirmationTimeout(signature.to_string()));
            }
            tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
        }
    }
}
