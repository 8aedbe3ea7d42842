// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. Field names are camelCase
//! on the wire. All types derive `ToSchema` for the OpenAPI document.
//!
//! ## Model Categories
//!
//! - **Registration**: identity registration and credential claims
//! - **NPC**: templates, paid actions and state queries
//! - **Channels**: listing and closing payment channels

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::blockchain::escrow::NpcKey;
use crate::channels::{ChannelSummary, NpcActionRequest};

// =============================================================================
// Registration Models
// =============================================================================

/// Request to register a wallet and receive an API key.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Base58 wallet address.
    #[serde(default)]
    pub wallet: String,
    /// Base58 signature by the wallet over `register:<wallet>`.
    #[serde(default)]
    pub signature: String,
}

/// Response to a registration.
///
/// `api_key` carries the plaintext credential only on first registration.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: String,
    pub api_key: String,
}

/// Message returned instead of a key for an already registered wallet.
pub const ALREADY_REGISTERED: &str = "Already registered, use existing API key";

/// Request to pick up a credential issued on first funding.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ClaimCredentialRequest {
    #[serde(default)]
    pub wallet: String,
    /// Base58 ed25519 signature over `claim-credential:{wallet}`.
    #[serde(default)]
    pub signature: String,
}

// =============================================================================
// NPC Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateRequest {
    #[serde(default)]
    pub template_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base_behavior: String,
}

/// A submitted escrow transaction.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct TransactionResponse {
    /// Transaction signature.
    pub transaction: String,
}

/// A paid NPC action.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNpcRequest {
    #[serde(default)]
    pub npc_id: String,
    #[serde(default)]
    pub game_id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub template_id: String,
}

impl From<UpdateNpcRequest> for NpcActionRequest {
    fn from(request: UpdateNpcRequest) -> Self {
        NpcActionRequest {
            npc: NpcKey {
                npc_id: request.npc_id,
                game_id: request.game_id,
            },
            action: request.action,
            channel_id: request.channel_id,
            template_id: request.template_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct NpcStateQuery {
    #[serde(default)]
    pub npc_id: String,
    #[serde(default)]
    pub game_id: String,
}

impl From<NpcStateQuery> for NpcKey {
    fn from(query: NpcStateQuery) -> Self {
        NpcKey {
            npc_id: query.npc_id,
            game_id: query.game_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct NpcStateResponse {
    pub dialogue: String,
    pub behavior: String,
}

// =============================================================================
// Channel Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClosePaymentChannelRequest {
    #[serde(default)]
    pub channel_id: String,
}

/// Channels owned by the caller.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChannelListResponse {
    pub channels: Vec<ChannelSummary>,
}
