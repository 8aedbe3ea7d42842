// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{
    auth::Auth,
    channels::CloseReceipt,
    error::ApiError,
    models::{ChannelListResponse, ClosePaymentChannelRequest},
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/channels",
    tag = "Channels",
    security(("api_key" = [])),
    responses(
        (status = 200, body = ChannelListResponse),
        (status = 401, description = "API key required")
    )
)]
pub async fn list_channels(
    Auth(identity): Auth,
    State(state): State<AppState>,
) -> Json<ChannelListResponse> {
    Json(ChannelListResponse {
        channels: state.manager.list_for(&identity.wallet),
    })
}

/// Settle a channel early and reveal its secret.
#[utoipa::path(
    post,
    path = "/close-payment-channel",
    request_body = ClosePaymentChannelRequest,
    tag = "Channels",
    security(("api_key" = [])),
    responses(
        (status = 200, body = CloseReceipt),
        (status = 403, description = "Caller does not own the channel"),
        (status = 404, description = "Channel not found"),
        (status = 502, description = "Settlement failed; the channel is unchanged")
    )
)]
pub async fn close_payment_channel(
    Auth(identity): Auth,
    State(state): State<AppState>,
    Json(request): Json<ClosePaymentChannelRequest>,
) -> Result<Json<CloseReceipt>, ApiError> {
    if request.channel_id.trim().is_empty() {
        return Err(ApiError::bad_request("Missing required fields"));
    }
    let receipt = state
        .manager
        .close(request.channel_id.trim(), &identity.wallet)
        .await?;
    Ok(Json(receipt))
}
