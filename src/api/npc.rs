// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::Auth,
    channels::{NpcActionRequest, NpcActionResult},
    error::ApiError,
    models::{
        CreateTemplateRequest, NpcStateQuery, NpcStateResponse, TransactionResponse,
        UpdateNpcRequest,
    },
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/create-npc-template",
    request_body = CreateTemplateRequest,
    tag = "NPC",
    security(("api_key" = [])),
    responses(
        (status = 201, body = TransactionResponse),
        (status = 400, description = "Missing required fields"),
        (status = 401, description = "API key required"),
        (status = 502, description = "Escrow program call failed")
    )
)]
pub async fn create_npc_template(
    Auth(identity): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    let receipt = state
        .manager
        .create_template(
            &request.template_id,
            &request.name,
            &request.base_behavior,
            &identity.wallet,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(TransactionResponse {
            transaction: receipt.signature,
        }),
    ))
}

/// Pay for one NPC action from a channel.
///
/// The first action on an NPC initializes it on-chain. Later actions return
/// an unsigned `update_npc` instruction together with the generated reply.
#[utoipa::path(
    post,
    path = "/update-npc",
    request_body = UpdateNpcRequest,
    tag = "NPC",
    security(("api_key" = [])),
    responses(
        (status = 200, body = NpcActionResult),
        (status = 400, description = "Missing required fields"),
        (status = 402, description = "Insufficient channel balance"),
        (status = 403, description = "Caller does not own the channel"),
        (status = 404, description = "Channel not found"),
        (status = 502, description = "Escrow or dialogue service failed after the debit")
    )
)]
pub async fn update_npc(
    Auth(identity): Auth,
    State(state): State<AppState>,
    Json(request): Json<UpdateNpcRequest>,
) -> Result<Json<NpcActionResult>, ApiError> {
    let request = NpcActionRequest::from(request);
    let result = state.manager.npc_action(&request, &identity.wallet).await?;
    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/get-npc-state",
    params(NpcStateQuery),
    tag = "NPC",
    responses(
        (status = 200, body = NpcStateResponse),
        (status = 400, description = "Missing required query parameters"),
        (status = 404, description = "NPC state not found")
    )
)]
pub async fn get_npc_state(
    State(state): State<AppState>,
    Query(query): Query<NpcStateQuery>,
) -> Result<Json<NpcStateResponse>, ApiError> {
    let npc_state = state.manager.npc_state(&query.into()).await?;
    Ok(Json(NpcStateResponse {
        dialogue: npc_state.dialogue,
        behavior: npc_state.behavior,
    }))
}
