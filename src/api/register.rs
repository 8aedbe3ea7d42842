// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    blockchain::Pubkey,
    error::ApiError,
    identities::Registration,
    models::{ClaimCredentialRequest, RegisterRequest, RegisterResponse, ALREADY_REGISTERED},
    state::AppState,
};

fn parse_wallet(raw: &str) -> Result<Pubkey, ApiError> {
    if raw.trim().is_empty() {
        return Err(ApiError::bad_request("Wallet address required"));
    }
    raw.trim()
        .parse()
        .map_err(|e| ApiError::bad_request(format!("Invalid wallet address: {e}")))
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    tag = "Identity",
    responses(
        (status = 201, description = "Identity created; the API key is shown once", body = RegisterResponse),
        (status = 200, description = "Wallet already registered", body = RegisterResponse),
        (status = 400, description = "Missing or malformed wallet, or missing signature"),
        (status = 403, description = "Signature does not match the wallet")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let wallet = parse_wallet(&request.wallet)?;
    if request.signature.trim().is_empty() {
        return Err(ApiError::bad_request("Signature required"));
    }
    let user_id = wallet.to_string();

    match state
        .identities
        .register(&wallet, request.signature.trim())
        .await?
    {
        Registration::Created { credential } => Ok((
            StatusCode::CREATED,
            Json(RegisterResponse {
                user_id,
                api_key: credential,
            }),
        )),
        Registration::Existing => Ok((
            StatusCode::OK,
            Json(RegisterResponse {
                user_id,
                api_key: ALREADY_REGISTERED.to_string(),
            }),
        )),
    }
}

#[utoipa::path(
    post,
    path = "/claim-credential",
    request_body = ClaimCredentialRequest,
    tag = "Identity",
    responses(
        (status = 200, description = "Pending credential handed out", body = RegisterResponse),
        (status = 403, description = "Signature does not match the wallet"),
        (status = 404, description = "No pending credential for this wallet")
    )
)]
pub async fn claim_credential(
    State(state): State<AppState>,
    Json(request): Json<ClaimCredentialRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let wallet = parse_wallet(&request.wallet)?;
    if request.signature.trim().is_empty() {
        return Err(ApiError::bad_request("Missing required fields"));
    }

    let credential = state.identities.claim(&wallet, request.signature.trim())?;
    Ok(Json(RegisterResponse {
        user_id: wallet.to_string(),
        api_key: credential,
    }))
}
