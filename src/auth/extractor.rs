// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated identities.
//!
//! Use the `Auth` extractor in handlers to require a credential:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(identity): Auth) -> impl IntoResponse {
//!     // identity.wallet is the caller's wallet address
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, AuthenticatedIdentity};
use crate::state::AppState;
use crate::storage::{AuditEvent, AuditEventType};

/// Header carrying the access credential.
pub const CREDENTIAL_HEADER: &str = "x-api-key";

/// Extractor for authenticated identities.
///
/// Reads the credential from the `x-api-key` header and resolves it
/// through the [`AccessGate`](super::AccessGate). Failures are written to
/// the audit trail.
pub struct Auth(pub AuthenticatedIdentity);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<AuthenticatedIdentity>().cloned() {
            return Ok(Auth(identity));
        }

        let credential = match parts.headers.get(CREDENTIAL_HEADER) {
            Some(value) => Some(value.to_str().map_err(|_| AuthError::InvalidCredentialHeader)?),
            None => None,
        };

        match state.gate.authenticate(credential).await {
            Ok(identity) => {
                parts.extensions.insert(identity.clone());
                Ok(Auth(identity))
            }
            Err(e) => {
                tracing::debug!(error = %e, path = %parts.uri.path(), "Authentication failed");
                state.store.audit().record(
                    AuditEvent::new(AuditEventType::AuthFailure)
                        .with_details(serde_json::json!({ "path": parts.uri.path() }))
                        .failed(e.error_code()),
                );
                Err(e)
            }
        }
    }
}
