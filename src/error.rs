// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::channels::ChannelError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<ChannelError> for ApiError {
    fn from(e: ChannelError) -> Self {
        let status = match &e {
            ChannelError::NotFound(_) => StatusCode::NOT_FOUND,
            ChannelError::Forbidden(_) => StatusCode::FORBIDDEN,
            ChannelError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ChannelError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            ChannelError::Validation(_) => StatusCode::BAD_REQUEST,
            ChannelError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ChannelError::Storage(_) | ChannelError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %e, "Request failed");
            // Storage and internal details stay in the log.
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                return Self::internal("Internal server error");
            }
        }
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");
    }

    #[test]
    fn channel_errors_map_to_statuses() {
        let cases = [
            (ChannelError::NotFound("Channel".into()), StatusCode::NOT_FOUND),
            (ChannelError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (ChannelError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (
                ChannelError::InsufficientFunds {
                    balance: 1,
                    requested: 2,
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (ChannelError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ChannelError::Upstream("x".into()), StatusCode::BAD_GATEWAY),
            (
                ChannelError::Storage(StorageError::NotInitialized),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status, status);
        }
    }

    #[test]
    fn storage_details_are_not_exposed() {
        let err = ApiError::from(ChannelError::Storage(StorageError::IntegrityViolation(
            "/data/channels.json".into(),
        )));
        assert_eq!(err.message, "Internal server error");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::from(ChannelError::NotFound("Channel".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"Channel not found"}"#);
    }
}
