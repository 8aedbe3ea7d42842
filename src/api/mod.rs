// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::CREDENTIAL_HEADER,
    blockchain::{ClientAccountMeta, ClientInstruction},
    channels::{ChannelSummary, CloseReceipt, NpcActionResult, NpcOutcome, SpendReceipt},
    models::{
        ChannelListResponse, ClaimCredentialRequest, ClosePaymentChannelRequest,
        CreateTemplateRequest, NpcStateResponse, RegisterRequest, RegisterResponse,
        TransactionResponse, UpdateNpcRequest,
    },
    state::AppState,
};

pub mod channels;
pub mod health;
pub mod npc;
pub mod register;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/register", post(register::register))
        .route("/claim-credential", post(register::claim_credential))
        .route("/create-npc-template", post(npc::create_npc_template))
        .route("/update-npc", post(npc::update_npc))
        .route("/get-npc-state", get(npc::get_npc_state))
        .route("/channels", get(channels::list_channels))
        .route(
            "/close-payment-channel",
            post(channels::close_payment_channel),
        )
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

struct ApiKeyAddon;

impl Modify for ApiKeyAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(CREDENTIAL_HEADER))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        register::register,
        register::claim_credential,
        npc::create_npc_template,
        npc::update_npc,
        npc::get_npc_state,
        channels::list_channels,
        channels::close_payment_channel
    ),
    components(
        schemas(
            RegisterRequest,
            RegisterResponse,
            ClaimCredentialRequest,
            CreateTemplateRequest,
            TransactionResponse,
            UpdateNpcRequest,
            NpcActionResult,
            NpcOutcome,
            SpendReceipt,
            ClientInstruction,
            ClientAccountMeta,
            NpcStateResponse,
            ClosePaymentChannelRequest,
            CloseReceipt,
            ChannelListResponse,
            ChannelSummary,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&ApiKeyAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Identity", description = "Registration and credential pickup"),
        (name = "NPC", description = "NPC templates, paid actions and state"),
        (name = "Channels", description = "Payment channel listing and settlement")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use ed25519_dalek::Signer;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::blockchain::EscrowClient;
    use crate::channels::ChannelManager;
    use crate::identities::{claim_message, register_message, IdentityService};
    use crate::models::ALREADY_REGISTERED;
    use crate::test_support::{
        keypair, test_store, transfer_tx, wallet, FakeDialogue, FakeEscrow, FakeLedger,
    };
    use crate::watcher::LedgerWatcher;

    struct TestApp {
        _temp: TempDir,
        state: AppState,
        escrow: Arc<FakeEscrow>,
        ledger: Arc<FakeLedger>,
        watcher: LedgerWatcher,
    }

    fn test_app() -> TestApp {
        let (temp, store) = test_store();
        let escrow = Arc::new(FakeEscrow::with_default_template());
        let ledger = Arc::new(FakeLedger::new());
        let manager = Arc::new(ChannelManager::new(
            store.clone(),
            escrow.clone(),
            Arc::new(FakeDialogue::replying("Well met, traveler | FRIENDLY")),
            Duration::from_secs(5),
        ));
        let identities = Arc::new(IdentityService::new(store));
        let watcher = LedgerWatcher::new(
            ledger.clone(),
            manager.clone(),
            identities.clone(),
            "default",
        );
        TestApp {
            _temp: temp,
            state: AppState::new(manager, identities, ledger.clone()),
            escrow,
            ledger,
            watcher,
        }
    }

    impl TestApp {
        async fn send(
            &self,
            method: &str,
            uri: &str,
            api_key: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(key) = api_key {
                builder = builder.header(CREDENTIAL_HEADER, key);
            }
            let request = match body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = router(self.state.clone()).oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        /// Fund a channel from `seed`'s wallet and run one watcher cycle.
        async fn fund(&mut self, signature: &str, seed: u8, lamports: u64) {
            let service = self.escrow.service_key();
            self.ledger.add_transaction(
                signature,
                transfer_tx(&wallet(seed), &service, lamports, false),
            );
            self.watcher.process_cycle().await.unwrap();
        }

        /// Register `seed`'s wallet with a valid signature; returns the key.
        async fn register(&self, seed: u8) -> String {
            let (status, body) = self
                .send("POST", "/register", None, Some(register_payload(seed)))
                .await;
            assert_eq!(status, StatusCode::CREATED);
            body["apiKey"].as_str().unwrap().to_string()
        }

        async fn claim(&self, seed: u8) -> String {
            let signature = keypair(seed).sign(claim_message(&wallet(seed)).as_bytes());
            let (status, body) = self
                .send(
                    "POST",
                    "/claim-credential",
                    None,
                    Some(json!({
                        "wallet": wallet(seed).to_string(),
                        "signature": bs58::encode(signature.to_bytes()).into_string(),
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            body["apiKey"].as_str().unwrap().to_string()
        }
    }

    fn register_payload(seed: u8) -> Value {
        let signature = keypair(seed).sign(register_message(&wallet(seed)).as_bytes());
        json!({
            "wallet": wallet(seed).to_string(),
            "signature": bs58::encode(signature.to_bytes()).into_string(),
        })
    }

    fn npc_action(channel_id: &str, action: &str) -> Value {
        json!({
            "npcId": "blacksmith",
            "gameId": "g1",
            "action": action,
            "channelId": channel_id,
            "templateId": "default"
        })
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = test_app();
        let _ = router(app.state.clone()).into_make_service();
    }

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/register",
            "/claim-credential",
            "/create-npc-template",
            "/update-npc",
            "/get-npc-state",
            "/channels",
            "/close-payment-channel",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[tokio::test]
    async fn health_reports_components() {
        let app = test_app();
        let (status, body) = app.send("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["checks"]["storage"], "ok");
        assert_eq!(body["checks"]["ledger"], "ok");

        let (status, body) = app.send("GET", "/health/live", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn register_hands_out_key_once() {
        let app = test_app();
        let payload = register_payload(5);

        let (status, body) = app.send("POST", "/register", None, Some(payload.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["userId"], wallet(5).to_string());
        let key = body["apiKey"].as_str().unwrap().to_string();

        let (status, body) = app.send("POST", "/register", None, Some(payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["apiKey"], ALREADY_REGISTERED);

        let (status, body) = app.send("GET", "/channels", Some(&key), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["channels"], json!([]));
    }

    #[tokio::test]
    async fn register_rejects_bad_wallets() {
        let app = test_app();

        let (status, body) = app.send("POST", "/register", None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Wallet address required" }));

        let (status, _) = app
            .send("POST", "/register", None, Some(json!({ "wallet": "not-a-key" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .send(
                "POST",
                "/register",
                None,
                Some(json!({ "wallet": wallet(5).to_string() })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Signature required" }));
    }

    #[tokio::test]
    async fn register_without_the_wallet_key_cannot_take_over_funding() {
        let mut app = test_app();

        // A third party signs with their own key for the victim's wallet.
        let mut forged = register_payload(9);
        forged["wallet"] = json!(wallet(3).to_string());
        let (status, body) = app.send("POST", "/register", None, Some(forged)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid registration signature"));
        assert!(app.state.store.identities().is_empty());

        // The owner's first funding still auto-registers and they claim the key.
        app.fund("fund-9", 3, 10_000).await;
        let key = app.claim(3).await;
        let (status, body) = app.send("GET", "/channels", Some(&key), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["channels"][0]["channelId"], "fund-9");
    }

    #[tokio::test]
    async fn authenticated_routes_require_a_valid_key() {
        let app = test_app();

        let (status, body) = app.send("GET", "/channels", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "API key required");
        assert_eq!(body["error_code"], "missing_credential");

        let (status, body) = app.send("GET", "/channels", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error_code"], "invalid_credential");

        let (status, _) = app
            .send("POST", "/update-npc", None, Some(npc_action("c", "wave")))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn funded_channel_pays_for_npc_actions_and_closes() {
        let mut app = test_app();
        app.fund("fund-1", 1, 10_000).await;
        let key = app.claim(1).await;

        let (status, body) = app.send("GET", "/channels", Some(&key), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["channels"][0]["channelId"], "fund-1");
        assert_eq!(body["channels"][0]["balance"], 10_000);
        assert!(body["channels"][0].get("secret").is_none());

        // First action initializes the NPC.
        let (status, body) = app
            .send("POST", "/update-npc", Some(&key), Some(npc_action("fund-1", "wave")))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "initialized");
        assert_eq!(body["channel"]["balance"], 9_000);
        assert_eq!(body["channel"]["nonce"], 1);

        // Later actions return the update instruction and the reply.
        let (status, body) = app
            .send("POST", "/update-npc", Some(&key), Some(npc_action("fund-1", "trade")))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "updated");
        assert_eq!(body["dialogue"], "Well met, traveler");
        assert_eq!(body["behavior"], "FRIENDLY");
        assert_eq!(body["channel"]["balance"], 8_000);
        assert!(body["instruction"]["data"].is_string());

        let (status, body) = app
            .send("GET", "/get-npc-state?npcId=blacksmith&gameId=g1", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["behavior"], "NEUTRAL");

        let secret = app.state.store.channels()["fund-1"].secret.reveal().to_string();
        let (status, body) = app
            .send(
                "POST",
                "/close-payment-channel",
                Some(&key),
                Some(json!({ "channelId": "fund-1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["secret"], secret);
        assert_eq!(app.escrow.closes()[0].final_balance, 8_000);

        let (_, body) = app.send("GET", "/channels", Some(&key), None).await;
        assert_eq!(body["channels"], json!([]));
    }

    #[tokio::test]
    async fn overdraw_is_payment_required() {
        let mut app = test_app();
        app.fund("fund-2", 2, 1_500).await;
        let key = app.claim(2).await;

        let (status, _) = app
            .send("POST", "/update-npc", Some(&key), Some(npc_action("fund-2", "wave")))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .send("POST", "/update-npc", Some(&key), Some(npc_action("fund-2", "wave")))
            .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Insufficient channel balance"));
        assert_eq!(app.state.store.channels()["fund-2"].balance, 500);
    }

    #[tokio::test]
    async fn foreign_channel_cannot_be_closed_or_spent() {
        let mut app = test_app();
        app.fund("fund-3", 3, 10_000).await;

        let intruder = app.register(4).await;

        let (status, body) = app
            .send(
                "POST",
                "/close-payment-channel",
                Some(&intruder),
                Some(json!({ "channelId": "fund-3" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Only the channel creator can close this channel");

        let (status, _) = app
            .send("POST", "/update-npc", Some(&intruder), Some(npc_action("fund-3", "wave")))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(app.state.store.channels()["fund-3"].balance, 10_000);
        assert!(app.escrow.closes().is_empty());
    }

    #[tokio::test]
    async fn unknown_channel_and_npc_are_not_found() {
        let app = test_app();
        let key = app.register(6).await;

        let (status, body) = app
            .send(
                "POST",
                "/close-payment-channel",
                Some(&key),
                Some(json!({ "channelId": "nope" })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Channel not found" }));

        let (status, body) = app
            .send("GET", "/get-npc-state?npcId=ghost&gameId=g1", None, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "NPC state not found" }));

        let (status, body) = app.send("GET", "/get-npc-state?npcId=ghost", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Missing required query parameters" }));
    }

    #[tokio::test]
    async fn template_creation_requires_all_fields() {
        let app = test_app();
        let key = app.register(7).await;

        let (status, body) = app
            .send(
                "POST",
                "/create-npc-template",
                Some(&key),
                Some(json!({ "templateId": "merchant", "name": "Merchant" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Missing required fields" }));

        let (status, body) = app
            .send(
                "POST",
                "/create-npc-template",
                Some(&key),
                Some(json!({
                    "templateId": "merchant",
                    "name": "Merchant",
                    "baseBehavior": "FRIENDLY"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["transaction"].as_str().unwrap().starts_with("sig-"));
    }
}
